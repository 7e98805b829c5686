//! Single slot storage of the session descriptor
use crate::{descriptor::SessionDescriptor, error::StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smartkey_primitives::constants::session::STORE_VERSION;
use std::{fmt, io::Write, path::PathBuf};
use tempfile::NamedTempFile;
use tracing::{trace, warn};

/// Store holding at most one session descriptor
///
/// Every save replaces the stored descriptor wholesale.
pub trait SessionStore: fmt::Debug + Send + Sync + 'static {
    fn load(&self) -> Result<Option<SessionDescriptor>, StoreError>;

    fn save(&self, descriptor: &SessionDescriptor) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

/// Stored descriptor, corrupt data reads as nothing stored (and is left in place)
pub fn load_or_ignore(store: &dyn SessionStore) -> Result<Option<SessionDescriptor>, StoreError> {
    match store.load() {
        Err(StoreError::Corrupt { inner }) => {
            warn!("Ignoring corrupt session: {inner}");
            Ok(None)
        }
        res => res,
    }
}

/// Versioned document the descriptor is stored in
#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    session: SessionDescriptor,
}

fn encode(descriptor: &SessionDescriptor) -> Result<String, StoreError> {
    serde_json::to_string_pretty(&Envelope { version: STORE_VERSION, session: descriptor.clone() })
        .map_err(|err| StoreError::Io { inner: err.to_string() })
}

fn decode(raw: &str) -> Result<SessionDescriptor, StoreError> {
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|err| StoreError::Corrupt { inner: err.to_string() })?;
    if envelope.version != STORE_VERSION {
        return Err(StoreError::Corrupt {
            inner: format!("unsupported version {}", envelope.version),
        });
    }
    Ok(envelope.session)
}

/// Session stored as a JSON file
#[derive(Clone, Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<SessionDescriptor>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => decode(&raw).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes a temporary file next to the store and renames it over the store, so a crash never
    /// leaves a half-written session. The file is only readable by its owner.
    fn save(&self, descriptor: &SessionDescriptor) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut file = NamedTempFile::new_in(&dir)?;
        file.write_all(encode(descriptor)?.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|err| StoreError::from(err.error))?;

        trace!("Session saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Session kept in memory (as its serialized document)
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    raw: RwLock<Option<String>>,
}

impl MemorySessionStore {
    /// Store already holding `raw`, which doesn't have to be a valid document
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { raw: RwLock::new(Some(raw.into())) }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.read().clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionDescriptor>, StoreError> {
        self.raw.read().as_deref().map(decode).transpose()
    }

    fn save(&self, descriptor: &SessionDescriptor) -> Result<(), StoreError> {
        *self.raw.write() = Some(encode(descriptor)?);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.raw.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, H256};

    fn descriptor(usage_count: u32) -> SessionDescriptor {
        SessionDescriptor {
            private_key: H256::repeat_byte(7),
            session_key_address: Address::from_low_u64_be(7),
            valid_until: 3600,
            usage_limit: 3,
            usage_count,
            is_active: true,
            serialized_account: "abcd".into(),
        }
    }

    #[test]
    fn file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));
        assert_eq!(store.load().unwrap(), None);

        store.save(&descriptor(0)).unwrap();
        store.save(&descriptor(1)).unwrap();
        assert_eq!(store.load().unwrap(), Some(descriptor(1)));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["session"]["usageCount"], 1);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o077, 0);
        }

        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn corrupt_documents() {
        let next_version =
            serde_json::json!({ "version": 2, "session": descriptor(0) }).to_string();
        for raw in ["not json", r#"{"privateKey":"0x00"}"#, next_version.as_str()] {
            assert!(matches!(
                MemorySessionStore::with_raw(raw).load(),
                Err(StoreError::Corrupt { .. })
            ));
        }
    }

    #[test]
    fn corrupt_session_is_ignored() {
        let store = MemorySessionStore::with_raw("{");
        assert_eq!(load_or_ignore(&store).unwrap(), None);
        assert_eq!(store.raw().as_deref(), Some("{"));
    }

    #[test]
    fn memory_store() {
        let store = MemorySessionStore::default();
        assert_eq!(store.load().unwrap(), None);
        store.save(&descriptor(2)).unwrap();
        assert_eq!(store.load().unwrap(), Some(descriptor(2)));
        store.clear().unwrap();
        assert_eq!(store.raw(), None);
    }
}
