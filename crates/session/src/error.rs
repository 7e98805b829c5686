use smartkey_account::AccountError;
use thiserror::Error;

/// Session store errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Stored session can't be decoded (or has an unknown version)
    #[error("stored session is corrupt: {inner}")]
    Corrupt {
        /// The inner error message
        inner: String,
    },

    /// Reading or writing the store failed
    #[error("session store io error: {inner}")]
    Io {
        /// The inner error message
        inner: String,
    },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io { inner: err.to_string() }
    }
}

/// Session key lifecycle errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session key is not active")]
    Inactive,

    #[error("Session key usage limit exceeded")]
    UsageLimitExceeded,

    #[error("Session key has expired")]
    Expired,

    #[error("Session key serialized account not found")]
    MissingApproval,

    /// Nothing is stored
    #[error("No active session")]
    NotFound,

    /// The owner's root validator can't sign (or isn't available)
    #[error("No owner validator found")]
    OwnerAuthorityMissing,

    /// Stored session key can't be turned into a signer
    #[error("invalid session key: {inner}")]
    InvalidKey {
        /// The inner error message
        inner: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Account(#[from] AccountError),
}

impl SessionError {
    /// Whether the error was detected locally, before anything reached the network
    pub fn is_local(&self) -> bool {
        match self {
            Self::Account(err) => !err.is_upstream(),
            _ => true,
        }
    }
}
