use alloy_chains::NamedChain;
use dirs::home_dir;
use ethers::types::Address;
use expanded_pathbuf::ExpandedPathBuf;
use pin_utils::pin_mut;
use smartkey_primitives::constants::session::STORE_FILE_NAME;
use std::{future::Future, str::FromStr};
use tracing::info;

/// Unwrap path or returns the smartkey directory in home
pub fn unwrap_path_or_home(path: Option<ExpandedPathBuf>) -> eyre::Result<ExpandedPathBuf> {
    if let Some(path) = path {
        Ok(path)
    } else {
        home_dir()
            .map(|h| h.join(".smartkey"))
            .ok_or_else(|| eyre::eyre!("Get Home directory error"))
            .map(ExpandedPathBuf)
    }
}

/// Session file, `~/.smartkey/session.json` unless given
pub fn session_file_or_default(path: Option<ExpandedPathBuf>) -> eyre::Result<ExpandedPathBuf> {
    match path {
        Some(path) => Ok(path),
        None => Ok(ExpandedPathBuf(unwrap_path_or_home(None)?.join(STORE_FILE_NAME))),
    }
}

/// Parses address from string
pub fn parse_address(s: &str) -> Result<Address, String> {
    Address::from_str(s).map_err(|_| format!("String {s} is not a valid address"))
}

/// Parses chain from its name (e.g. `sepolia`)
pub fn parse_chain(s: &str) -> Result<NamedChain, String> {
    NamedChain::from_str(s).map_err(|_| format!("String {s} is not a valid chain"))
}

/// Checks the private key is 32 bytes of hex (`0x` prefix optional)
pub fn validate_private_key(hex_string: &str) -> Result<String, String> {
    let digits = hex_string.strip_prefix("0x").unwrap_or(hex_string);

    if digits.chars().count() != 64 {
        return Err("private key must be 32 bytes of hex".into());
    }

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("private key is not a valid hexadecimal string".into());
    }

    Ok(String::from(hex_string))
}

/// Loads `.env.local` and `.env` from the working directory when present, returning the files
/// loaded
///
/// Nothing is overridden, so the environment wins over `.env.local`, which wins over `.env`.
pub fn load_env_files() -> Vec<&'static str> {
    [".env.local", ".env"].into_iter().filter(|file| dotenv::from_filename(file).is_ok()).collect()
}

/// Runs the future to completion or until:
/// - `ctrl-c` is received.
/// - `SIGTERM` is received (unix only).
pub async fn run_until_ctrl_c<F, E>(fut: F) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
    E: Send + Sync + 'static + From<std::io::Error>,
{
    let ctrl_c = tokio::signal::ctrl_c();

    let mut stream = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let sigterm = stream.recv();
    pin_mut!(sigterm, ctrl_c, fut);

    tokio::select! {
        _ = ctrl_c => {
            info!("Received ctrl-c signal.");
        },
        _ = sigterm => {
            info!("Received SIGTERM signal.");
        },
        res = fut => res?,
    }

    Ok(())
}
