use smartkey_contracts::ContractCallError;
use smartkey_primitives::{UserOperationHash, WalletError};
use thiserror::Error;

/// Smart account errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// Required configuration is missing
    #[error("missing configuration: {}", keys.join(", "))]
    Config {
        /// Names of the missing keys
        keys: Vec<String>,
    },

    /// Configuration is present but unusable
    #[error("invalid configuration: {inner}")]
    InvalidConfig {
        /// The inner error message
        inner: String,
    },

    /// Wallet error
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// Chain RPC error
    #[error("provider error: {inner}")]
    Provider {
        /// The inner error message
        inner: String,
    },

    /// Bundler RPC error
    #[error("bundler error: {inner}")]
    Bundler {
        /// The inner error message
        inner: String,
    },

    /// Paymaster RPC error
    #[error("paymaster error: {inner}")]
    Paymaster {
        /// The inner error message
        inner: String,
    },

    /// Nothing to execute
    #[error("no operations to execute")]
    EmptyOperations,

    /// ABI encoding error
    #[error("abi error: {inner}")]
    ABI {
        /// The inner error message
        inner: String,
    },

    /// Validator has no signing key attached
    #[error("validator {0} has no signer")]
    MissingSigner(String),

    /// Signing failed
    #[error("signature error: {inner}")]
    Signature {
        /// The inner error message
        inner: String,
    },

    /// Serialized approval can't be decoded
    #[error("invalid approval: {inner}")]
    InvalidApproval {
        /// The inner error message
        inner: String,
    },

    /// Two accounts that must be the same resolve to different addresses
    #[error("account mismatch: expected {expected:?}, got {actual:?}")]
    AccountMismatch {
        expected: ethers::types::Address,
        actual: ethers::types::Address,
    },

    /// User operation wasn't included in time
    #[error("user operation {hash} not included after {secs}s")]
    ReceiptTimeout { hash: UserOperationHash, secs: u64 },

    /// User operation was included but its execution reverted
    #[error("user operation {hash} reverted{}", reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Reverted { hash: UserOperationHash, reason: Option<String> },
}

impl AccountError {
    pub fn provider(err: eyre::Report) -> Self {
        Self::Provider { inner: err.to_string() }
    }

    pub fn bundler(err: eyre::Report) -> Self {
        Self::Bundler { inner: err.to_string() }
    }

    pub fn paymaster(err: eyre::Report) -> Self {
        Self::Paymaster { inner: err.to_string() }
    }

    /// Whether the error comes from a remote service rather than a local check
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } |
                Self::Bundler { .. } |
                Self::Paymaster { .. } |
                Self::ReceiptTimeout { .. } |
                Self::Reverted { .. }
        )
    }
}

impl From<ContractCallError> for AccountError {
    fn from(err: ContractCallError) -> Self {
        Self::Provider { inner: err.to_string() }
    }
}

impl From<ethers::abi::Error> for AccountError {
    fn from(err: ethers::abi::Error) -> Self {
        Self::ABI { inner: err.to_string() }
    }
}
