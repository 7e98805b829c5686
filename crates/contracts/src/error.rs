use ethers::{
    abi::AbiDecode,
    contract::ContractError,
    providers::{JsonRpcError, Middleware, MiddlewareError},
    types::Bytes,
};
use std::str::FromStr;
use thiserror::Error;

/// Errors of contract reads
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractCallError {
    /// execution reverted
    #[error("execution reverted: {0}")]
    ExecutionReverted(String),

    /// Provider error
    #[error("provider error: {inner}")]
    Provider {
        /// The inner error message
        inner: String,
    },

    /// ABI error
    #[error("abi error: {inner}")]
    ABI {
        /// The inner error message
        inner: String,
    },

    /// Data decoding error
    #[error("decode error: {inner}")]
    Decode {
        /// The inner error message
        inner: String,
    },

    /// Any other error
    #[error("other error: {inner}")]
    Other {
        /// The inner error message
        inner: String,
    },
}

impl ContractCallError {
    pub fn from_contract_error<M: Middleware>(err: ContractError<M>) -> Self {
        match err {
            ContractError::DecodingError(e) => Self::Decode { inner: e.to_string() },
            ContractError::AbiError(e) => Self::ABI { inner: e.to_string() },
            ContractError::MiddlewareError { e } => Self::from_middleware_error::<M>(e),
            ContractError::ProviderError { e } => Self::Provider { inner: e.to_string() },
            ContractError::Revert(data) => Self::from_revert_data(data),
            _ => Self::Other { inner: err.to_string() },
        }
    }

    pub fn from_middleware_error<M: Middleware>(err: M::Error) -> Self {
        if let Some(err) = err.as_error_response() {
            return Self::from_json_rpc_error(err);
        }

        Self::Provider { inner: format!("middleware error: {err:?}") }
    }

    pub fn from_json_rpc_error(err: &JsonRpcError) -> Self {
        match err.data {
            Some(serde_json::Value::String(ref data)) => match Bytes::from_str(data) {
                Ok(bytes) => Self::from_revert_data(bytes),
                Err(_) => Self::ExecutionReverted(err.message.clone()),
            },
            _ => Self::Provider { inner: err.message.clone() },
        }
    }

    fn from_revert_data(data: Bytes) -> Self {
        match decode_revert_string(&data) {
            Some(reason) => Self::ExecutionReverted(reason),
            None => Self::ExecutionReverted(data.to_string()),
        }
    }
}

// ethers-rs doesn't decode `require(cond, "reason")` reverts for us, they come with the
// `Error(string)` signature `0x08c379a0`
pub fn decode_revert_string(data: &Bytes) -> Option<String> {
    if data.len() < 4 {
        return None;
    }

    let (error_sig, reason) = data.split_at(4);
    if error_sig == [0x08, 0xc3, 0x79, 0xa0] {
        <String as AbiDecode>::decode(reason).ok()
    } else {
        None
    }
}
