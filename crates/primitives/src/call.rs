//! Call executed by a smart account (one entry of an operation)

use crate::utils::as_checksum_addr;
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// A single call made by the smart account
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    /// Contract (or account) that is called
    #[serde(serialize_with = "as_checksum_addr")]
    pub target: Address,
    /// Encoded call data
    pub data: Bytes,
    /// Native value sent with the call
    pub value: U256,
    /// Human-readable description shown before submitting
    pub description: String,
}

impl Call {
    pub fn new(target: Address, data: Bytes) -> Self {
        Self { target, data, value: U256::zero(), description: String::new() }
    }

    /// Sets the value of the call
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the description of the call
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}
