//! Endpoint and contract configuration of smart accounts

use crate::error::AccountError;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use smartkey_primitives::constants::{entry_point, env, kernel, permission};
use std::str::FromStr;

/// Endpoints every account action needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment {
    pub bundler_rpc: String,
    pub paymaster_rpc: String,
}

impl Environment {
    /// Reads the endpoints from the process environment
    pub fn from_env() -> Result<Self, AccountError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the endpoints through `lookup`, failing with the names of all missing (or blank)
    /// keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AccountError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        match (read(env::BUNDLER_RPC), read(env::PAYMASTER_RPC)) {
            (Some(bundler_rpc), Some(paymaster_rpc)) => Ok(Self { bundler_rpc, paymaster_rpc }),
            (bundler_rpc, paymaster_rpc) => {
                let mut keys = vec![];
                if bundler_rpc.is_none() {
                    keys.push(env::BUNDLER_RPC.to_string());
                }
                if paymaster_rpc.is_none() {
                    keys.push(env::PAYMASTER_RPC.to_string());
                }
                Err(AccountError::Config { keys })
            }
        }
    }
}

/// Addresses of the permission plugins (signer and policies)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionContracts {
    pub ecdsa_signer: Address,
    pub timestamp_policy: Address,
    pub call_policy: Address,
    pub rate_limit_policy: Address,
}

/// Addresses of the contracts a Kernel account is built from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountConfig {
    pub entry_point: Address,
    pub factory: Address,
    pub meta_factory: Address,
    pub ecdsa_validator: Address,
    pub permission: PermissionContracts,
    /// Index of the account among the accounts of the same owner
    pub index: u64,
}

fn address(value: &str) -> Address {
    Address::from_str(value).expect("address constants are valid")
}

impl Default for PermissionContracts {
    fn default() -> Self {
        Self {
            ecdsa_signer: address(permission::ECDSA_SIGNER),
            timestamp_policy: address(permission::TIMESTAMP_POLICY),
            call_policy: address(permission::CALL_POLICY),
            rate_limit_policy: address(permission::RATE_LIMIT_POLICY),
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            entry_point: address(entry_point::ADDRESS),
            factory: address(kernel::FACTORY),
            meta_factory: address(kernel::META_FACTORY),
            ecdsa_validator: address(kernel::ECDSA_VALIDATOR),
            permission: PermissionContracts::default(),
            index: 0,
        }
    }
}
