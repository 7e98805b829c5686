//! Stored record of a granted session key
use crate::error::SessionError;
use ethers::{
    signers::{LocalWallet, Signer},
    types::{Address, H256},
};
use serde::{Deserialize, Serialize};
use smartkey_account::PermissionApproval;
use smartkey_primitives::as_checksum_addr;
use std::fmt;

/// Session key together with its limits and the owner's approval
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub private_key: H256,
    #[serde(serialize_with = "as_checksum_addr")]
    pub session_key_address: Address,
    /// Expiry (unix seconds)
    pub valid_until: u64,
    pub usage_limit: u32,
    pub usage_count: u32,
    pub is_active: bool,
    /// Opaque owner approval of the permission account
    pub serialized_account: String,
}

impl fmt::Debug for SessionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDescriptor")
            .field("private_key", &"<redacted>")
            .field("session_key_address", &self.session_key_address)
            .field("valid_until", &self.valid_until)
            .field("usage_limit", &self.usage_limit)
            .field("usage_count", &self.usage_count)
            .field("is_active", &self.is_active)
            .field("serialized_account", &format!("<{} chars>", self.serialized_account.len()))
            .finish()
    }
}

impl SessionDescriptor {
    /// Descriptor of a freshly granted session key
    pub fn new(
        wallet: &LocalWallet,
        valid_until: u64,
        usage_limit: u32,
        serialized_account: String,
    ) -> Self {
        Self {
            private_key: H256::from_slice(&wallet.signer().to_bytes()),
            session_key_address: wallet.address(),
            valid_until,
            usage_limit,
            usage_count: 0,
            is_active: true,
            serialized_account,
        }
    }

    /// Session key signer, checked against the stored address
    pub fn signer(&self) -> Result<LocalWallet, SessionError> {
        let wallet = LocalWallet::from_bytes(self.private_key.as_bytes())
            .map_err(|err| SessionError::InvalidKey { inner: err.to_string() })?;
        if wallet.address() != self.session_key_address {
            return Err(SessionError::InvalidKey {
                inner: format!("key doesn't belong to {:?}", self.session_key_address),
            });
        }
        Ok(wallet)
    }

    /// Owner approval decoded from the serialized account
    pub fn approval(&self) -> Result<PermissionApproval, SessionError> {
        if self.serialized_account.trim().is_empty() {
            return Err(SessionError::MissingApproval);
        }
        Ok(PermissionApproval::deserialize(&self.serialized_account)?)
    }

    /// Checks, in order, that the session is active, not exhausted, not expired and approved
    pub fn check_usable(&self, now: u64) -> Result<(), SessionError> {
        if !self.is_active {
            return Err(SessionError::Inactive);
        }
        if self.usage_count >= self.usage_limit {
            return Err(SessionError::UsageLimitExceeded);
        }
        if now >= self.valid_until {
            return Err(SessionError::Expired);
        }
        if self.serialized_account.trim().is_empty() {
            return Err(SessionError::MissingApproval);
        }
        Ok(())
    }

    /// The same session after one more use
    pub fn used_once(&self) -> Self {
        Self { usage_count: self.usage_count.saturating_add(1), ..self.clone() }
    }
}
