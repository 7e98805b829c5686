//! Kernel v3 smart accounts over ERC-4337
//!
//! Provisioning of a smart account for a connected wallet, composition of contract calls into
//! batched operations, sponsored submission through a bundler and the validators (owner and
//! session key permissions) the account signs with.

mod bundler;
mod client;
mod compose;
mod config;
mod error;
mod execute;
mod kernel;
mod network;
mod paymaster;
mod provider;
mod provision;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
mod validator;

pub use bundler::{BundlerApi, HttpBundler};
pub use client::KernelClient;
pub use compose::{create_batch_operations, format_operation_preview, mint_batch_specs, CallSpec};
pub use config::{AccountConfig, Environment, PermissionContracts};
pub use error::AccountError;
pub use execute::{
    execute_batch_operation, OperationEvent, OperationHash, OperationResult, UserOpStatus,
};
pub use kernel::{KernelAccount, RegularValidator};
pub use network::{Connect, HttpConnector, Network, ReceiptPolling};
pub use paymaster::{HttpPaymaster, PaymasterApi, SponsorData};
pub use provider::{ChainApi, EthChain};
pub use provision::{SmartAccount, SmartAccountProvisioner};
pub use validator::{
    CallPermission, EcdsaValidator, EnablePayload, KernelValidator, PermissionApproval,
    PermissionValidator, Policy, ValidationId, VALIDATION_TYPE_PERMISSION, VALIDATION_TYPE_ROOT,
    VALIDATION_TYPE_VALIDATOR,
};
