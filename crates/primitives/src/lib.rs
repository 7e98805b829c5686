//! Account abstraction (ERC-4337) primitive types
//!
//! This crate contains the EntryPoint v0.7 user operation, the call descriptor used to
//! compose operations, the embedded wallet handle and a few helper functions.

mod call;
pub mod constants;
pub mod provider;
mod user_operation;
mod utils;
mod wallet;

pub use call::Call;
pub use user_operation::{
    PackedUserOperation, UserOperation, UserOperationGasEstimation, UserOperationHash,
    UserOperationReceipt,
};
pub use utils::{
    as_checksum_addr, as_checksum_addr_opt, pack_factory_data, pack_paymaster_data, pack_uint128,
};
pub use wallet::{
    find_embedded_wallet, ConnectedWallet, MessageSigner, WalletClientType, WalletError,
};
