//! Smart contract interfaces: EntryPoint v0.7, Kernel v3 (account and factories) and the demo NFT

pub mod entry_point;
mod error;
mod gen;
pub mod kernel;
pub mod nft;

pub use entry_point::EntryPoint;
pub use error::{decode_revert_string, ContractCallError};
pub use gen::{
    entry_point_api, kernel_api, kernel_factory_api, magic_badge_abi, magic_badge_api,
    meta_factory_api, MAGIC_BADGE_ABI,
};
pub use kernel::{Kernel, KernelFactory, ValidationConfig};
pub use nft::MagicBadge;
