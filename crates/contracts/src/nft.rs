pub use super::gen::MagicBadgeAPI;
use crate::error::ContractCallError;
use ethers::{
    providers::Middleware,
    types::{Address, U256},
};
use std::sync::Arc;

/// Read access to the demo NFT
#[derive(Clone)]
pub struct MagicBadge<M: Middleware + 'static> {
    address: Address,
    nft_api: MagicBadgeAPI<M>,
}

impl<M: Middleware + 'static> MagicBadge<M> {
    pub fn new(eth_client: Arc<M>, address: Address) -> Self {
        Self { address, nft_api: MagicBadgeAPI::new(address, eth_client) }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256, ContractCallError> {
        self.nft_api.balance_of(owner).call().await.map_err(ContractCallError::from_contract_error)
    }

    pub async fn total_supply(&self) -> Result<U256, ContractCallError> {
        self.nft_api.total_supply().call().await.map_err(ContractCallError::from_contract_error)
    }
}
