pub use super::gen::EntryPointAPI;
use crate::error::ContractCallError;
use ethers::{
    providers::Middleware,
    types::{Address, U256},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct EntryPoint<M: Middleware + 'static> {
    address: Address,
    entry_point_api: EntryPointAPI<M>,
}

impl<M: Middleware + 'static> EntryPoint<M> {
    pub fn new(eth_client: Arc<M>, address: Address) -> Self {
        Self { address, entry_point_api: EntryPointAPI::new(address, eth_client) }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Nonce of `address` in the sequence selected by the 192-bit `key`
    pub async fn get_nonce(&self, address: &Address, key: U256) -> Result<U256, ContractCallError> {
        self.entry_point_api
            .get_nonce(*address, key)
            .call()
            .await
            .map_err(ContractCallError::from_contract_error)
    }
}
