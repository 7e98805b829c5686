pub use super::gen::{KernelAPI, KernelFactoryAPI, MetaFactoryAPI};
use crate::error::ContractCallError;
use ethers::{
    providers::Middleware,
    types::{Address, Bytes},
};
use std::sync::Arc;

/// Installed configuration of a validation (zero hook means not installed)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidationConfig {
    pub nonce: u32,
    pub hook: Address,
}

impl ValidationConfig {
    pub fn is_installed(&self) -> bool {
        !self.hook.is_zero()
    }
}

/// Read access to a deployed Kernel v3 account
#[derive(Clone)]
pub struct Kernel<M: Middleware + 'static> {
    eth_client: Arc<M>,
    address: Address,
    kernel_api: KernelAPI<M>,
}

impl<M: Middleware + 'static> Kernel<M> {
    pub fn new(eth_client: Arc<M>, address: Address) -> Self {
        let kernel_api = KernelAPI::new(address, eth_client.clone());
        Self { eth_client, address, kernel_api }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Whether the account has code (is deployed)
    pub async fn is_deployed(&self) -> Result<bool, ContractCallError> {
        let code = self
            .eth_client
            .get_code(self.address, None)
            .await
            .map_err(ContractCallError::from_middleware_error::<M>)?;
        Ok(!code.is_empty())
    }

    pub async fn validation_config(
        &self,
        validation_id: [u8; 21],
    ) -> Result<ValidationConfig, ContractCallError> {
        let (nonce, hook) = self
            .kernel_api
            .validation_config(validation_id)
            .call()
            .await
            .map_err(ContractCallError::from_contract_error)?;
        Ok(ValidationConfig { nonce, hook })
    }

    /// Nonce an enable approval has to be signed with
    pub async fn current_nonce(&self) -> Result<u32, ContractCallError> {
        self.kernel_api.current_nonce().call().await.map_err(ContractCallError::from_contract_error)
    }
}

/// Kernel factory, resolving counterfactual account addresses
#[derive(Clone)]
pub struct KernelFactory<M: Middleware + 'static> {
    factory_api: KernelFactoryAPI<M>,
}

impl<M: Middleware + 'static> KernelFactory<M> {
    pub fn new(eth_client: Arc<M>, address: Address) -> Self {
        Self { factory_api: KernelFactoryAPI::new(address, eth_client) }
    }

    /// Address of the account created from `init_data` (encoded `initialize` call) and `salt`
    pub async fn get_address(
        &self,
        init_data: Bytes,
        salt: [u8; 32],
    ) -> Result<Address, ContractCallError> {
        self.factory_api
            .get_address(init_data, salt)
            .call()
            .await
            .map_err(ContractCallError::from_contract_error)
    }
}
