//! Read-only access to the chain
use ethers::{
    providers::Middleware,
    types::{Address, Bytes, U256},
};
use smartkey_contracts::{EntryPoint, Kernel, KernelFactory, MagicBadge, ValidationConfig};
use std::{fmt, sync::Arc};
use tracing::trace;

/// Chain queries smart accounts depend on
#[async_trait::async_trait]
pub trait ChainApi: fmt::Debug + Send + Sync + 'static {
    async fn chain_id(&self) -> eyre::Result<u64>;

    /// Whether there is code at `address`
    async fn is_deployed(&self, address: Address) -> eyre::Result<bool>;

    /// Entry point nonce of `sender` for the 192-bit nonce `key`
    async fn get_nonce(&self, entry_point: Address, sender: Address, key: U256)
        -> eyre::Result<U256>;

    /// Counterfactual address of the account created by `factory` from `init_data` and `salt`
    async fn get_account_address(
        &self,
        factory: Address,
        init_data: Bytes,
        salt: [u8; 32],
    ) -> eyre::Result<Address>;

    /// Configuration of a validation installed on a deployed account
    async fn validation_config(
        &self,
        account: Address,
        validation_id: [u8; 21],
    ) -> eyre::Result<ValidationConfig>;

    /// Nonce the next enable approval of `account` has to carry
    async fn kernel_current_nonce(&self, account: Address) -> eyre::Result<u32>;

    /// EIP-1559 fees as `(max_fee_per_gas, max_priority_fee_per_gas)`
    async fn estimate_fees(&self) -> eyre::Result<(U256, U256)>;

    async fn nft_balance_of(&self, nft: Address, owner: Address) -> eyre::Result<U256>;

    async fn nft_total_supply(&self, nft: Address) -> eyre::Result<U256>;
}

/// [ChainApi](ChainApi) on top of an ethers middleware
pub struct EthChain<M: Middleware + 'static> {
    eth_client: Arc<M>,
}

impl<M: Middleware + 'static> EthChain<M> {
    pub fn new(eth_client: Arc<M>) -> Self {
        Self { eth_client }
    }
}

impl<M: Middleware + 'static> fmt::Debug for EthChain<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthChain").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<M: Middleware + 'static> ChainApi for EthChain<M> {
    async fn chain_id(&self) -> eyre::Result<u64> {
        let chain_id = self.eth_client.get_chainid().await.map_err(|e| eyre::eyre!(e.to_string()))?;
        Ok(chain_id.as_u64())
    }

    async fn is_deployed(&self, address: Address) -> eyre::Result<bool> {
        Ok(Kernel::new(self.eth_client.clone(), address).is_deployed().await?)
    }

    async fn get_nonce(
        &self,
        entry_point: Address,
        sender: Address,
        key: U256,
    ) -> eyre::Result<U256> {
        let nonce = EntryPoint::new(self.eth_client.clone(), entry_point)
            .get_nonce(&sender, key)
            .await?;
        trace!("Nonce of {sender:?} with key {key:#x}: {nonce}");
        Ok(nonce)
    }

    async fn get_account_address(
        &self,
        factory: Address,
        init_data: Bytes,
        salt: [u8; 32],
    ) -> eyre::Result<Address> {
        Ok(KernelFactory::new(self.eth_client.clone(), factory).get_address(init_data, salt).await?)
    }

    async fn validation_config(
        &self,
        account: Address,
        validation_id: [u8; 21],
    ) -> eyre::Result<ValidationConfig> {
        Ok(Kernel::new(self.eth_client.clone(), account).validation_config(validation_id).await?)
    }

    async fn kernel_current_nonce(&self, account: Address) -> eyre::Result<u32> {
        Ok(Kernel::new(self.eth_client.clone(), account).current_nonce().await?)
    }

    async fn estimate_fees(&self) -> eyre::Result<(U256, U256)> {
        self.eth_client.estimate_eip1559_fees(None).await.map_err(|e| eyre::eyre!(e.to_string()))
    }

    async fn nft_balance_of(&self, nft: Address, owner: Address) -> eyre::Result<U256> {
        Ok(MagicBadge::new(self.eth_client.clone(), nft).balance_of(owner).await?)
    }

    async fn nft_total_supply(&self, nft: Address) -> eyre::Result<U256> {
        Ok(MagicBadge::new(self.eth_client.clone(), nft).total_supply().await?)
    }
}
