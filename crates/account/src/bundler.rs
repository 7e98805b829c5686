//! Bundler JSON-RPC client
use ethers::{
    providers::{Http, Provider},
    types::Address,
};
use smartkey_primitives::{
    UserOperation, UserOperationGasEstimation, UserOperationHash, UserOperationReceipt,
};
use std::fmt;
use tracing::trace;

/// Bundler methods (ERC-4337 `eth_` namespace) a smart account client calls
#[async_trait::async_trait]
pub trait BundlerApi: fmt::Debug + Send + Sync + 'static {
    /// Gas limits the user operation needs
    async fn estimate_user_operation_gas(
        &self,
        uo: &UserOperation,
        entry_point: Address,
    ) -> eyre::Result<UserOperationGasEstimation>;

    /// Submits a signed user operation, returns its hash
    async fn send_user_operation(
        &self,
        uo: &UserOperation,
        entry_point: Address,
    ) -> eyre::Result<UserOperationHash>;

    /// Receipt of an included user operation, `None` while it's pending
    async fn get_user_operation_receipt(
        &self,
        hash: &UserOperationHash,
    ) -> eyre::Result<Option<UserOperationReceipt>>;
}

/// [BundlerApi](BundlerApi) over HTTP
#[derive(Clone, Debug)]
pub struct HttpBundler {
    provider: Provider<Http>,
}

impl HttpBundler {
    pub fn new(url: &str) -> eyre::Result<Self> {
        Ok(Self { provider: Provider::<Http>::try_from(url)? })
    }
}

#[async_trait::async_trait]
impl BundlerApi for HttpBundler {
    async fn estimate_user_operation_gas(
        &self,
        uo: &UserOperation,
        entry_point: Address,
    ) -> eyre::Result<UserOperationGasEstimation> {
        let est: UserOperationGasEstimation =
            self.provider.request("eth_estimateUserOperationGas", (uo, entry_point)).await?;
        trace!("Gas estimation of user operation from {:?}: {est:?}", uo.sender);
        Ok(est)
    }

    async fn send_user_operation(
        &self,
        uo: &UserOperation,
        entry_point: Address,
    ) -> eyre::Result<UserOperationHash> {
        Ok(self.provider.request("eth_sendUserOperation", (uo, entry_point)).await?)
    }

    async fn get_user_operation_receipt(
        &self,
        hash: &UserOperationHash,
    ) -> eyre::Result<Option<UserOperationReceipt>> {
        Ok(self.provider.request("eth_getUserOperationReceipt", [hash]).await?)
    }
}
