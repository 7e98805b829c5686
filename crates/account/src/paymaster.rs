//! Paymaster JSON-RPC client (ERC-7677)
use ethers::{
    providers::{Http, Provider},
    types::{Address, Bytes, U256, U64},
};
use serde::{Deserialize, Serialize};
use smartkey_primitives::UserOperation;
use std::fmt;

/// Paymaster fields of a sponsored user operation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorData {
    pub paymaster: Address,
    #[serde(default)]
    pub paymaster_data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
    /// Stub data that is already final (no second round trip needed)
    #[serde(default)]
    pub is_final: bool,
}

impl SponsorData {
    /// Writes the sponsorship into the user operation (gas limits only if the paymaster set them)
    pub fn apply(&self, mut uo: UserOperation) -> UserOperation {
        uo.paymaster = Some(self.paymaster);
        uo.paymaster_data = Some(self.paymaster_data.clone());
        if self.paymaster_verification_gas_limit.is_some() {
            uo.paymaster_verification_gas_limit = self.paymaster_verification_gas_limit;
        }
        if self.paymaster_post_op_gas_limit.is_some() {
            uo.paymaster_post_op_gas_limit = self.paymaster_post_op_gas_limit;
        }
        uo
    }
}

/// Sponsorship methods of a paymaster service
#[async_trait::async_trait]
pub trait PaymasterApi: fmt::Debug + Send + Sync + 'static {
    /// Placeholder sponsorship used while estimating gas
    async fn get_paymaster_stub_data(
        &self,
        uo: &UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> eyre::Result<SponsorData>;

    /// Final sponsorship of a fully estimated user operation
    async fn get_paymaster_data(
        &self,
        uo: &UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> eyre::Result<SponsorData>;
}

/// [PaymasterApi](PaymasterApi) over HTTP
#[derive(Clone, Debug)]
pub struct HttpPaymaster {
    provider: Provider<Http>,
}

impl HttpPaymaster {
    pub fn new(url: &str) -> eyre::Result<Self> {
        Ok(Self { provider: Provider::<Http>::try_from(url)? })
    }

    async fn call(
        &self,
        method: &str,
        uo: &UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> eyre::Result<SponsorData> {
        let context = serde_json::Value::Object(Default::default());
        Ok(self.provider.request(method, (uo, entry_point, U64::from(chain_id), context)).await?)
    }
}

#[async_trait::async_trait]
impl PaymasterApi for HttpPaymaster {
    async fn get_paymaster_stub_data(
        &self,
        uo: &UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> eyre::Result<SponsorData> {
        self.call("pm_getPaymasterStubData", uo, entry_point, chain_id).await
    }

    async fn get_paymaster_data(
        &self,
        uo: &UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> eyre::Result<SponsorData> {
        self.call("pm_getPaymasterData", uo, entry_point, chain_id).await
    }
}
