//! Smart account provisioning for a connected wallet
use crate::{
    client::KernelClient, error::AccountError, kernel::KernelAccount, network::Connect,
    validator::EcdsaValidator,
};
use ethers::types::Address;
use smartkey_primitives::ConnectedWallet;
use std::sync::Arc;
use tracing::info;

/// Ready to use smart account of a wallet
#[derive(Clone, Debug)]
pub struct SmartAccount {
    pub client: KernelClient,
    /// Root validator of the account, bound to the wallet's signer
    pub owner_authority: Arc<EcdsaValidator>,
    pub owner_address: Address,
    pub account_address: Address,
}

/// Builds [SmartAccounts](SmartAccount) over fresh connections
#[derive(Clone, Debug)]
pub struct SmartAccountProvisioner<C: Connect> {
    connector: Arc<C>,
}

impl<C: Connect> SmartAccountProvisioner<C> {
    pub fn new(connector: Arc<C>) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &Arc<C> {
        &self.connector
    }

    /// Wraps the wallet signer as the root validator of a Kernel account and connects a client
    /// to it
    pub async fn provision(&self, wallet: &ConnectedWallet) -> Result<SmartAccount, AccountError> {
        let network = self.connector.connect().await?;
        let owner_authority =
            Arc::new(EcdsaValidator::new(network.config.ecdsa_validator, wallet.signer.clone()));
        let account = KernelAccount::create(&network, owner_authority.clone()).await?;
        let account_address = account.address();

        info!("Smart account {account_address:?} provisioned for owner {:?}", wallet.address);

        Ok(SmartAccount {
            client: KernelClient::new(account, network),
            owner_authority,
            owner_address: wallet.address,
            account_address,
        })
    }
}
