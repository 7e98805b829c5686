//! Sponsored user operation submission for a Kernel account
use crate::{error::AccountError, kernel::KernelAccount, network::Network, validator::ValidationId};
use ethers::types::{Address, H256};
use smartkey_primitives::{Call, UserOperation, UserOperationHash, UserOperationReceipt};
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace};

/// Client submitting operations of one account through a bundler, sponsored by a paymaster
#[derive(Clone, Debug)]
pub struct KernelClient {
    account: Arc<KernelAccount>,
    network: Network,
}

impl KernelClient {
    pub fn new(account: KernelAccount, network: Network) -> Self {
        Self { account: Arc::new(account), network }
    }

    pub fn account(&self) -> &KernelAccount {
        &self.account
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn address(&self) -> Address {
        self.account.address()
    }

    /// Builds a signed, sponsored and estimated user operation running `calls`
    pub async fn prepare_user_operation(
        &self,
        calls: &[Call],
    ) -> Result<UserOperation, AccountError> {
        let call_data = KernelAccount::encode_calls(calls)?;
        let network = &self.network;
        let entry_point = network.config.entry_point;
        let sender = self.account.address();

        let deployed =
            network.chain.is_deployed(sender).await.map_err(AccountError::provider)?;
        let enable = self.account.needs_enable(network).await?;
        let nonce = network
            .chain
            .get_nonce(entry_point, sender, self.account.nonce_key(enable))
            .await
            .map_err(AccountError::provider)?;
        let (max_fee_per_gas, max_priority_fee_per_gas) =
            network.chain.estimate_fees().await.map_err(AccountError::provider)?;

        let mut uo = UserOperation::default()
            .sender(sender)
            .nonce(nonce)
            .call_data(call_data)
            .max_fee_per_gas(max_fee_per_gas)
            .max_priority_fee_per_gas(max_priority_fee_per_gas)
            .signature(self.account.dummy_signature(enable)?);
        if !deployed {
            let (factory, factory_data) = self.account.factory_data();
            uo = uo.factory(factory, factory_data);
        }

        let stub = network
            .paymaster
            .get_paymaster_stub_data(&uo, entry_point, network.chain_id)
            .await
            .map_err(AccountError::paymaster)?;
        uo = stub.apply(uo);

        let est = network
            .bundler
            .estimate_user_operation_gas(&uo, entry_point)
            .await
            .map_err(AccountError::bundler)?;
        uo = uo
            .pre_verification_gas(est.pre_verification_gas)
            .verification_gas_limit(est.verification_gas_limit)
            .call_gas_limit(est.call_gas_limit);
        if est.paymaster_verification_gas_limit.is_some() {
            uo.paymaster_verification_gas_limit = est.paymaster_verification_gas_limit;
        }
        if est.paymaster_post_op_gas_limit.is_some() {
            uo.paymaster_post_op_gas_limit = est.paymaster_post_op_gas_limit;
        }

        if !stub.is_final {
            let sponsor = network
                .paymaster
                .get_paymaster_data(&uo, entry_point, network.chain_id)
                .await
                .map_err(AccountError::paymaster)?;
            uo = sponsor.apply(uo);
        }

        let hash = uo.hash(&entry_point, network.chain_id);
        let signature = self.account.sign(&hash, enable).await?;
        trace!("Prepared user operation {hash}: {uo:?}");

        Ok(uo.signature(signature))
    }

    /// Submits `calls` as one user operation, returns its hash without waiting for inclusion
    pub async fn send_user_operation(
        &self,
        calls: &[Call],
    ) -> Result<UserOperationHash, AccountError> {
        let uo = self.prepare_user_operation(calls).await?;
        let hash = self
            .network
            .bundler
            .send_user_operation(&uo, self.network.config.entry_point)
            .await
            .map_err(AccountError::bundler)?;

        info!(
            "User operation {hash} sent with {} call(s), account: {:?}, nonce: {:#x}",
            calls.len(),
            uo.sender,
            uo.nonce
        );

        Ok(hash)
    }

    /// Polls the bundler until the user operation is included or the timeout elapses
    pub async fn wait_for_user_operation_receipt(
        &self,
        hash: &UserOperationHash,
    ) -> Result<UserOperationReceipt, AccountError> {
        let polling = self.network.polling;
        let deadline = Instant::now() + polling.timeout;

        loop {
            if let Some(receipt) = self
                .network
                .bundler
                .get_user_operation_receipt(hash)
                .await
                .map_err(AccountError::bundler)?
            {
                debug!(
                    "User operation {hash} included in {:?}, success: {}",
                    receipt.tx_receipt.transaction_hash, receipt.success
                );
                return Ok(receipt);
            }

            if Instant::now() >= deadline {
                return Err(AccountError::ReceiptTimeout {
                    hash: *hash,
                    secs: polling.timeout.as_secs(),
                });
            }
            sleep(polling.interval).await;
        }
    }

    /// Runs a single call and waits for it to be included, returns the transaction hash
    pub async fn send_transaction(&self, call: Call) -> Result<H256, AccountError> {
        let hash = self.send_user_operation(std::slice::from_ref(&call)).await?;
        let receipt = self.wait_for_user_operation_receipt(&hash).await?;

        if !receipt.success {
            return Err(AccountError::Reverted { hash, reason: receipt.reason });
        }

        Ok(receipt.tx_receipt.transaction_hash)
    }

    /// Removes a validator from the account (must be sent by the root validator)
    pub async fn uninstall_validation(
        &self,
        validation_id: ValidationId,
    ) -> Result<H256, AccountError> {
        let call = self.account.uninstall_validation_call(validation_id);
        info!("Uninstalling {} from {:?}", call.description, self.address());
        self.send_transaction(call).await
    }
}
