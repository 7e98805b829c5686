//! In-memory chain, bundler and paymaster for tests
use crate::{
    bundler::BundlerApi,
    config::AccountConfig,
    error::AccountError,
    network::{Connect, Network, ReceiptPolling},
    paymaster::{PaymasterApi, SponsorData},
    provider::ChainApi,
};
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use parking_lot::RwLock;
use smartkey_contracts::ValidationConfig;
use smartkey_primitives::{
    UserOperation, UserOperationGasEstimation, UserOperationHash, UserOperationReceipt,
};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

pub const CHAIN_ID: u64 = 11_155_111;

/// Chain with a single counterfactual account
#[derive(Debug)]
pub struct MockChain {
    pub account_address: RwLock<Address>,
    pub deployed: RwLock<bool>,
    pub installed: RwLock<HashSet<[u8; 21]>>,
    pub nonces: RwLock<HashMap<U256, U256>>,
    pub kernel_nonce: RwLock<u32>,
    pub nft_balances: RwLock<HashMap<Address, U256>>,
    pub calls: AtomicUsize,
    pub fail: RwLock<Option<String>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            account_address: RwLock::new(Address::from_low_u64_be(0xacc)),
            deployed: RwLock::new(false),
            installed: Default::default(),
            nonces: Default::default(),
            kernel_nonce: RwLock::new(1),
            nft_balances: Default::default(),
            calls: AtomicUsize::new(0),
            fail: RwLock::new(None),
        }
    }
}

impl MockChain {
    fn call(&self) -> eyre::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail.read().clone() {
            Some(err) => Err(eyre::eyre!(err)),
            None => Ok(()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChainApi for MockChain {
    async fn chain_id(&self) -> eyre::Result<u64> {
        self.call()?;
        Ok(CHAIN_ID)
    }

    async fn is_deployed(&self, _address: Address) -> eyre::Result<bool> {
        self.call()?;
        Ok(*self.deployed.read())
    }

    async fn get_nonce(
        &self,
        _entry_point: Address,
        _sender: Address,
        key: U256,
    ) -> eyre::Result<U256> {
        self.call()?;
        let seq = self.nonces.read().get(&key).copied().unwrap_or_default();
        Ok((key << 64) | seq)
    }

    async fn get_account_address(
        &self,
        _factory: Address,
        _init_data: Bytes,
        _salt: [u8; 32],
    ) -> eyre::Result<Address> {
        self.call()?;
        Ok(*self.account_address.read())
    }

    async fn validation_config(
        &self,
        _account: Address,
        validation_id: [u8; 21],
    ) -> eyre::Result<ValidationConfig> {
        self.call()?;
        let hook = if self.installed.read().contains(&validation_id) {
            Address::from_low_u64_be(1)
        } else {
            Address::zero()
        };
        Ok(ValidationConfig { nonce: *self.kernel_nonce.read(), hook })
    }

    async fn kernel_current_nonce(&self, _account: Address) -> eyre::Result<u32> {
        self.call()?;
        Ok(*self.kernel_nonce.read())
    }

    async fn estimate_fees(&self) -> eyre::Result<(U256, U256)> {
        self.call()?;
        Ok((U256::from(2_000_000_000u64), U256::from(1_000_000_000u64)))
    }

    async fn nft_balance_of(&self, _nft: Address, owner: Address) -> eyre::Result<U256> {
        self.call()?;
        Ok(self.nft_balances.read().get(&owner).copied().unwrap_or_default())
    }

    async fn nft_total_supply(&self, _nft: Address) -> eyre::Result<U256> {
        self.call()?;
        Ok(self.nft_balances.read().values().fold(U256::zero(), |acc, b| acc + b))
    }
}

/// Bundler accepting every user operation and including it after `pending_polls` receipt polls
#[derive(Debug, Default)]
pub struct MockBundler {
    pub sent: RwLock<Vec<UserOperation>>,
    pub pending_polls: RwLock<usize>,
    pub estimations: AtomicUsize,
    pub receipt_polls: AtomicUsize,
    pub fail_send: RwLock<Option<String>>,
    pub revert: RwLock<bool>,
}

impl MockBundler {
    pub fn sent(&self) -> Vec<UserOperation> {
        self.sent.read().clone()
    }

    /// Transaction hash the user operation is included with
    pub fn transaction_hash(hash: &UserOperationHash) -> H256 {
        H256::from(ethers::utils::keccak256(hash.as_fixed_bytes()))
    }
}

#[async_trait::async_trait]
impl BundlerApi for MockBundler {
    async fn estimate_user_operation_gas(
        &self,
        _uo: &UserOperation,
        _entry_point: Address,
    ) -> eyre::Result<UserOperationGasEstimation> {
        self.estimations.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_send.read().clone() {
            return Err(eyre::eyre!(err));
        }
        Ok(UserOperationGasEstimation {
            pre_verification_gas: 50_000.into(),
            verification_gas_limit: 150_000.into(),
            call_gas_limit: 80_000.into(),
            paymaster_verification_gas_limit: None,
            paymaster_post_op_gas_limit: None,
        })
    }

    async fn send_user_operation(
        &self,
        uo: &UserOperation,
        entry_point: Address,
    ) -> eyre::Result<UserOperationHash> {
        if let Some(err) = self.fail_send.read().clone() {
            return Err(eyre::eyre!(err));
        }
        self.sent.write().push(uo.clone());
        Ok(uo.hash(&entry_point, CHAIN_ID))
    }

    async fn get_user_operation_receipt(
        &self,
        hash: &UserOperationHash,
    ) -> eyre::Result<Option<UserOperationReceipt>> {
        self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        {
            let mut pending = self.pending_polls.write();
            if *pending > 0 {
                *pending -= 1;
                return Ok(None);
            }
        }

        let success = !*self.revert.read();
        Ok(Some(UserOperationReceipt {
            user_operation_hash: *hash,
            success,
            reason: if success { None } else { Some("execution reverted".into()) },
            tx_receipt: TransactionReceipt {
                transaction_hash: Self::transaction_hash(hash),
                ..Default::default()
            },
            ..Default::default()
        }))
    }
}

/// Paymaster sponsoring everything
#[derive(Debug, Default)]
pub struct MockPaymaster {
    pub stub_calls: AtomicUsize,
    pub data_calls: AtomicUsize,
    pub fail: RwLock<Option<String>>,
}

impl MockPaymaster {
    pub fn sponsor() -> SponsorData {
        SponsorData {
            paymaster: Address::from_low_u64_be(0x9a7),
            paymaster_data: Bytes::from(vec![0x01, 0x02]),
            paymaster_verification_gas_limit: Some(60_000.into()),
            paymaster_post_op_gas_limit: Some(1.into()),
            is_final: false,
        }
    }
}

#[async_trait::async_trait]
impl PaymasterApi for MockPaymaster {
    async fn get_paymaster_stub_data(
        &self,
        _uo: &UserOperation,
        _entry_point: Address,
        _chain_id: u64,
    ) -> eyre::Result<SponsorData> {
        self.stub_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail.read().clone() {
            return Err(eyre::eyre!(err));
        }
        Ok(Self::sponsor())
    }

    async fn get_paymaster_data(
        &self,
        _uo: &UserOperation,
        _entry_point: Address,
        _chain_id: u64,
    ) -> eyre::Result<SponsorData> {
        self.data_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail.read().clone() {
            return Err(eyre::eyre!(err));
        }
        Ok(Self::sponsor())
    }
}

/// Connector handing out networks over the same mocks, counting connections
#[derive(Debug, Default)]
pub struct MockConnector {
    pub chain: Arc<MockChain>,
    pub bundler: Arc<MockBundler>,
    pub paymaster: Arc<MockPaymaster>,
    pub connects: AtomicUsize,
    /// Connecting fails with this provider error when set
    pub fail: RwLock<Option<String>>,
}

impl MockConnector {
    pub fn network(&self) -> Network {
        Network {
            chain_id: CHAIN_ID,
            chain: self.chain.clone(),
            bundler: self.bundler.clone(),
            paymaster: self.paymaster.clone(),
            config: AccountConfig::default(),
            polling: ReceiptPolling {
                interval: Duration::from_millis(1),
                timeout: Duration::from_millis(200),
            },
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Whether anything reached the network
    pub fn untouched(&self) -> bool {
        self.connects() == 0 && self.chain.calls() == 0 && self.bundler.sent().is_empty()
    }
}

#[async_trait::async_trait]
impl Connect for MockConnector {
    async fn connect(&self) -> Result<Network, AccountError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(inner) = self.fail.read().clone() {
            return Err(AccountError::Provider { inner });
        }
        Ok(self.network())
    }
}
