//! Session key lifecycle: grant, consume, revoke, status and clear
use crate::{
    clock::{Clock, SystemClock},
    descriptor::SessionDescriptor,
    error::{SessionError, StoreError},
    status::{SessionState, SessionStatus},
    store::{load_or_ignore, SessionStore},
};
use ethers::{
    abi::AbiEncode,
    contract::EthCall,
    core::rand,
    signers::LocalWallet,
    types::{Address, Bytes, H256, H32, U256},
};
use smartkey_account::{
    AccountError, CallPermission, Connect, KernelAccount, KernelClient, KernelValidator,
    OperationEvent, OperationHash, PermissionValidator, Policy, SmartAccount,
};
use smartkey_contracts::magic_badge_api::MintCall;
use smartkey_primitives::{
    constants::session::{RATE_LIMIT_INTERVAL_SECS, USAGE_LIMIT, VALIDITY_SECS},
    Call,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// When a session key operation counts as done
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Settlement {
    /// As soon as the bundler accepts the user operation
    #[default]
    Optimistic,
    /// Once the user operation receipt shows a successful execution
    WaitForReceipt,
}

/// What a session key may do, and for how long
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// The only contract the session key may call
    pub target: Address,
    /// The only function of `target` the session key may call
    pub selector: H32,
    /// Call performed when the session is consumed
    pub call_data: Bytes,
    pub description: String,
    pub validity_secs: u64,
    pub usage_limit: u32,
    pub rate_limit_interval_secs: u64,
    pub settlement: Settlement,
}

impl SessionConfig {
    /// Session allowed to `mint()` on the NFT contract
    pub fn mint(nft: Address) -> Self {
        Self {
            target: nft,
            selector: H32(MintCall::selector()),
            call_data: MintCall.encode().into(),
            description: "Mint NFT with session key".into(),
            validity_secs: VALIDITY_SECS,
            usage_limit: USAGE_LIMIT,
            rate_limit_interval_secs: RATE_LIMIT_INTERVAL_SECS,
            settlement: Settlement::default(),
        }
    }

    pub fn settlement(mut self, settlement: Settlement) -> Self {
        self.settlement = settlement;
        self
    }

    /// Validity window, call scope (no native value) and rate limit
    pub fn policies(&self, valid_after: u64, valid_until: u64) -> Vec<Policy> {
        vec![
            Policy::Timestamp { valid_after, valid_until },
            Policy::Call {
                permissions: vec![CallPermission {
                    target: self.target,
                    selector: self.selector,
                    value_limit: U256::zero(),
                }],
            },
            Policy::RateLimit {
                interval: self.rate_limit_interval_secs,
                count: self.usage_limit.into(),
                start_at: 0,
            },
        ]
    }

    pub fn call(&self) -> Call {
        Call::new(self.target, self.call_data.clone()).description(self.description.clone())
    }
}

/// Result of a successful consume
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionUse {
    pub hash: OperationHash,
    /// Known only when waiting for the receipt
    pub transaction_hash: Option<H256>,
    /// Stored descriptor after the use
    pub descriptor: SessionDescriptor,
}

/// Manages the single session key slot
///
/// Grant, consume, revoke and clear run one at a time, so two concurrent consumes can't both pass
/// the usage check.
#[derive(Debug)]
pub struct SessionManager<C: Connect> {
    connector: Arc<C>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    lock: Mutex<()>,
}

impl<C: Connect> SessionManager<C> {
    pub fn new(connector: Arc<C>, store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { connector, store, clock: Arc::new(SystemClock), config, lock: Mutex::new(()) }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Creates a session key for the owner's account and stores it, replacing any previous one
    pub async fn grant(&self, owner: &SmartAccount) -> Result<SessionDescriptor, SessionError> {
        if !owner.owner_authority.can_sign() {
            return Err(SessionError::OwnerAuthorityMissing);
        }

        let _guard = self.lock.lock().await;

        let now = self.clock.now();
        let valid_until = now.saturating_add(self.config.validity_secs);
        let wallet = LocalWallet::new(&mut rand::thread_rng());

        let network = owner.client.network();
        let validator = PermissionValidator::new(
            network.config.permission,
            Arc::new(wallet.clone()),
            self.config.policies(now, valid_until),
        );
        let approval = owner.client.account().approve(network, &validator).await?;
        let serialized_account = approval.serialize()?;

        // the account operated by the session key, the owner staying root
        let account = KernelAccount::from_approval(network, approval, Arc::new(validator)).await?;

        let usage_limit = self.config.usage_limit;
        let descriptor =
            SessionDescriptor::new(&wallet, valid_until, usage_limit, serialized_account);
        self.store.save(&descriptor)?;

        info!(
            "Session key {:?} granted on {:?}, valid until {valid_until}, {} use(s)",
            descriptor.session_key_address,
            account.address(),
            descriptor.usage_limit
        );

        Ok(descriptor)
    }

    /// Performs the configured call with the session key
    ///
    /// Local checks (active, usage, expiry, approval) fail without touching the network or the
    /// observer. Past them, the observer always gets `Submitted` first, then `Included` or
    /// `Failed`. The use is stored before the operation is sent, so a store failure sends nothing,
    /// and it is given back when the operation fails.
    pub async fn consume<F>(&self, mut observer: F) -> Result<SessionUse, SessionError>
    where
        F: FnMut(OperationEvent) + Send,
    {
        let _guard = self.lock.lock().await;

        let descriptor = self.load_or_discard()?.ok_or(SessionError::NotFound)?;
        descriptor.check_usable(self.clock.now())?;
        let approval = descriptor.approval()?;
        let validator = approval.permission_validator(Arc::new(descriptor.signer()?))?;

        observer(OperationEvent::Submitted);

        let reserved = descriptor.used_once();
        if let Err(err) = self.store.save(&reserved) {
            let err = SessionError::from(err);
            warn!("Session key use could not be stored: {err}");
            observer(OperationEvent::Failed { error: err.to_string() });
            return Err(err);
        }

        let res = async {
            let network = self.connector.connect().await?;
            let account =
                KernelAccount::from_approval(&network, approval, Arc::new(validator)).await?;
            let client = KernelClient::new(account, network);
            self.submit(&client, &mut observer).await
        }
        .await;

        match res {
            Ok((hash, transaction_hash)) => {
                info!(
                    "Session key used ({}/{}), operation {hash}",
                    reserved.usage_count, reserved.usage_limit
                );
                observer(OperationEvent::Included { hash, transaction_hash });
                Ok(SessionUse { hash, transaction_hash, descriptor: reserved })
            }
            Err(err) => {
                warn!("Session key operation failed: {err}");
                if let Err(store_err) = self.store.save(&descriptor) {
                    warn!("Session key use could not be given back: {store_err}");
                }
                observer(OperationEvent::Failed { error: err.to_string() });
                Err(err)
            }
        }
    }

    async fn submit<F>(
        &self,
        client: &KernelClient,
        observer: &mut F,
    ) -> Result<(OperationHash, Option<H256>), SessionError>
    where
        F: FnMut(OperationEvent) + Send,
    {
        let uo_hash = client.send_user_operation(&[self.config.call()]).await?;
        let hash = OperationHash::UserOperation(uo_hash);
        observer(OperationEvent::Processing { hash });

        match self.config.settlement {
            Settlement::Optimistic => Ok((hash, None)),
            Settlement::WaitForReceipt => {
                let receipt = client.wait_for_user_operation_receipt(&uo_hash).await?;
                if !receipt.success {
                    let err = AccountError::Reverted { hash: uo_hash, reason: receipt.reason };
                    return Err(err.into());
                }
                Ok((hash, Some(receipt.tx_receipt.transaction_hash)))
            }
        }
    }

    /// Uninstalls the session key's permission from the owner's account, then clears the slot
    ///
    /// The slot is left untouched when the removal fails.
    pub async fn revoke(&self, owner: &SmartAccount) -> Result<H256, SessionError> {
        let _guard = self.lock.lock().await;

        let descriptor = self.load_or_discard()?.ok_or(SessionError::NotFound)?;
        let approval = descriptor.approval()?;
        if !owner.owner_authority.can_sign() {
            return Err(SessionError::OwnerAuthorityMissing);
        }
        let validation_id = approval.watch_only_validator().validation_id();

        let network = self.connector.connect().await?;
        let account = KernelAccount::create(&network, owner.owner_authority.clone()).await?;
        if account.address() != approval.account_address {
            return Err(AccountError::AccountMismatch {
                expected: approval.account_address,
                actual: account.address(),
            }
            .into());
        }

        let client = KernelClient::new(account, network);
        let tx_hash = client.uninstall_validation(validation_id).await?;
        self.store.clear()?;

        info!("Session key {:?} revoked in {tx_hash:?}", descriptor.session_key_address);

        Ok(tx_hash)
    }

    /// Stored descriptor, corrupt data reads as nothing stored
    pub fn descriptor(&self) -> Result<Option<SessionDescriptor>, SessionError> {
        Ok(load_or_ignore(self.store.as_ref())?)
    }

    pub fn status(&self) -> Result<Option<SessionStatus>, SessionError> {
        let now = self.clock.now();
        Ok(self.descriptor()?.map(|d| SessionStatus::derive(&d, now)))
    }

    pub fn state(&self) -> Result<SessionState, SessionError> {
        Ok(SessionState::of(self.descriptor()?.as_ref(), self.clock.now()))
    }

    /// Deletes the stored session without revoking it on-chain
    pub async fn clear(&self) -> Result<(), SessionError> {
        let _guard = self.lock.lock().await;
        self.store.clear()?;
        debug!("Session cleared");
        Ok(())
    }

    /// Loads the stored session, discarding it if it can't be decoded
    pub async fn restore(&self) -> Result<Option<SessionDescriptor>, SessionError> {
        let _guard = self.lock.lock().await;
        self.load_or_discard()
    }

    fn load_or_discard(&self) -> Result<Option<SessionDescriptor>, SessionError> {
        match self.store.load() {
            Err(StoreError::Corrupt { inner }) => {
                warn!("Discarding corrupt session: {inner}");
                self.store.clear()?;
                Ok(None)
            }
            res => Ok(res?),
        }
    }
}
