use ethers::{signers::Signer, types::Address};
use smartkey_account::{
    testing::{MockBundler, MockConnector, CHAIN_ID},
    AccountError, EcdsaValidator, OperationEvent, OperationHash, SmartAccount,
    SmartAccountProvisioner, UserOpStatus,
};
use smartkey_primitives::ConnectedWallet;
use smartkey_session::{
    FileSessionStore, ManualClock, MemorySessionStore, SessionConfig, SessionDescriptor,
    SessionError, SessionManager, SessionState, SessionStatus, SessionStore, Settlement,
    StoreError,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

const PHRASE: &str = "test test test test test test test test test test test junk";

fn nft() -> Address {
    Address::from_low_u64_be(0xbeef)
}

struct Harness {
    /// Network the owner account was provisioned on
    owner_mocks: Arc<MockConnector>,
    /// Network the session manager connects to
    mocks: Arc<MockConnector>,
    store: Arc<MemorySessionStore>,
    clock: Arc<ManualClock>,
    manager: SessionManager<MockConnector>,
    owner: SmartAccount,
}

async fn harness(now: u64, config: SessionConfig) -> Harness {
    let owner_mocks = Arc::new(MockConnector::default());
    let wallet = ConnectedWallet::embedded_from_phrase(PHRASE, 0).unwrap();
    let owner = SmartAccountProvisioner::new(owner_mocks.clone()).provision(&wallet).await.unwrap();

    let mocks = Arc::new(MockConnector::default());
    let store = Arc::new(MemorySessionStore::default());
    let clock = Arc::new(ManualClock::new(now));
    let manager = SessionManager::new(mocks.clone(), store.clone(), config).clock(clock.clone());

    Harness { owner_mocks, mocks, store, clock, manager, owner }
}

fn stored(h: &Harness) -> SessionDescriptor {
    h.store.load().unwrap().unwrap()
}

/// Memory store whose saves can be made to fail
#[derive(Debug, Default)]
struct FullDiskStore {
    inner: MemorySessionStore,
    full: AtomicBool,
}

impl SessionStore for FullDiskStore {
    fn load(&self) -> Result<Option<SessionDescriptor>, StoreError> {
        self.inner.load()
    }

    fn save(&self, descriptor: &SessionDescriptor) -> Result<(), StoreError> {
        if self.full.load(Ordering::SeqCst) {
            return Err(StoreError::Io { inner: "disk full".into() });
        }
        self.inner.save(descriptor)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear()
    }
}

#[tokio::test]
async fn grant_then_status() {
    let h = harness(0, SessionConfig::mint(nft())).await;

    let descriptor = h.manager.grant(&h.owner).await.unwrap();
    assert_eq!(descriptor.valid_until, 3600);
    assert_eq!(descriptor.usage_limit, 3);
    assert_eq!(descriptor.usage_count, 0);
    assert!(descriptor.is_active);
    assert_eq!(stored(&h), descriptor);
    assert_eq!(descriptor.signer().unwrap().address(), descriptor.session_key_address);

    let approval = descriptor.approval().unwrap();
    assert_eq!(approval.account_address, h.owner.account_address);
    assert_eq!(approval.owner, h.owner.owner_address);
    assert_eq!(approval.session_key_address, descriptor.session_key_address);

    // granting only talks to the owner's network
    assert!(h.mocks.untouched());
    assert!(h.owner_mocks.bundler.sent().is_empty());

    h.clock.set(100);
    assert_eq!(
        h.manager.status().unwrap(),
        Some(SessionStatus {
            is_active: true,
            time_remaining: 3500,
            usage_remaining: 3,
            total_usage: 0,
            usage_limit: 3
        })
    );
    assert_eq!(h.manager.state().unwrap(), SessionState::Active);
}

#[tokio::test]
async fn grant_replaces_previous_session() {
    let h = harness(0, SessionConfig::mint(nft())).await;

    let first = h.manager.grant(&h.owner).await.unwrap();
    h.clock.advance(10);
    let second = h.manager.grant(&h.owner).await.unwrap();

    assert_ne!(first.session_key_address, second.session_key_address);
    assert_eq!(stored(&h), second);
    assert_eq!(second.valid_until, 3610);
}

#[tokio::test]
async fn grant_requires_owner_authority() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    let watch_only = SmartAccount {
        owner_authority: Arc::new(EcdsaValidator::watch_only(
            h.owner.client.network().config.ecdsa_validator,
            h.owner.owner_address,
        )),
        ..h.owner.clone()
    };

    assert_eq!(
        h.manager.grant(&watch_only).await.unwrap_err(),
        SessionError::OwnerAuthorityMissing
    );
    assert_eq!(h.store.raw(), None);
}

#[tokio::test]
async fn consume_increments_usage_only() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    let granted = h.manager.grant(&h.owner).await.unwrap();

    let mut events = vec![];
    let res = h.manager.consume(|e| events.push(e)).await.unwrap();

    assert_eq!(res.descriptor, stored(&h));
    assert_eq!(res.descriptor.usage_count, 1);
    assert_eq!(SessionDescriptor { usage_count: 0, ..res.descriptor.clone() }, granted);
    assert_eq!(res.transaction_hash, None);

    let sent = h.mocks.bundler.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sender, granted.approval().unwrap().account_address);
    // first use carries the owner's enable approval, starting with the no-hook marker
    assert_eq!(&sent[0].signature[..20], Address::from_low_u64_be(1).as_bytes());

    let uo_hash = match res.hash {
        OperationHash::UserOperation(hash) => hash,
        other => panic!("expected a user operation hash, got {other:?}"),
    };
    assert_eq!(
        events,
        vec![
            OperationEvent::Submitted,
            OperationEvent::Processing { hash: res.hash },
            OperationEvent::Included { hash: res.hash, transaction_hash: None },
        ]
    );
    assert_eq!(uo_hash, sent[0].hash(&h.mocks.network().config.entry_point, CHAIN_ID));
}

#[tokio::test]
async fn consume_waiting_for_receipt() {
    let config = SessionConfig::mint(nft()).settlement(Settlement::WaitForReceipt);
    let h = harness(0, config).await;
    h.manager.grant(&h.owner).await.unwrap();
    *h.mocks.bundler.pending_polls.write() = 1;

    let mut events = vec![];
    let res = h.manager.consume(|e| events.push(e)).await.unwrap();

    let OperationHash::UserOperation(uo_hash) = res.hash else {
        panic!("expected a user operation hash");
    };
    let tx_hash = MockBundler::transaction_hash(&uo_hash);
    assert_eq!(res.transaction_hash, Some(tx_hash));
    assert_eq!(
        events.last(),
        Some(&OperationEvent::Included { hash: res.hash, transaction_hash: Some(tx_hash) })
    );
    assert_eq!(stored(&h).usage_count, 1);
}

#[tokio::test]
async fn reverted_consume_keeps_usage() {
    let config = SessionConfig::mint(nft()).settlement(Settlement::WaitForReceipt);
    let h = harness(0, config).await;
    h.manager.grant(&h.owner).await.unwrap();
    *h.mocks.bundler.revert.write() = true;

    let mut events = vec![];
    let err = h.manager.consume(|e| events.push(e)).await.unwrap_err();
    assert!(matches!(err, SessionError::Account(AccountError::Reverted { .. })));
    assert!(!err.is_local());
    assert_eq!(
        events.iter().map(OperationEvent::status).collect::<Vec<_>>(),
        vec![UserOpStatus::Submitted, UserOpStatus::Processing, UserOpStatus::Failed]
    );
    assert_eq!(stored(&h).usage_count, 0);
}

#[tokio::test]
async fn upstream_failure_keeps_usage() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    h.manager.grant(&h.owner).await.unwrap();
    *h.mocks.paymaster.fail.write() = Some("sponsorship denied".into());

    let mut events = vec![];
    assert_eq!(
        h.manager.consume(|e| events.push(e)).await.unwrap_err(),
        SessionError::Account(AccountError::Paymaster { inner: "sponsorship denied".into() })
    );
    assert_eq!(events.first(), Some(&OperationEvent::Submitted));
    assert_eq!(events.last().map(OperationEvent::status), Some(UserOpStatus::Failed));
    assert_eq!(stored(&h).usage_count, 0);
}

#[tokio::test]
async fn unsaved_use_sends_nothing() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    let store = Arc::new(FullDiskStore::default());
    let manager = SessionManager::new(h.mocks.clone(), store.clone(), SessionConfig::mint(nft()))
        .clock(h.clock.clone());
    let granted = manager.grant(&h.owner).await.unwrap();
    store.full.store(true, Ordering::SeqCst);

    let mut events = vec![];
    let err = manager.consume(|e| events.push(e)).await.unwrap_err();
    let store_err = SessionError::Store(StoreError::Io { inner: "disk full".into() });
    assert_eq!(err, store_err);
    assert_eq!(
        events,
        vec![OperationEvent::Submitted, OperationEvent::Failed { error: store_err.to_string() }]
    );
    assert!(h.mocks.untouched());
    assert_eq!(store.load().unwrap().unwrap(), granted);

    // the next use goes through once the store is writable again
    store.full.store(false, Ordering::SeqCst);
    let res = manager.consume(|_| {}).await.unwrap();
    assert_eq!(res.descriptor.usage_count, 1);
    assert_eq!(store.load().unwrap().unwrap(), res.descriptor);
    assert_eq!(h.mocks.bundler.sent().len(), 1);
}

#[tokio::test]
async fn failed_connect_gives_use_back() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    let granted = h.manager.grant(&h.owner).await.unwrap();
    *h.mocks.fail.write() = Some("connection refused".into());

    let mut events = vec![];
    let err = h.manager.consume(|e| events.push(e)).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Account(AccountError::Provider { inner: "connection refused".into() })
    );
    assert!(!err.is_local());
    assert_eq!(
        events,
        vec![OperationEvent::Submitted, OperationEvent::Failed { error: err.to_string() }]
    );
    assert_eq!(stored(&h), granted);
    assert!(h.mocks.bundler.sent().is_empty());
}

#[tokio::test]
async fn exhausted_session_never_reaches_network() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    let granted = h.manager.grant(&h.owner).await.unwrap();

    for usage_count in [3, 4, u32::MAX] {
        h.store.save(&SessionDescriptor { usage_count, ..granted.clone() }).unwrap();

        let mut events = vec![];
        let err = h.manager.consume(|e| events.push(e)).await.unwrap_err();
        assert_eq!(err, SessionError::UsageLimitExceeded);
        assert!(err.is_local());
        assert!(events.is_empty());
        assert_eq!(stored(&h).usage_count, usage_count);
    }
    assert_eq!(h.manager.state().unwrap(), SessionState::Exhausted);
    assert!(h.mocks.untouched());
}

#[tokio::test]
async fn expired_session() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    h.manager.grant(&h.owner).await.unwrap();

    for now in [3600, 3601, 100_000] {
        h.clock.set(now);
        assert_eq!(h.manager.consume(|_| {}).await.unwrap_err(), SessionError::Expired);

        let status = h.manager.status().unwrap().unwrap();
        assert!(!status.is_active);
        assert_eq!(status.time_remaining, 0);
        assert_eq!(status.total_usage, 0);
    }
    assert_eq!(h.manager.state().unwrap(), SessionState::Expired);
    assert!(h.mocks.untouched());
}

#[tokio::test]
async fn local_checks_run_in_order() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    assert_eq!(h.manager.consume(|_| {}).await.unwrap_err(), SessionError::NotFound);

    let granted = h.manager.grant(&h.owner).await.unwrap();

    let inactive = SessionDescriptor { is_active: false, usage_count: 3, ..granted.clone() };
    h.store.save(&inactive).unwrap();
    assert_eq!(h.manager.consume(|_| {}).await.unwrap_err(), SessionError::Inactive);

    h.store.save(&SessionDescriptor { serialized_account: String::new(), ..granted }).unwrap();
    assert_eq!(h.manager.consume(|_| {}).await.unwrap_err(), SessionError::MissingApproval);

    assert!(h.mocks.untouched());
}

#[tokio::test]
async fn three_uses_then_exhausted() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    h.manager.grant(&h.owner).await.unwrap();
    h.clock.set(100);

    for _ in 0..3 {
        h.manager.consume(|_| {}).await.unwrap();
    }

    let status = h.manager.status().unwrap().unwrap();
    assert!(status.is_active);
    assert_eq!(status.usage_remaining, 0);
    assert_eq!(status.total_usage, 3);

    let err = h.manager.consume(|_| {}).await.unwrap_err();
    assert!(err.to_string().to_lowercase().contains("usage limit exceeded"));
    assert_eq!(stored(&h).usage_count, 3);
    assert_eq!(h.mocks.bundler.sent().len(), 3);
}

#[tokio::test]
async fn concurrent_consumes_respect_limit() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    let granted = h.manager.grant(&h.owner).await.unwrap();
    h.store.save(&SessionDescriptor { usage_count: 2, ..granted }).unwrap();

    let (a, b) = tokio::join!(h.manager.consume(|_| {}), h.manager.consume(|_| {}));

    let errors: Vec<_> = [a, b].into_iter().filter_map(Result::err).collect();
    assert_eq!(errors, vec![SessionError::UsageLimitExceeded]);
    assert_eq!(stored(&h).usage_count, 3);
    assert_eq!(h.mocks.bundler.sent().len(), 1);
}

#[tokio::test]
async fn revoke_without_session() {
    let h = harness(0, SessionConfig::mint(nft())).await;

    assert_eq!(h.manager.revoke(&h.owner).await.unwrap_err(), SessionError::NotFound);
    assert!(h.mocks.untouched());
}

#[tokio::test]
async fn revoke_uninstalls_and_clears() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    let granted = h.manager.grant(&h.owner).await.unwrap();

    let tx_hash = h.manager.revoke(&h.owner).await.unwrap();

    let sent = h.mocks.bundler.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sender, h.owner.account_address);
    let uo_hash = sent[0].hash(&h.mocks.network().config.entry_point, CHAIN_ID);
    assert_eq!(tx_hash, MockBundler::transaction_hash(&uo_hash));
    // sent with the owner's root validator
    assert!((sent[0].nonce >> 64).is_zero());

    assert_eq!(h.store.raw(), None);
    assert_eq!(h.manager.status().unwrap(), None);
    assert_eq!(h.manager.state().unwrap(), SessionState::None);
    assert_ne!(granted.session_key_address, Address::zero());
}

#[tokio::test]
async fn failed_revoke_keeps_session() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    let granted = h.manager.grant(&h.owner).await.unwrap();

    *h.mocks.bundler.fail_send.write() = Some("bundler unavailable".into());
    assert_eq!(
        h.manager.revoke(&h.owner).await.unwrap_err(),
        SessionError::Account(AccountError::Bundler { inner: "bundler unavailable".into() })
    );
    assert_eq!(stored(&h), granted);

    *h.mocks.bundler.fail_send.write() = None;
    *h.mocks.chain.account_address.write() = Address::from_low_u64_be(0xdead);
    assert!(matches!(
        h.manager.revoke(&h.owner).await.unwrap_err(),
        SessionError::Account(AccountError::AccountMismatch { .. })
    ));
    assert_eq!(stored(&h), granted);
    assert!(h.mocks.bundler.sent().is_empty());
}

#[tokio::test]
async fn clear_and_restore() {
    let h = harness(0, SessionConfig::mint(nft())).await;
    let granted = h.manager.grant(&h.owner).await.unwrap();
    assert_eq!(h.manager.restore().await.unwrap(), Some(granted));

    h.manager.clear().await.unwrap();
    assert_eq!(h.manager.status().unwrap(), None);
    h.manager.clear().await.unwrap();
    assert!(h.mocks.untouched());
}

#[tokio::test]
async fn corrupt_session_is_discarded() {
    let mocks = Arc::new(MockConnector::default());
    let store = Arc::new(MemorySessionStore::with_raw("{\"not\": \"a session\"}"));
    let manager = SessionManager::new(mocks.clone(), store.clone(), SessionConfig::mint(nft()));

    // reading is side-effect free
    assert_eq!(manager.status().unwrap(), None);
    assert!(store.raw().is_some());

    assert_eq!(manager.restore().await.unwrap(), None);
    assert_eq!(store.raw(), None);
    assert!(mocks.untouched());
}

#[tokio::test]
async fn file_backed_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let h = harness(0, SessionConfig::mint(nft())).await;

    let manager = SessionManager::new(
        h.mocks.clone(),
        Arc::new(FileSessionStore::new(&path)),
        SessionConfig::mint(nft()),
    )
    .clock(h.clock.clone());
    let granted = manager.grant(&h.owner).await.unwrap();
    manager.consume(|_| {}).await.unwrap();
    drop(manager);

    let restarted = SessionManager::new(
        h.mocks.clone(),
        Arc::new(FileSessionStore::new(&path)),
        SessionConfig::mint(nft()),
    )
    .clock(h.clock.clone());
    let restored = restarted.restore().await.unwrap().unwrap();
    assert_eq!(restored, SessionDescriptor { usage_count: 1, ..granted });
    assert_eq!(restarted.status().unwrap().unwrap().usage_remaining, 2);
}
