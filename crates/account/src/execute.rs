//! Operation execution with lifecycle events
use crate::{client::KernelClient, error::AccountError};
use ethers::types::H256;
use smartkey_primitives::{Call, UserOperationHash};
use std::fmt;
use tracing::{info, warn};

/// Lifecycle of an operation as shown to the user
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UserOpStatus {
    #[default]
    Idle,
    Composing,
    Submitted,
    Processing,
    Included,
    Failed,
}

impl UserOpStatus {
    /// User-facing text of the status
    pub fn message(&self) -> &'static str {
        match self {
            UserOpStatus::Idle => "Ready to submit",
            UserOpStatus::Composing => "Preparing operation...",
            UserOpStatus::Submitted => "Submitted to network",
            UserOpStatus::Processing => "Bundling your operation...",
            UserOpStatus::Included => "Done. Your action is on-chain.",
            UserOpStatus::Failed => "Operation failed",
        }
    }

    /// Whether an operation in this status is still in flight
    pub fn is_pending(&self) -> bool {
        matches!(self, UserOpStatus::Submitted | UserOpStatus::Processing)
    }
}

impl fmt::Display for UserOpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Identifier of a submitted operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationHash {
    /// Transaction of a single call (already included)
    Transaction(H256),
    /// User operation of a batch
    UserOperation(UserOperationHash),
}

impl fmt::Display for OperationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationHash::Transaction(hash) => write!(f, "{hash:?}"),
            OperationHash::UserOperation(hash) => write!(f, "{hash}"),
        }
    }
}

/// Status transition reported to the observer of an operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationEvent {
    Submitted,
    Processing { hash: OperationHash },
    /// `transaction_hash` is unknown when inclusion is reported before the receipt
    Included { hash: OperationHash, transaction_hash: Option<H256> },
    Failed { error: String },
}

impl OperationEvent {
    pub fn status(&self) -> UserOpStatus {
        match self {
            OperationEvent::Submitted => UserOpStatus::Submitted,
            OperationEvent::Processing { .. } => UserOpStatus::Processing,
            OperationEvent::Included { .. } => UserOpStatus::Included,
            OperationEvent::Failed { .. } => UserOpStatus::Failed,
        }
    }
}

/// Outcome of an included operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationResult {
    pub hash: OperationHash,
    pub transaction_hash: H256,
}

/// Executes `calls` as one logical operation
///
/// A single call is sent in single execution mode and reported by its transaction hash, several
/// calls are submitted as one batched user operation so they are included atomically. The
/// observer sees `Submitted`, then `Processing` (with the user operation hash) once the bundler
/// accepts, then `Included`. `Failed` is reported right before an error is returned.
pub async fn execute_batch_operation<F>(
    client: &KernelClient,
    calls: &[Call],
    mut observer: F,
) -> Result<OperationResult, AccountError>
where
    F: FnMut(OperationEvent) + Send,
{
    if calls.is_empty() {
        return Err(AccountError::EmptyOperations);
    }

    observer(OperationEvent::Submitted);

    let res = match calls {
        [call] => submit_single(client, call.clone(), &mut observer).await,
        calls => submit_batch(client, calls, &mut observer).await,
    };

    match res {
        Ok(res) => {
            info!("Operation {} included in {:?}", res.hash, res.transaction_hash);
            observer(OperationEvent::Included {
                hash: res.hash,
                transaction_hash: Some(res.transaction_hash),
            });
            Ok(res)
        }
        Err(err) => {
            warn!("Operation with {} call(s) failed: {err}", calls.len());
            observer(OperationEvent::Failed { error: err.to_string() });
            Err(err)
        }
    }
}

async fn submit_single<F>(
    client: &KernelClient,
    call: Call,
    observer: &mut F,
) -> Result<OperationResult, AccountError>
where
    F: FnMut(OperationEvent) + Send,
{
    let uo_hash = client.send_user_operation(std::slice::from_ref(&call)).await?;
    observer(OperationEvent::Processing { hash: OperationHash::UserOperation(uo_hash) });

    let receipt = client.wait_for_user_operation_receipt(&uo_hash).await?;
    if !receipt.success {
        return Err(AccountError::Reverted { hash: uo_hash, reason: receipt.reason });
    }

    // a single call is reported by its transaction
    let transaction_hash = receipt.tx_receipt.transaction_hash;
    Ok(OperationResult { hash: OperationHash::Transaction(transaction_hash), transaction_hash })
}

async fn submit_batch<F>(
    client: &KernelClient,
    calls: &[Call],
    observer: &mut F,
) -> Result<OperationResult, AccountError>
where
    F: FnMut(OperationEvent) + Send,
{
    let uo_hash = client.send_user_operation(calls).await?;
    let hash = OperationHash::UserOperation(uo_hash);
    observer(OperationEvent::Processing { hash });

    let receipt = client.wait_for_user_operation_receipt(&uo_hash).await?;
    if !receipt.success {
        return Err(AccountError::Reverted { hash: uo_hash, reason: receipt.reason });
    }

    Ok(OperationResult { hash, transaction_hash: receipt.tx_receipt.transaction_hash })
}
