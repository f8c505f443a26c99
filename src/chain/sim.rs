//! In-memory chain backend for development runs and tests.
//!
//! Mimics the deployed leave contract: an owner, a per-account request
//! counter, and receipt streams that confirm after a configurable delay.
//! Failures can be injected on the next submission or the next receipt wait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::chain::{
    Address, ContractCall, ContractClient, ReceiptUpdate, TxHandle, WalletSession,
};
use crate::error::{LeaveChainError, Result};

/// Simulated leave contract plus wallet session
pub struct SimulatedChain {
    owner: Address,
    account: Option<Address>,
    leave_counts: Arc<RwLock<HashMap<Address, u64>>>,
    pending: RwLock<HashMap<TxHandle, ContractCall>>,
    confirm_delay: Duration,
    fail_next_submit: AtomicBool,
    fail_next_receipt: AtomicBool,
    submit_calls: AtomicU64,
    count_reads: AtomicU64,
}

impl SimulatedChain {
    pub fn new(owner: Address, account: Option<Address>, confirm_delay: Duration) -> Self {
        Self {
            owner,
            account,
            leave_counts: Arc::new(RwLock::new(HashMap::new())),
            pending: RwLock::new(HashMap::new()),
            confirm_delay,
            fail_next_submit: AtomicBool::new(false),
            fail_next_receipt: AtomicBool::new(false),
            submit_calls: AtomicU64::new(0),
            count_reads: AtomicU64::new(0),
        }
    }

    /// Reject the next `submit_write` as if signing was declined
    pub fn fail_next_submit(&self) {
        self.fail_next_submit.store(true, Ordering::Relaxed);
    }

    /// Fail the next receipt wait as if the transaction reverted
    pub fn fail_next_receipt(&self) {
        self.fail_next_receipt.store(true, Ordering::Relaxed);
    }

    /// Number of `submit_write` calls that reached this backend
    pub fn submit_calls(&self) -> u64 {
        self.submit_calls.load(Ordering::Relaxed)
    }

    /// Number of `read_leave_count` calls that reached this backend
    pub fn count_reads(&self) -> u64 {
        self.count_reads.load(Ordering::Relaxed)
    }
}

impl WalletSession for SimulatedChain {
    fn account(&self) -> Option<Address> {
        self.account
    }
}

#[async_trait::async_trait]
impl ContractClient for SimulatedChain {
    async fn read_owner(&self) -> Result<Option<Address>> {
        Ok(Some(self.owner))
    }

    async fn read_leave_count(&self, account: &Address) -> Result<u64> {
        self.count_reads.fetch_add(1, Ordering::Relaxed);
        let counts = self.leave_counts.read().await;
        Ok(counts.get(account).copied().unwrap_or(0))
    }

    async fn submit_write(&self, call: &ContractCall) -> Result<TxHandle> {
        self.submit_calls.fetch_add(1, Ordering::Relaxed);

        if self.fail_next_submit.swap(false, Ordering::Relaxed) {
            return Err(LeaveChainError::SubmissionRejected {
                reason: "signing rejected by wallet".to_string(),
            });
        }

        let handle = TxHandle::new(format!("0x{}", Uuid::new_v4().simple()));
        self.pending.write().await.insert(handle.clone(), call.clone());

        let args: Vec<String> = call.args().iter().map(|arg| arg.to_string()).collect();
        debug!(
            "Simulated {}({}) submitted as {}",
            call.function_name(),
            args.join(", "),
            handle
        );
        Ok(handle)
    }

    async fn receipt_updates(
        &self,
        handle: &TxHandle,
    ) -> Result<BoxStream<'static, ReceiptUpdate>> {
        let call = self.pending.write().await.remove(handle).ok_or_else(|| {
            LeaveChainError::Internal(format!("unknown transaction handle: {}", handle))
        })?;

        let fail = self.fail_next_receipt.swap(false, Ordering::Relaxed);
        let delay = self.confirm_delay;
        let submitter = self.account;
        let leave_counts = self.leave_counts.clone();

        let updates = stream::unfold(0u8, move |step| {
            let call = call.clone();
            let leave_counts = leave_counts.clone();
            async move {
                match step {
                    0 => Some((ReceiptUpdate::Confirming, 1)),
                    1 => {
                        tokio::time::sleep(delay).await;
                        if fail {
                            return Some((
                                ReceiptUpdate::Failed {
                                    reason: "transaction reverted".to_string(),
                                },
                                2,
                            ));
                        }
                        // The contract's state change lands with the receipt
                        if let ContractCall::ApplyLeave { .. } = call {
                            if let Some(account) = submitter {
                                *leave_counts.write().await.entry(account).or_insert(0) += 1;
                            }
                        }
                        Some((ReceiptUpdate::Confirmed, 2))
                    }
                    _ => None,
                }
            }
        });

        Ok(updates.boxed())
    }
}
