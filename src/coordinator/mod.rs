//! Transaction lifecycle coordination.
//!
//! The coordinator turns a caller intent into a submission through the
//! write capability, tracks the transaction from pending to its terminal
//! state, and reconciles on-chain reads after each confirmation. At most
//! one transaction is live per coordinator instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::chain::{ContractClient, TxHandle, WalletSession};
use crate::error::{LeaveChainError, Result};

pub mod cache;
pub mod state;

mod watcher;

pub use cache::{ContractFacts, ReadCache};
pub use state::{
    date_to_unix_seconds, ActionRequest, CoordinatorSnapshot, CoordinatorStats, TxState,
};

/// Lifecycle counters shared between the dispatcher and the watcher
pub(crate) struct LifecycleCounters {
    pub(crate) submissions: AtomicU64,
    pub(crate) confirmations: AtomicU64,
    pub(crate) failures: AtomicU64,
}

impl LifecycleCounters {
    fn new() -> Self {
        Self {
            submissions: AtomicU64::new(0),
            confirmations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }
}

/// Coordinates leave-request transactions against the deployed contract
pub struct LifecycleCoordinator {
    client: Arc<dyn ContractClient>,
    wallet: Arc<dyn WalletSession>,
    cache: Arc<ReadCache>,
    state: Arc<RwLock<TxState>>,
    last_handle: Arc<RwLock<Option<TxHandle>>>,
    last_error: Arc<RwLock<Option<String>>>,
    counters: Arc<LifecycleCounters>,
}

impl LifecycleCoordinator {
    /// Create a coordinator and issue the initial read-cache refresh.
    /// A failed first read is logged and leaves the default facts in place.
    pub async fn new(client: Arc<dyn ContractClient>, wallet: Arc<dyn WalletSession>) -> Self {
        let cache = Arc::new(ReadCache::new(client.clone(), wallet.clone()));

        if let Err(e) = cache.refresh().await {
            warn!("Initial contract read failed: {}", e);
        }

        Self {
            client,
            wallet,
            cache,
            state: Arc::new(RwLock::new(TxState::Idle)),
            last_handle: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
            counters: Arc::new(LifecycleCounters::new()),
        }
    }

    /// Currently connected account, if any
    pub fn account(&self) -> Option<crate::chain::Address> {
        self.wallet.account()
    }

    /// Submit a leave request for the given unix-second range
    pub async fn apply_leave(&self, start: u64, end: u64) -> Result<TxHandle> {
        self.dispatch(ActionRequest::ApplyLeave { start, end }).await
    }

    /// Approve an employee's leave request by index (owner action)
    pub async fn approve_leave(&self, employee: &str, index: i64) -> Result<TxHandle> {
        self.dispatch(ActionRequest::ApproveLeave {
            employee: employee.to_string(),
            index,
        })
        .await
    }

    /// Reject an employee's leave request by index (owner action)
    pub async fn reject_leave(&self, employee: &str, index: i64) -> Result<TxHandle> {
        self.dispatch(ActionRequest::RejectLeave {
            employee: employee.to_string(),
            index,
        })
        .await
    }

    /// Validate a request and forward it to the write capability.
    ///
    /// Resolves when the submission step completes; confirmation progress
    /// is observed through `snapshot`. Rejected locally with
    /// `AlreadyInFlight` while a submission is live, and with
    /// `InvalidInput` when the request breaks its own invariants - neither
    /// reaches the transport.
    pub async fn dispatch(&self, request: ActionRequest) -> Result<TxHandle> {
        let call = {
            let mut state = self.state.write().await;
            if state.is_in_flight() {
                return Err(LeaveChainError::AlreadyInFlight);
            }
            let call = request.to_call()?;
            *state = TxState::Submitting;
            call
        };
        *self.last_error.write().await = None;

        info!("Submitting {}", call.function_name());
        match self.client.submit_write(&call).await {
            Ok(handle) => {
                self.counters.submissions.fetch_add(1, Ordering::Relaxed);
                *self.last_handle.write().await = Some(handle.clone());
                *self.state.write().await = TxState::AwaitingConfirmation {
                    handle: handle.clone(),
                };
                info!("Submission accepted, awaiting confirmation of {}", handle);

                watcher::spawn(
                    self.client.clone(),
                    self.cache.clone(),
                    self.state.clone(),
                    self.last_error.clone(),
                    self.counters.clone(),
                    handle.clone(),
                );
                Ok(handle)
            }
            Err(e) => {
                let error = match e {
                    LeaveChainError::SubmissionRejected { .. } => e,
                    other => LeaveChainError::SubmissionRejected {
                        reason: other.to_string(),
                    },
                };
                let reason = error.to_string();
                error!("{}", reason);

                *self.state.write().await = TxState::Failed {
                    handle: None,
                    reason: reason.clone(),
                };
                *self.last_error.write().await = Some(reason);
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                Err(error)
            }
        }
    }

    /// Read-only view for the consuming surface
    pub async fn snapshot(&self) -> CoordinatorSnapshot {
        let facts = self.cache.facts().await;
        CoordinatorSnapshot {
            owner: facts.owner,
            my_leave_count: facts.my_leave_count,
            state: self.state.read().await.clone(),
            last_handle: self.last_handle.read().await.clone(),
            last_error: self.last_error.read().await.clone(),
        }
    }

    /// Lifecycle counters for diagnostics
    pub async fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            submissions: self.counters.submissions.load(Ordering::Relaxed),
            confirmations: self.counters.confirmations.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            refreshes: self.cache.refreshes_completed(),
            state: self.state.read().await.clone(),
        }
    }

    /// Force a cache refresh outside the lifecycle (first paint, reconnect)
    pub async fn refresh(&self) -> Result<()> {
        self.cache.refresh().await
    }

    /// Wait until no submission is in flight and return the state reached.
    /// Polls the state machine; a hung receipt wait hangs this too, so
    /// bound it externally where the transport may stall.
    pub async fn settled(&self) -> TxState {
        loop {
            let state = self.state.read().await.clone();
            if !state.is_in_flight() {
                return state;
            }
            tokio::time::sleep(crate::defaults::SETTLE_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Address, SimulatedChain};
    use std::time::Duration;

    const OWNER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const EMPLOYEE: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

    fn address(s: &str) -> Address {
        s.parse().unwrap()
    }

    async fn coordinator_over(
        account: Option<&str>,
        confirm_delay: Duration,
    ) -> (Arc<SimulatedChain>, LifecycleCoordinator) {
        let chain = Arc::new(SimulatedChain::new(
            address(OWNER),
            account.map(address),
            confirm_delay,
        ));
        let coordinator = LifecycleCoordinator::new(chain.clone(), chain.clone()).await;
        (chain, coordinator)
    }

    async fn settled(coordinator: &LifecycleCoordinator) -> TxState {
        tokio::time::timeout(Duration::from_secs(5), coordinator.settled())
            .await
            .expect("transaction did not settle in time")
    }

    #[tokio::test]
    async fn test_apply_leave_lifecycle() {
        let (_, coordinator) = coordinator_over(Some(EMPLOYEE), Duration::from_millis(5)).await;

        let start = date_to_unix_seconds("2024-01-10").unwrap();
        let end = date_to_unix_seconds("2024-01-15").unwrap();
        assert!(start < end);

        let handle = coordinator.apply_leave(start, end).await.unwrap();
        let final_state = settled(&coordinator).await;
        assert_eq!(
            final_state,
            TxState::Confirmed {
                handle: handle.clone()
            }
        );

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.last_handle, Some(handle));
        assert_eq!(snapshot.last_error, None);
        assert_eq!(snapshot.my_leave_count, 1);
        assert!(snapshot.actions_enabled());

        let stats = coordinator.stats().await;
        assert_eq!(stats.submissions, 1);
        assert_eq!(stats.confirmations, 1);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test]
    async fn test_inverted_dates_never_reach_the_transport() {
        let (chain, coordinator) =
            coordinator_over(Some(EMPLOYEE), Duration::from_millis(5)).await;

        let err = coordinator.apply_leave(200, 100).await.unwrap_err();
        assert!(matches!(err, LeaveChainError::InvalidInput { .. }));

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.state, TxState::Idle);
        assert_eq!(chain.submit_calls(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_while_in_flight_is_rejected() {
        let (_, coordinator) = coordinator_over(Some(EMPLOYEE), Duration::from_millis(200)).await;

        let handle = coordinator.apply_leave(100, 200).await.unwrap();

        let err = coordinator.apply_leave(300, 400).await.unwrap_err();
        assert!(matches!(err, LeaveChainError::AlreadyInFlight));

        // the in-flight handle is untouched by the rejected dispatch
        let snapshot = coordinator.snapshot().await;
        assert_eq!(
            snapshot.state,
            TxState::AwaitingConfirmation {
                handle: handle.clone()
            }
        );
        assert!(!snapshot.actions_enabled());

        let final_state = settled(&coordinator).await;
        assert_eq!(final_state, TxState::Confirmed { handle });
        assert_eq!(coordinator.stats().await.submissions, 1);
    }

    #[tokio::test]
    async fn test_exactly_one_refresh_per_confirmation() {
        let (_, coordinator) = coordinator_over(Some(EMPLOYEE), Duration::from_millis(5)).await;
        assert_eq!(coordinator.stats().await.refreshes, 1); // initial read

        coordinator.apply_leave(100, 200).await.unwrap();
        settled(&coordinator).await;
        assert_eq!(coordinator.stats().await.refreshes, 2);

        coordinator.apply_leave(300, 400).await.unwrap();
        settled(&coordinator).await;
        assert_eq!(coordinator.stats().await.refreshes, 3);
    }

    #[tokio::test]
    async fn test_no_refresh_after_failed_confirmation() {
        let (chain, coordinator) =
            coordinator_over(Some(EMPLOYEE), Duration::from_millis(5)).await;
        chain.fail_next_receipt();

        let handle = coordinator.apply_leave(100, 200).await.unwrap();
        let final_state = settled(&coordinator).await;
        assert!(matches!(
            final_state,
            TxState::Failed { handle: Some(ref failed), .. } if *failed == handle
        ));

        let snapshot = coordinator.snapshot().await;
        assert!(snapshot.last_error.is_some());
        assert_eq!(snapshot.my_leave_count, 0);
        assert!(snapshot.actions_enabled());

        let stats = coordinator.stats().await;
        assert_eq!(stats.refreshes, 1); // the initial read only
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test]
    async fn test_submission_rejection_is_recoverable() {
        let (chain, coordinator) =
            coordinator_over(Some(EMPLOYEE), Duration::from_millis(5)).await;
        chain.fail_next_submit();

        let err = coordinator.apply_leave(100, 200).await.unwrap_err();
        assert!(matches!(err, LeaveChainError::SubmissionRejected { .. }));

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.last_handle, None);
        assert!(snapshot.last_error.is_some());
        assert!(matches!(
            snapshot.state,
            TxState::Failed { handle: None, .. }
        ));
        // terminal failure re-enables the controls immediately
        assert!(snapshot.actions_enabled());

        // retry is a fresh user-initiated dispatch
        let handle = coordinator.apply_leave(100, 200).await.unwrap();
        let final_state = settled(&coordinator).await;
        assert_eq!(final_state, TxState::Confirmed { handle });
        assert_eq!(coordinator.stats().await.failures, 1);
    }

    #[tokio::test]
    async fn test_count_read_skipped_without_account() {
        let (chain, coordinator) = coordinator_over(None, Duration::from_millis(5)).await;

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.owner, Some(address(OWNER)));
        assert_eq!(snapshot.my_leave_count, 0);
        assert_eq!(chain.count_reads(), 0);
    }

    #[tokio::test]
    async fn test_address_validation_on_owner_actions() {
        let (chain, coordinator) =
            coordinator_over(Some(OWNER), Duration::from_millis(5)).await;

        for result in [
            coordinator.approve_leave("not-an-address", 0).await,
            coordinator.reject_leave("not-an-address", 0).await,
        ] {
            assert!(matches!(
                result,
                Err(LeaveChainError::InvalidInput { .. })
            ));
        }
        assert_eq!(chain.submit_calls(), 0);

        let handle = coordinator.approve_leave(EMPLOYEE, 0).await.unwrap();
        let final_state = settled(&coordinator).await;
        assert_eq!(final_state, TxState::Confirmed { handle });

        let handle = coordinator.reject_leave(EMPLOYEE, 1).await.unwrap();
        let final_state = settled(&coordinator).await;
        assert_eq!(final_state, TxState::Confirmed { handle });
    }

    #[tokio::test]
    async fn test_negative_index_rejected_locally() {
        let (chain, coordinator) =
            coordinator_over(Some(OWNER), Duration::from_millis(5)).await;

        let err = coordinator.reject_leave(EMPLOYEE, -1).await.unwrap_err();
        assert!(matches!(err, LeaveChainError::InvalidInput { .. }));

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.state, TxState::Idle);
        assert_eq!(chain.submit_calls(), 0);
    }

    #[tokio::test]
    async fn test_owner_gating_helper() {
        let (_, coordinator) = coordinator_over(Some(OWNER), Duration::from_millis(5)).await;

        let snapshot = coordinator.snapshot().await;
        assert!(snapshot.is_owner(coordinator.account()));
        assert!(!snapshot.is_owner(Some(address(EMPLOYEE))));
    }
}
