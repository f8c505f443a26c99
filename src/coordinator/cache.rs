//! Read-through cache of contract-derived facts.
//!
//! Refreshed on coordinator initialization and once per confirmed
//! transaction, never on a timer and never after a failed one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::chain::{Address, ContractClient, WalletSession};
use crate::error::Result;

/// Last-fetched contract facts. Only `refresh` mutates these.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContractFacts {
    pub owner: Option<Address>,
    pub my_leave_count: u64,
}

/// Read cache over the contract's read capability
pub struct ReadCache {
    client: Arc<dyn ContractClient>,
    wallet: Arc<dyn WalletSession>,
    facts: RwLock<ContractFacts>,
    refreshing: AtomicBool,
    completed: AtomicU64,
}

impl ReadCache {
    pub fn new(client: Arc<dyn ContractClient>, wallet: Arc<dyn WalletSession>) -> Self {
        Self {
            client,
            wallet,
            facts: RwLock::new(ContractFacts::default()),
            refreshing: AtomicBool::new(false),
            completed: AtomicU64::new(0),
        }
    }

    /// Last-known facts; never blocks on an in-flight refresh
    pub async fn facts(&self) -> ContractFacts {
        self.facts.read().await.clone()
    }

    /// Number of refresh cycles that have completed
    pub fn refreshes_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Re-read `owner` and the caller's leave count. Idempotent; a call
    /// that finds another refresh in flight coalesces into a no-op.
    pub async fn refresh(&self) -> Result<()> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Refresh already in flight, coalescing");
            return Ok(());
        }

        let result = self.refresh_inner().await;
        self.refreshing.store(false, Ordering::Release);
        if result.is_ok() {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn refresh_inner(&self) -> Result<()> {
        let owner = self.client.read_owner().await?;

        // Without an account the count read is skipped, not errored
        let my_leave_count = match self.wallet.account() {
            Some(account) => self.client.read_leave_count(&account).await?,
            None => 0,
        };

        let mut facts = self.facts.write().await;
        facts.owner = owner;
        facts.my_leave_count = my_leave_count;
        debug!(
            "Contract facts refreshed: owner={:?} my_leave_count={}",
            facts.owner, facts.my_leave_count
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulatedChain;
    use std::time::Duration;

    fn owner() -> Address {
        "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap()
    }

    fn account() -> Address {
        "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap()
    }

    #[tokio::test]
    async fn test_refresh_reads_owner_and_count() {
        let chain = Arc::new(SimulatedChain::new(
            owner(),
            Some(account()),
            Duration::from_millis(1),
        ));
        let cache = ReadCache::new(chain.clone(), chain.clone());

        assert!(cache.facts().await.owner.is_none());

        cache.refresh().await.unwrap();
        let facts = cache.facts().await;
        assert_eq!(facts.owner, Some(owner()));
        assert_eq!(facts.my_leave_count, 0);
        assert_eq!(cache.refreshes_completed(), 1);
        assert_eq!(chain.count_reads(), 1);
    }

    #[tokio::test]
    async fn test_count_read_skipped_without_account() {
        let chain = Arc::new(SimulatedChain::new(owner(), None, Duration::from_millis(1)));
        let cache = ReadCache::new(chain.clone(), chain.clone());

        cache.refresh().await.unwrap();
        let facts = cache.facts().await;
        assert_eq!(facts.owner, Some(owner()));
        assert_eq!(facts.my_leave_count, 0);
        assert_eq!(chain.count_reads(), 0);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let chain = Arc::new(SimulatedChain::new(
            owner(),
            Some(account()),
            Duration::from_millis(1),
        ));
        let cache = ReadCache::new(chain.clone(), chain.clone());

        cache.refresh().await.unwrap();
        cache.refresh().await.unwrap();
        assert_eq!(cache.refreshes_completed(), 2);
        assert_eq!(cache.facts().await.owner, Some(owner()));
    }
}
