//! Confirmation watcher for in-flight transactions.
//!
//! Observes one handle's receipt stream and delivers exactly one terminal
//! transition back to the coordinator. Single-flight per handle holds
//! structurally: the dispatcher only produces a new handle from an
//! idle or terminal state.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::chain::{ContractClient, ReceiptUpdate, TxHandle};
use crate::coordinator::cache::ReadCache;
use crate::coordinator::state::TxState;
use crate::coordinator::LifecycleCounters;
use crate::error::LeaveChainError;

pub(crate) fn spawn(
    client: Arc<dyn ContractClient>,
    cache: Arc<ReadCache>,
    state: Arc<RwLock<TxState>>,
    last_error: Arc<RwLock<Option<String>>>,
    counters: Arc<LifecycleCounters>,
    handle: TxHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        watch(client, cache, state, last_error, counters, handle).await;
    })
}

async fn watch(
    client: Arc<dyn ContractClient>,
    cache: Arc<ReadCache>,
    state: Arc<RwLock<TxState>>,
    last_error: Arc<RwLock<Option<String>>>,
    counters: Arc<LifecycleCounters>,
    handle: TxHandle,
) {
    let mut updates = match client.receipt_updates(&handle).await {
        Ok(updates) => updates,
        Err(e) => {
            fail(&state, &last_error, &counters, &handle, e.to_string()).await;
            return;
        }
    };

    while let Some(update) = updates.next().await {
        match update {
            ReceiptUpdate::Confirming => {
                debug!("Transaction {} confirming", handle);
            }
            ReceiptUpdate::Confirmed => {
                info!("Transaction {} confirmed", handle);
                counters.confirmations.fetch_add(1, Ordering::Relaxed);

                // One refresh per confirmation, completed before the
                // terminal state is published; a failed refresh never
                // reverts the confirmation
                if let Err(e) = cache.refresh().await {
                    warn!("Post-confirmation refresh failed: {}", e);
                }
                *state.write().await = TxState::Confirmed {
                    handle: handle.clone(),
                };
                return;
            }
            ReceiptUpdate::Failed { reason } => {
                fail(&state, &last_error, &counters, &handle, reason).await;
                return;
            }
        }
    }

    // The wait capability dropped the stream without a terminal update
    fail(
        &state,
        &last_error,
        &counters,
        &handle,
        "receipt stream ended before a terminal update".to_string(),
    )
    .await;
}

async fn fail(
    state: &Arc<RwLock<TxState>>,
    last_error: &Arc<RwLock<Option<String>>>,
    counters: &Arc<LifecycleCounters>,
    handle: &TxHandle,
    reason: String,
) {
    let reason = LeaveChainError::ConfirmationFailed { reason }.to_string();
    error!("Transaction {}: {}", handle, reason);
    *state.write().await = TxState::Failed {
        handle: Some(handle.clone()),
        reason: reason.clone(),
    };
    *last_error.write().await = Some(reason);
    counters.failures.fetch_add(1, Ordering::Relaxed);
}
