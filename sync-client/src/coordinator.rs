//! Sync coordinator: immediate delivery, queue draining, retry bookkeeping.
//!
//! The coordinator is the only component that mutates queued items once they
//! are stored. Two paths deliver items:
//! - `enqueue()` stores the item and, when online, tries it once right away
//! - `sync_all()` drains the whole queue, one sequential lane per item type
//!
//! Both paths claim an item id before touching it, so an item is never in
//! two deliveries at once. A failed attempt is never retried inside the same
//! cycle; the retry policy stamps the earliest next attempt or abandons the
//! item once its budget is spent.

use futures_util::future::join_all;
use offline_sync_core::{resolve_item, Decision, DrainPlan, Lane, RetryPolicy, RetryVerdict};
use offline_sync_types::{
    now_millis, DrainOutcome, ItemId, ItemType, QueueSnapshot, SyncItem, SyncResult,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::remote::{DeliveryError, Remote};
use crate::store::{QueueStore, StoreError};

/// What happened to one item on one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Delivered and removed.
    Synced,
    /// Dropped because the server copy is as new or newer.
    Resolved(Decision),
    /// Delivery failed; the item stays queued with this retry count.
    Failed {
        /// Retry count after this failure.
        retry_count: u32,
        /// Why delivery failed.
        error: DeliveryError,
    },
    /// Delivery failed and the retry budget is spent; the item was removed.
    Abandoned {
        /// Retry count that reached the budget.
        retry_count: u32,
        /// The final failure.
        error: DeliveryError,
    },
    /// Another delivery of this item is in flight; left untouched.
    InFlight,
    /// The backoff window is still open; left untouched.
    NotDue,
    /// The item is no longer queued.
    Gone,
}

/// Result of `enqueue()`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueReceipt {
    /// Id assigned to the queued item.
    pub id: ItemId,
    /// Outcome of the immediate attempt, if one was made.
    pub immediate: Option<ItemOutcome>,
}

impl EnqueueReceipt {
    /// Whether the immediate attempt delivered the item.
    pub fn synced_immediately(&self) -> bool {
        matches!(self.immediate, Some(ItemOutcome::Synced))
    }
}

enum Attempt {
    Delivered,
    Resolved(Decision),
}

/// Removes an id from the in-flight set when dropped.
struct InFlightClaim {
    in_flight: Arc<Mutex<HashSet<ItemId>>>,
    id: ItemId,
}

impl InFlightClaim {
    fn acquire(in_flight: &Arc<Mutex<HashSet<ItemId>>>, id: ItemId) -> Option<Self> {
        let mut set = in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !set.insert(id) {
            return None;
        }
        Some(Self {
            in_flight: Arc::clone(in_flight),
            id,
        })
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.id);
    }
}

/// Drains the queue into the remote.
pub struct Coordinator<S, R> {
    store: S,
    remote: R,
    monitor: ConnectivityMonitor,
    retry: RetryPolicy,
    delivery_timeout: Duration,
    drain_lock: tokio::sync::Mutex<()>,
    in_flight: Arc<Mutex<HashSet<ItemId>>>,
    active_drain: Mutex<Option<CancellationToken>>,
}

impl<S: QueueStore, R: Remote> Coordinator<S, R> {
    /// Create a coordinator.
    pub fn new(store: S, remote: R, monitor: ConnectivityMonitor, config: &SyncConfig) -> Self {
        Self {
            store,
            remote,
            monitor,
            retry: config.retry,
            delivery_timeout: config.delivery_timeout,
            drain_lock: tokio::sync::Mutex::new(()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            active_drain: Mutex::new(None),
        }
    }

    /// The queue store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The remote.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// The connectivity monitor.
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Queue a mutation, then try it once if online.
    ///
    /// Fails only if the item could not be stored. A failed immediate
    /// attempt leaves the item queued and counts against its retry budget.
    pub async fn enqueue(
        &self,
        item_type: ItemType,
        payload: Value,
        endpoint: &str,
    ) -> Result<EnqueueReceipt, StoreError> {
        let item = SyncItem::new(item_type, payload, endpoint);
        let id = item.id;
        self.store.put(&item).await?;
        tracing::debug!("Queued {} item {} for {}", item_type, id, endpoint);

        if !self.monitor.is_online() {
            return Ok(EnqueueReceipt {
                id,
                immediate: None,
            });
        }

        let immediate = match self.process_item(id).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!("Immediate delivery of {} left queued: {}", id, e);
                None
            }
        };
        Ok(EnqueueReceipt { id, immediate })
    }

    /// Run one drain cycle.
    ///
    /// Never fails: store errors are reported in `SyncResult::errors`.
    /// Returns at once with `Offline` or `AlreadyRunning` when no drain
    /// should start.
    pub async fn sync_all(&self) -> SyncResult {
        if !self.monitor.is_online() {
            tracing::debug!("Skipping drain: offline");
            return SyncResult::skipped(DrainOutcome::Offline);
        }

        let Ok(_guard) = self.drain_lock.try_lock() else {
            tracing::debug!("Skipping drain: already running");
            return SyncResult::skipped(DrainOutcome::AlreadyRunning);
        };

        let token = CancellationToken::new();
        *self.lock_active_drain() = Some(token.clone());

        let result = self.drain(&token).await;

        *self.lock_active_drain() = None;
        tracing::info!(
            "Drain {:?}: synced={} failed={} abandoned={} resolved={} deferred={}",
            result.outcome,
            result.synced,
            result.failed,
            result.abandoned,
            result.resolved,
            result.deferred
        );
        result
    }

    async fn drain(&self, token: &CancellationToken) -> SyncResult {
        let items = match self.store.get_all(None).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("Failed to load queue: {}", e);
                let mut result = SyncResult::default();
                result.errors.push(format!("failed to load queue: {}", e));
                return result;
            }
        };

        let plan = DrainPlan::build(items, now_millis());
        let mut result = SyncResult {
            deferred: plan.deferred.len(),
            ..SyncResult::default()
        };

        let lanes = plan.lanes.into_iter().map(|lane| self.drain_lane(lane, token));
        for lane_result in join_all(lanes).await {
            result.merge(lane_result);
        }
        result
    }

    async fn drain_lane(&self, lane: Lane, token: &CancellationToken) -> SyncResult {
        let mut result = SyncResult::default();

        for item in lane.items {
            if token.is_cancelled() || !self.monitor.is_online() {
                tracing::debug!("Drain of {} lane cancelled", lane.item_type);
                result.outcome = DrainOutcome::Cancelled;
                break;
            }

            match self.process_item(item.id).await {
                Ok(ItemOutcome::Synced) => result.synced += 1,
                Ok(ItemOutcome::Resolved(_)) => result.resolved += 1,
                Ok(ItemOutcome::Failed { error, .. }) => {
                    result.failed += 1;
                    result
                        .errors
                        .push(format!("{} {}: {}", item.item_type, item.id, error));
                }
                Ok(ItemOutcome::Abandoned { retry_count, error }) => {
                    result.abandoned += 1;
                    result.errors.push(format!(
                        "{} {} abandoned after {} attempts: {}",
                        item.item_type, item.id, retry_count, error
                    ));
                }
                Ok(ItemOutcome::InFlight) | Ok(ItemOutcome::NotDue) => result.deferred += 1,
                Ok(ItemOutcome::Gone) => {}
                Err(e) => {
                    tracing::error!("Store error while syncing {}: {}", item.id, e);
                    result.failed += 1;
                    result
                        .errors
                        .push(format!("{} {}: store error: {}", item.item_type, item.id, e));
                }
            }
        }
        result
    }

    /// Attempt one queued item and apply the outcome to the store.
    pub async fn process_item(&self, id: ItemId) -> Result<ItemOutcome, StoreError> {
        let Some(_claim) = InFlightClaim::acquire(&self.in_flight, id) else {
            return Ok(ItemOutcome::InFlight);
        };

        // Re-read under the claim: the snapshot may predate another path's outcome.
        let Some(item) = self.store.get(&id).await? else {
            return Ok(ItemOutcome::Gone);
        };
        if !item.is_due(now_millis()) {
            return Ok(ItemOutcome::NotDue);
        }

        match self.attempt(&item).await {
            Ok(Attempt::Delivered) => {
                self.store.remove(&id).await?;
                tracing::debug!("Delivered {} item {}", item.item_type, id);
                Ok(ItemOutcome::Synced)
            }
            Ok(Attempt::Resolved(decision)) => {
                self.store.remove(&id).await?;
                tracing::debug!("Dropped {} item {}: {:?}", item.item_type, id, decision);
                Ok(ItemOutcome::Resolved(decision))
            }
            Err(error) => self.record_failure(item, error).await,
        }
    }

    async fn attempt(&self, item: &SyncItem) -> Result<Attempt, DeliveryError> {
        let delivery = async {
            if item.last_modified().is_some() {
                if let Some(record) = self
                    .remote
                    .fetch_record(&item.endpoint, &item.payload)
                    .await?
                {
                    let decision = resolve_item(item, &record);
                    if !decision.should_push() {
                        return Ok(Attempt::Resolved(decision));
                    }
                }
            }
            self.remote
                .send(&item.endpoint, &item.payload)
                .await?
                .into_result()?;
            Ok::<_, DeliveryError>(Attempt::Delivered)
        };

        tokio::time::timeout(self.delivery_timeout, delivery)
            .await
            .map_err(|_| DeliveryError::Timeout(self.delivery_timeout))?
    }

    async fn record_failure(
        &self,
        mut item: SyncItem,
        error: DeliveryError,
    ) -> Result<ItemOutcome, StoreError> {
        let now = now_millis();
        match self.retry.on_failure(item.retry_count, now) {
            RetryVerdict::Retry {
                retry_count,
                next_attempt_at,
            } => {
                item.retry_count = retry_count;
                item.last_attempt_at = Some(now);
                item.next_attempt_at = Some(next_attempt_at);
                self.store.put(&item).await?;
                tracing::debug!(
                    "Delivery of {} failed (retry {}): {}",
                    item.id,
                    retry_count,
                    error
                );
                Ok(ItemOutcome::Failed { retry_count, error })
            }
            RetryVerdict::Abandon { retry_count } => {
                self.store.remove(&item.id).await?;
                tracing::warn!(
                    "Abandoned {} item {} after {} attempts: {}",
                    item.item_type,
                    item.id,
                    retry_count,
                    error
                );
                Ok(ItemOutcome::Abandoned { retry_count, error })
            }
        }
    }

    fn lock_active_drain(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.active_drain
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stop the running drain after its in-flight items.
    ///
    /// Returns `false` if no drain was running.
    pub fn cancel(&self) -> bool {
        match self.lock_active_drain().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a drain is in progress.
    pub fn is_syncing(&self) -> bool {
        self.lock_active_drain().is_some()
    }

    /// The pending queue.
    pub async fn snapshot(&self) -> Result<QueueSnapshot, StoreError> {
        self.store.stats().await
    }

    /// Drop every queued item.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.clear().await?;
        tracing::info!("Cleared sync queue");
        Ok(())
    }
}
