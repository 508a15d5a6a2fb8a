//! The `OfflineSync` façade.
//!
//! One instance per process owns the coordinator, the event bus and the
//! wake-up channel. Every drain trigger funnels into [`OfflineSync::sync_all`]:
//! explicit calls, connectivity coming back, a background wake-up, and the
//! optional foreground poll timer (the last three via [`OfflineSync::start`]).
//!
//! # Example
//!
//! ```ignore
//! let store = AnyStore::open(&StoreConfig::in_dir(data_dir)).await;
//! let remote = HttpRemote::new("https://api.example.com");
//! let sync = Arc::new(OfflineSync::new(store, remote, ConnectivityMonitor::new(true), SyncConfig::default()));
//! let trigger_loop = sync.start();
//!
//! sync.on(EventKind::SyncComplete, |event| println!("{:?}", event));
//! sync.enqueue(ItemType::Progress, json!({"lesson": 3}), "/progress").await?;
//! ```

use offline_sync_types::{now_millis, DrainOutcome, ItemType, QueueSnapshot, SyncResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::pending;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::coordinator::{Coordinator, EnqueueReceipt};
use crate::events::{EventBus, EventKind, ListenerId, SyncEvent};
use crate::remote::Remote;
use crate::store::{Backend, QueueStore, StoreError};
use crate::wakeup::{WakeupFacility, WakeupTrigger};

/// Pending wake-ups beyond this are coalesced.
const WAKE_CAPACITY: usize = 1;

/// Engine status for hosts and UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Whether a background wake-up facility is available.
    pub is_supported: bool,
    /// Current connectivity.
    pub is_online: bool,
    /// Whether a drain is running.
    pub is_syncing: bool,
    /// Backend serving the queue.
    pub backend: Backend,
    /// Total queued items.
    pub pending_items: usize,
    /// Queued items per type.
    pub pending_by_type: BTreeMap<ItemType, usize>,
}

/// Offline-first sync engine.
pub struct OfflineSync<S, R> {
    coordinator: Arc<Coordinator<S, R>>,
    events: EventBus,
    config: SyncConfig,
    wakeup: Option<Arc<dyn WakeupFacility>>,
    wake_tx: mpsc::Sender<String>,
    wake_rx: Mutex<Option<mpsc::Receiver<String>>>,
}

impl<S, R> OfflineSync<S, R>
where
    S: QueueStore + 'static,
    R: Remote + 'static,
{
    /// Create the engine. Nothing runs until [`start`](Self::start).
    pub fn new(store: S, remote: R, monitor: ConnectivityMonitor, config: SyncConfig) -> Self {
        let (wake_tx, wake_rx) = mpsc::channel(WAKE_CAPACITY);
        Self {
            coordinator: Arc::new(Coordinator::new(store, remote, monitor, &config)),
            events: EventBus::new(),
            config,
            wakeup: None,
            wake_tx,
            wake_rx: Mutex::new(Some(wake_rx)),
        }
    }

    /// Attach a background wake-up facility.
    pub fn with_wakeup(mut self, facility: Arc<dyn WakeupFacility>) -> Self {
        self.wakeup = Some(facility);
        self
    }

    /// The coordinator.
    pub fn coordinator(&self) -> &Coordinator<S, R> {
        &self.coordinator
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Queue a mutation; delivered right away when online.
    pub async fn enqueue(
        &self,
        item_type: ItemType,
        payload: Value,
        endpoint: &str,
    ) -> Result<EnqueueReceipt, StoreError> {
        self.coordinator.enqueue(item_type, payload, endpoint).await
    }

    /// Run one drain cycle and publish its outcome.
    pub async fn sync_all(&self) -> SyncResult {
        drain_and_publish(&self.coordinator, &self.events).await
    }

    /// Current engine status.
    pub async fn status(&self) -> Result<SyncStatus, StoreError> {
        let snapshot = self.coordinator.snapshot().await?;
        Ok(SyncStatus {
            is_supported: self.wakeup.is_some(),
            is_online: self.coordinator.monitor().is_online(),
            is_syncing: self.coordinator.is_syncing(),
            backend: self.coordinator.store().backend(),
            pending_items: snapshot.len(),
            pending_by_type: snapshot.by_type,
        })
    }

    /// The pending queue.
    pub async fn snapshot(&self) -> Result<QueueSnapshot, StoreError> {
        self.coordinator.snapshot().await
    }

    /// Drop every queued item.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.coordinator.clear().await
    }

    /// Register a callback for one kind of event.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, callback)
    }

    /// Remove a callback.
    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Receive every event.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Manual connectivity override.
    pub fn set_online(&self, online: bool) -> bool {
        self.coordinator.monitor().set_online(online)
    }

    /// Ask the platform to wake the engine under `tag`.
    ///
    /// Returns `false` when no facility is attached or it refuses; the
    /// engine then relies on foreground triggers.
    pub fn register_wakeup(&self, tag: &str) -> bool {
        let Some(facility) = &self.wakeup else {
            tracing::debug!("No wake-up facility; relying on foreground triggers");
            return false;
        };
        match facility.register(tag, WakeupTrigger::new(tag, self.wake_tx.clone())) {
            Ok(()) => {
                tracing::info!("Registered background wake-up {:?}", tag);
                true
            }
            Err(e) => {
                tracing::warn!("Wake-up registration failed: {}", e);
                false
            }
        }
    }

    /// Spawn the trigger loop.
    ///
    /// Returns `None` if it is already running.
    pub fn start(&self) -> Option<TriggerLoop> {
        let wake_rx = self
            .wake_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(wake_rx) = wake_rx else {
            tracing::warn!("Trigger loop already started");
            return None;
        };

        // Subscribe before spawning so no edge after start() is missed.
        let connectivity = self.coordinator.monitor().subscribe();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(trigger_loop(
            Arc::clone(&self.coordinator),
            self.events.clone(),
            connectivity,
            wake_rx,
            self.config.poll_interval,
            shutdown.clone(),
        ));
        tracing::info!("Sync trigger loop started");
        Some(TriggerLoop { task, shutdown })
    }
}

/// Handle to the running trigger loop.
pub struct TriggerLoop {
    task: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl TriggerLoop {
    /// Stop the loop and wait for it. Drains already spawned keep running.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("Trigger loop ended abnormally: {}", e);
        }
    }
}

async fn drain_and_publish<S: QueueStore, R: Remote>(
    coordinator: &Coordinator<S, R>,
    events: &EventBus,
) -> SyncResult {
    let result = coordinator.sync_all().await;
    match result.outcome {
        DrainOutcome::Offline | DrainOutcome::AlreadyRunning => {}
        DrainOutcome::Completed | DrainOutcome::Cancelled => {
            if result.success() {
                events.emit(SyncEvent::SyncComplete(result.clone()));
            } else {
                events.emit(SyncEvent::SyncFailed(result.clone()));
            }
        }
    }
    result
}

fn spawn_drain<S, R>(coordinator: &Arc<Coordinator<S, R>>, events: &EventBus, reason: &str)
where
    S: QueueStore + 'static,
    R: Remote + 'static,
{
    tracing::debug!("Drain triggered by {}", reason);
    let coordinator = Arc::clone(coordinator);
    let events = events.clone();
    tokio::spawn(async move {
        drain_and_publish(&coordinator, &events).await;
    });
}

async fn trigger_loop<S, R>(
    coordinator: Arc<Coordinator<S, R>>,
    events: EventBus,
    mut connectivity: broadcast::Receiver<ConnectivityEvent>,
    mut wake_rx: mpsc::Receiver<String>,
    poll_interval: Option<std::time::Duration>,
    shutdown: CancellationToken,
) where
    S: QueueStore + 'static,
    R: Remote + 'static,
{
    let mut poll = poll_interval.map(|period| {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            event = connectivity.recv() => match event {
                Ok(ConnectivityEvent::Online) => {
                    events.emit(SyncEvent::Online);
                    spawn_drain(&coordinator, &events, "connectivity");
                }
                Ok(ConnectivityEvent::Offline) => {
                    events.emit(SyncEvent::Offline);
                    coordinator.cancel();
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} connectivity events", skipped);
                    if coordinator.monitor().is_online() {
                        spawn_drain(&coordinator, &events, "connectivity");
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            Some(tag) = wake_rx.recv() => {
                spawn_drain(&coordinator, &events, &format!("wake-up {:?}", tag));
            }

            _ = async {
                match poll.as_mut() {
                    Some(interval) => interval.tick().await,
                    None => pending().await,
                }
            } => {
                match coordinator.snapshot().await {
                    Ok(snapshot) => {
                        let now = now_millis();
                        if snapshot.items.iter().any(|item| item.is_due(now)) {
                            spawn_drain(&coordinator, &events, "poll timer");
                        }
                    }
                    Err(e) => tracing::warn!("Poll could not read queue: {}", e),
                }
            }
        }
    }
    tracing::info!("Sync trigger loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemote;
    use crate::store::SqliteStore;
    use crate::wakeup::LocalWakeup;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn engine(online: bool, config: SyncConfig) -> (OfflineSync<SqliteStore, MockRemote>, MockRemote) {
        let store = SqliteStore::in_memory(100).await.unwrap();
        let remote = MockRemote::new();
        let sync = OfflineSync::new(store, remote.clone(), ConnectivityMonitor::new(online), config);
        (sync, remote)
    }

    async fn next_event(rx: &mut broadcast::Receiver<SyncEvent>) -> SyncEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event within timeout")
            .unwrap()
    }

    #[tokio::test]
    async fn sync_all_publishes_completion() {
        let (sync, _) = engine(false, SyncConfig::default()).await;
        sync.enqueue(ItemType::Progress, json!({}), "/progress").await.unwrap();
        sync.set_online(true);
        let completed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completed);
        sync.on(EventKind::SyncComplete, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result = sync.sync_all().await;

        assert_eq!(result.synced, 1);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_items_publish_sync_failed() {
        let (sync, remote) = engine(false, SyncConfig::default()).await;
        sync.enqueue(ItemType::Settings, json!({}), "/settings").await.unwrap();
        remote.fail_endpoint("/settings");
        sync.set_online(true);
        let mut rx = sync.subscribe();

        sync.sync_all().await;

        match next_event(&mut rx).await {
            SyncEvent::SyncFailed(result) => assert_eq!(result.failed, 1),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn offline_drain_publishes_nothing() {
        let (sync, _) = engine(false, SyncConfig::default()).await;
        let mut rx = sync.subscribe();

        let result = sync.sync_all().await;

        assert_eq!(result.outcome, DrainOutcome::Offline);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn status_reports_queue_and_support() {
        let (sync, _) = engine(false, SyncConfig::default()).await;
        sync.enqueue(ItemType::Progress, json!({}), "/progress").await.unwrap();
        sync.enqueue(ItemType::Progress, json!({}), "/progress").await.unwrap();
        sync.enqueue(ItemType::Achievement, json!({}), "/achievements").await.unwrap();

        let status = sync.status().await.unwrap();

        assert!(!status.is_supported);
        assert!(!status.is_online);
        assert!(!status.is_syncing);
        assert_eq!(status.backend, Backend::Structured);
        assert_eq!(status.pending_items, 3);
        assert_eq!(status.pending_by_type.get(&ItemType::Progress), Some(&2));
    }

    #[tokio::test]
    async fn register_wakeup_without_facility_is_false() {
        let (sync, _) = engine(true, SyncConfig::default()).await;
        assert!(!sync.register_wakeup("outbox"));
    }

    #[tokio::test]
    async fn reconnect_triggers_drain() {
        let (sync, remote) = engine(false, SyncConfig::default()).await;
        sync.enqueue(ItemType::Progress, json!({}), "/progress").await.unwrap();
        let mut rx = sync.subscribe();
        let trigger_loop = sync.start().unwrap();

        sync.set_online(true);

        assert_eq!(next_event(&mut rx).await, SyncEvent::Online);
        match next_event(&mut rx).await {
            SyncEvent::SyncComplete(result) => assert_eq!(result.synced, 1),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(remote.delivered().len(), 1);
        trigger_loop.shutdown().await;
    }

    #[tokio::test]
    async fn going_offline_is_published() {
        let (sync, _) = engine(true, SyncConfig::default()).await;
        let mut rx = sync.subscribe();
        let trigger_loop = sync.start().unwrap();

        sync.set_online(false);

        assert_eq!(next_event(&mut rx).await, SyncEvent::Offline);
        trigger_loop.shutdown().await;
    }

    #[tokio::test]
    async fn wakeup_triggers_drain() {
        let store = SqliteStore::in_memory(100).await.unwrap();
        let remote = MockRemote::new();
        let facility = LocalWakeup::new();
        let sync = OfflineSync::new(
            store,
            remote.clone(),
            ConnectivityMonitor::new(true),
            SyncConfig::default(),
        )
        .with_wakeup(Arc::new(facility.clone()));
        // Queue directly so the enqueue-time delivery does not run.
        let item = offline_sync_types::SyncItem::new(ItemType::Analytics, json!({}), "/analytics");
        sync.coordinator().store().put(&item).await.unwrap();
        let mut rx = sync.subscribe();
        let trigger_loop = sync.start().unwrap();

        assert!(sync.register_wakeup("outbox"));
        assert!(sync.status().await.unwrap().is_supported);
        assert!(facility.fire("outbox"));

        match next_event(&mut rx).await {
            SyncEvent::SyncComplete(result) => assert_eq!(result.synced, 1),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(remote.attempt_count(), 1);
        trigger_loop.shutdown().await;
    }

    #[tokio::test]
    async fn poll_timer_drains_pending_items() {
        let config = SyncConfig::new().with_poll_interval(Duration::from_millis(20));
        let (sync, remote) = engine(true, config).await;
        let item = offline_sync_types::SyncItem::new(ItemType::Settings, json!({}), "/settings");
        sync.coordinator().store().put(&item).await.unwrap();
        let mut rx = sync.subscribe();
        let trigger_loop = sync.start().unwrap();

        match next_event(&mut rx).await {
            SyncEvent::SyncComplete(result) => assert_eq!(result.synced, 1),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(remote.attempt_count(), 1);
        trigger_loop.shutdown().await;
    }

    #[tokio::test]
    async fn poll_timer_skips_items_in_backoff() {
        let config = SyncConfig::new().with_poll_interval(Duration::from_millis(20));
        let (sync, remote) = engine(true, config).await;
        let mut item = offline_sync_types::SyncItem::new(ItemType::Settings, json!({}), "/settings");
        item.retry_count = 1;
        item.next_attempt_at = Some(now_millis() + 60_000);
        sync.coordinator().store().put(&item).await.unwrap();
        let mut rx = sync.subscribe();
        let trigger_loop = sync.start().unwrap();

        let quiet = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;

        assert!(quiet.is_err(), "no drain should run while every item is in backoff");
        assert_eq!(remote.attempt_count(), 0);
        trigger_loop.shutdown().await;
    }

    #[tokio::test]
    async fn start_twice_is_refused() {
        let (sync, _) = engine(true, SyncConfig::default()).await;
        let trigger_loop = sync.start().unwrap();

        assert!(sync.start().is_none());
        trigger_loop.shutdown().await;
    }
}
