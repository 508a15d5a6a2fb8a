//! Typed event bus for the façade.
//!
//! Two ways to listen:
//! - `on(kind, callback)` registers a synchronous callback and returns a
//!   [`ListenerId`] that `off()` removes
//! - `subscribe()` returns a broadcast receiver of every event

use offline_sync_types::{SyncResult, TypesError};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Events published by the sync engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connectivity came back.
    Online,
    /// Connectivity was lost.
    Offline,
    /// A drain finished with no failed item.
    SyncComplete(SyncResult),
    /// A drain finished with at least one failed item.
    SyncFailed(SyncResult),
}

impl SyncEvent {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            SyncEvent::Online => EventKind::Online,
            SyncEvent::Offline => EventKind::Offline,
            SyncEvent::SyncComplete(_) => EventKind::SyncComplete,
            SyncEvent::SyncFailed(_) => EventKind::SyncFailed,
        }
    }
}

/// Event names callbacks register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `online`
    Online,
    /// `offline`
    Offline,
    /// `sync-complete`
    SyncComplete,
    /// `sync-failed`
    SyncFailed,
}

impl EventKind {
    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Online => "online",
            EventKind::Offline => "offline",
            EventKind::SyncComplete => "sync-complete",
            EventKind::SyncFailed => "sync-failed",
        }
    }
}

impl FromStr for EventKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(EventKind::Online),
            "offline" => Ok(EventKind::Offline),
            "sync-complete" => Ok(EventKind::SyncComplete),
            "sync-failed" => Ok(EventKind::SyncFailed),
            other => Err(TypesError::UnknownEvent(other.to_string())),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by [`EventBus::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    kind: EventKind,
    callback: Callback,
}

/// Callback registry plus broadcast channel.
///
/// Clones share listeners and subscribers.
#[derive(Clone)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<Listener>>>,
    next_id: Arc<AtomicU64>,
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            sender,
        }
    }

    /// Register `callback` for events of `kind`.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push(Listener {
            id,
            kind,
            callback: Arc::new(callback),
        });
        tracing::debug!("Added {} listener {:?}", kind, id);
        id
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Publish an event to callbacks and subscribers.
    pub fn emit(&self, event: SyncEvent) {
        tracing::debug!("Emitting event: {}", event.kind());

        // Callbacks run outside the lock so they may call on()/off().
        let callbacks: Vec<Callback> = {
            let listeners = self
                .listeners
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            listeners
                .iter()
                .filter(|l| l.kind == event.kind())
                .map(|l| Arc::clone(&l.callback))
                .collect()
        };
        for callback in callbacks {
            callback(&event);
        }

        if self.sender.send(event).is_err() {
            tracing::trace!("No active event subscribers");
        }
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Number of registered callbacks.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn callbacks_only_see_their_kind() {
        let bus = EventBus::new();
        let online = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&online);
        bus.on(EventKind::Online, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(SyncEvent::Online);
        bus.emit(SyncEvent::Offline);
        bus.emit(SyncEvent::Online);

        assert_eq!(online.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn off_unsubscribes() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = bus.on(EventKind::SyncComplete, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.off(id));
        assert!(!bus.off(id));
        bus.emit(SyncEvent::SyncComplete(SyncResult::default()));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn callback_may_remove_itself() {
        let bus = EventBus::new();
        let handle = bus.clone();
        let slot: Arc<RwLock<Option<ListenerId>>> = Arc::new(RwLock::new(None));
        let own_id = Arc::clone(&slot);
        let id = bus.on(EventKind::Offline, move |_| {
            if let Some(id) = *own_id.read().unwrap() {
                handle.off(id);
            }
        });
        *slot.write().unwrap() = Some(id);

        bus.emit(SyncEvent::Offline);

        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_results() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let result = SyncResult {
            synced: 1,
            failed: 1,
            ..SyncResult::default()
        };

        bus.emit(SyncEvent::SyncFailed(result.clone()));

        assert_eq!(rx.recv().await.unwrap(), SyncEvent::SyncFailed(result));
    }

    #[test]
    fn event_kind_names() {
        for kind in [
            EventKind::Online,
            EventKind::Offline,
            EventKind::SyncComplete,
            EventKind::SyncFailed,
        ] {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("synced".parse::<EventKind>().is_err());
    }
}
