//! Connectivity monitor.
//!
//! Wraps the pure [`Connectivity`] state with a broadcast channel so the
//! façade's trigger loop (and any host code) can react to edges. The host
//! feeds reachability either by calling [`ConnectivityMonitor::set_online`]
//! directly or by handing a `watch` channel to [`ConnectivityMonitor::follow`].

use offline_sync_core::{Connectivity, Transition};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 16;

/// A connectivity edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// The network became reachable.
    Online,
    /// The network became unreachable.
    Offline,
}

impl From<Transition> for ConnectivityEvent {
    fn from(transition: Transition) -> Self {
        match transition {
            Transition::WentOnline => ConnectivityEvent::Online,
            Transition::WentOffline => ConnectivityEvent::Offline,
        }
    }
}

struct MonitorInner {
    state: Mutex<Connectivity>,
    events: broadcast::Sender<ConnectivityEvent>,
}

/// Shared, cloneable connectivity signal.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectivityMonitor {
    /// Create a monitor with an initial reachability.
    pub fn new(online: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(MonitorInner {
                state: Mutex::new(Connectivity::from_online(online)),
                events,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, Connectivity> {
        // The state is a Copy enum; a poisoned lock still holds a valid value.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check if the network is currently reachable.
    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Report reachability (platform signal or manual override).
    ///
    /// Returns `true` if this changed the state. Repeated reports of the
    /// same state are ignored and publish nothing.
    pub fn set_online(&self, online: bool) -> bool {
        let transition = {
            let mut state = self.state();
            let (next, transition) = state.observe(online);
            *state = next;
            transition
        };

        match transition {
            Some(transition) => {
                let event = ConnectivityEvent::from(transition);
                tracing::info!("Connectivity changed: {:?}", event);
                // No subscribers is fine
                let _ = self.inner.events.send(event);
                true
            }
            None => false,
        }
    }

    /// Subscribe to connectivity edges.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.inner.events.subscribe()
    }

    /// Mirror a platform reachability channel until its sender is dropped.
    pub fn follow(&self, mut signal: watch::Receiver<bool>) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let initial = *signal.borrow_and_update();
            monitor.set_online(initial);
            while signal.changed().await.is_ok() {
                let online = *signal.borrow_and_update();
                monitor.set_online(online);
            }
            tracing::debug!("Connectivity signal closed");
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
