//! Background wake-up registration.
//!
//! A host platform that can wake the app when connectivity returns implements
//! [`WakeupFacility`]. Registration hands it a [`WakeupTrigger`]; firing the
//! trigger asks the façade's trigger loop for a drain. Wake-ups are
//! best-effort: a missing facility only means the engine relies on
//! foreground triggers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

/// Upper bound on tags a [`LocalWakeup`] accepts.
pub const MAX_REGISTRATIONS: usize = 32;

/// Wake-up registration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WakeupError {
    /// Tags must be non-empty.
    #[error("wake-up tag must not be empty")]
    InvalidTag,

    /// The facility refuses further registrations.
    #[error("too many wake-up registrations (limit: {0})")]
    TooManyRegistrations(usize),

    /// The host facility refused the registration.
    #[error("wake-up registration rejected: {0}")]
    Rejected(String),
}

/// Handle the host fires to request a drain.
#[derive(Debug, Clone)]
pub struct WakeupTrigger {
    tag: String,
    sender: mpsc::Sender<String>,
}

impl WakeupTrigger {
    pub(crate) fn new(tag: &str, sender: mpsc::Sender<String>) -> Self {
        Self {
            tag: tag.to_string(),
            sender,
        }
    }

    /// Tag this trigger was registered under.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Request a drain.
    ///
    /// Returns `false` if the engine is no longer listening. A request made
    /// while another is still pending is coalesced into it.
    pub fn fire(&self) -> bool {
        match self.sender.try_send(self.tag.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Host mechanism that wakes the engine outside the foreground lifecycle.
pub trait WakeupFacility: Send + Sync {
    /// Remember `trigger` and fire it when the platform wakes the app.
    fn register(&self, tag: &str, trigger: WakeupTrigger) -> Result<(), WakeupError>;
}

/// In-process wake-up facility keyed by tag.
///
/// Used by hosts that drive wake-ups themselves (timers, OS hooks bridged
/// in from elsewhere) and by tests.
#[derive(Clone, Default)]
pub struct LocalWakeup {
    triggers: Arc<Mutex<BTreeMap<String, WakeupTrigger>>>,
}

impl LocalWakeup {
    /// Create an empty facility.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the trigger registered under `tag`.
    ///
    /// Returns `false` if no such tag is registered or the engine is gone.
    pub fn fire(&self, tag: &str) -> bool {
        let trigger = {
            let triggers = self
                .triggers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            triggers.get(tag).cloned()
        };
        match trigger {
            Some(trigger) => trigger.fire(),
            None => {
                tracing::debug!("No wake-up registered for tag {:?}", tag);
                false
            }
        }
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        self.triggers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Forget a tag. Returns `false` if it was not registered.
    pub fn unregister(&self, tag: &str) -> bool {
        self.triggers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(tag)
            .is_some()
    }
}

impl WakeupFacility for LocalWakeup {
    fn register(&self, tag: &str, trigger: WakeupTrigger) -> Result<(), WakeupError> {
        if tag.trim().is_empty() {
            return Err(WakeupError::InvalidTag);
        }

        let mut triggers = self
            .triggers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Re-registering a tag replaces its trigger
        if !triggers.contains_key(tag) && triggers.len() >= MAX_REGISTRATIONS {
            return Err(WakeupError::TooManyRegistrations(MAX_REGISTRATIONS));
        }
        triggers.insert(tag.to_string(), trigger);
        Ok(())
    }
}
