//! Read-only queue views and drain outcomes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ItemType, SyncItem};

/// The pending queue at one instant, with derived statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Pending items, ordered by `created_at` ascending.
    pub items: Vec<SyncItem>,
    /// Pending count per item type.
    pub by_type: BTreeMap<ItemType, usize>,
    /// Creation time of the oldest pending item.
    pub oldest: Option<u64>,
    /// Creation time of the newest pending item.
    pub newest: Option<u64>,
}

impl QueueSnapshot {
    /// Build a snapshot from an already ordered item list.
    pub fn from_items(items: Vec<SyncItem>) -> Self {
        let mut by_type = BTreeMap::new();
        for item in &items {
            *by_type.entry(item.item_type).or_insert(0) += 1;
        }
        let oldest = items.iter().map(|i| i.created_at).min();
        let newest = items.iter().map(|i| i.created_at).max();
        Self {
            items,
            by_type,
            oldest,
            newest,
        }
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pending count for one item type.
    pub fn count(&self, item_type: ItemType) -> usize {
        self.by_type.get(&item_type).copied().unwrap_or(0)
    }
}

/// How a drain cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainOutcome {
    /// Every planned item was visited.
    #[default]
    Completed,
    /// Not attempted: connectivity reported offline.
    Offline,
    /// Not attempted: another drain was already in flight.
    AlreadyRunning,
    /// Stopped early; unvisited items were left untouched.
    Cancelled,
}

/// Aggregate outcome of one drain cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// How the cycle ended.
    pub outcome: DrainOutcome,
    /// Items delivered and removed.
    pub synced: usize,
    /// Items that failed and were re-queued with an incremented retry count.
    pub failed: usize,
    /// Items dropped after exhausting their retry budget.
    pub abandoned: usize,
    /// Items dropped because the server already held an equal or newer copy.
    pub resolved: usize,
    /// Items skipped this cycle (backoff window open, or delivery in flight elsewhere).
    pub deferred: usize,
    /// Diagnostics for failures and abandonments.
    pub errors: Vec<String>,
}

impl SyncResult {
    /// A cycle that did nothing for the given reason.
    pub fn skipped(outcome: DrainOutcome) -> Self {
        Self {
            outcome,
            ..Self::default()
        }
    }

    /// True iff no item failed during this cycle.
    ///
    /// Abandonment is the terminal resolution of an earlier failure and does
    /// not count against the cycle.
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    /// Fold another partial result (one drain lane) into this one.
    pub fn merge(&mut self, other: SyncResult) {
        self.synced += other.synced;
        self.failed += other.failed;
        self.abandoned += other.abandoned;
        self.resolved += other.resolved;
        self.deferred += other.deferred;
        self.errors.extend(other.errors);
        if other.outcome == DrainOutcome::Cancelled {
            self.outcome = DrainOutcome::Cancelled;
        }
    }
}
