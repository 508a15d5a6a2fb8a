//! Drain planning for a queue snapshot.
//!
//! A drain visits every pending item once. Items are grouped into one lane
//! per [`ItemType`]; within a lane they are visited oldest first, ordered by
//! `(created_at, id)`. Lanes are independent: no ordering holds across types.
//!
//! Items whose backoff window is still open at plan time are set aside as
//! deferred and left untouched for a later cycle.

use offline_sync_types::{ItemId, ItemType, SyncItem};
use std::collections::BTreeMap;

/// The ordered items of a single type to visit in one drain.
#[derive(Debug, Clone, PartialEq)]
pub struct Lane {
    /// Type shared by every item in this lane.
    pub item_type: ItemType,
    /// Due items, oldest first.
    pub items: Vec<SyncItem>,
}

/// Per-type drain lanes plus the items skipped for backoff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainPlan {
    /// One lane per type that has due items, in type order.
    pub lanes: Vec<Lane>,
    /// Ids of items not yet due at plan time.
    pub deferred: Vec<ItemId>,
}

impl DrainPlan {
    /// Build a plan from pending items at time `now` (unix ms).
    pub fn build(items: Vec<SyncItem>, now: u64) -> Self {
        let mut by_type: BTreeMap<ItemType, Vec<SyncItem>> = BTreeMap::new();
        let mut deferred = Vec::new();

        for item in items {
            if item.is_due(now) {
                by_type.entry(item.item_type).or_default().push(item);
            } else {
                deferred.push(item.id);
            }
        }

        let lanes = by_type
            .into_iter()
            .map(|(item_type, mut items)| {
                items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
                Lane { item_type, items }
            })
            .collect();

        Self { lanes, deferred }
    }

    /// Number of due items across all lanes.
    pub fn due_count(&self) -> usize {
        self.lanes.iter().map(|lane| lane.items.len()).sum()
    }

    /// Check if there is nothing to attempt.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

/// Ids of the oldest items that exceed `cap` for each type.
///
/// Stores call this after a write to enforce their per-type soft cap.
pub fn overflow(items: &[SyncItem], cap: usize) -> Vec<ItemId> {
    let mut by_type: BTreeMap<ItemType, Vec<&SyncItem>> = BTreeMap::new();
    for item in items {
        by_type.entry(item.item_type).or_default().push(item);
    }

    let mut evicted = Vec::new();
    for (_, mut group) in by_type {
        if group.len() <= cap {
            continue;
        }
        group.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let excess = group.len() - cap;
        evicted.extend(group.iter().take(excess).map(|item| item.id));
    }
    evicted
}
