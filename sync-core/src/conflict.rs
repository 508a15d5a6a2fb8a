//! Last-write-wins conflict resolution.
//!
//! Compares the logical timestamp carried by a queued mutation with the
//! server's copy. Never merges fields: one side prevails whole.

use offline_sync_types::{RemoteRecord, SyncItem};

/// What to do with a queued mutation after comparing it to the server copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Local copy is newer: send it.
    PushLocal,
    /// Server copy is newer: drop the local mutation.
    AcceptRemote,
    /// Both copies are equally fresh: drop the local mutation.
    NoOp,
}

impl Decision {
    /// Whether the local mutation should be delivered.
    pub fn should_push(&self) -> bool {
        matches!(self, Decision::PushLocal)
    }
}

/// Resolve two logical timestamps (unix ms).
///
/// Equal timestamps are already consistent; re-pushing could mask an
/// independent edit on the server.
pub fn resolve(local_modified: u64, remote_modified: u64) -> Decision {
    use std::cmp::Ordering;

    match local_modified.cmp(&remote_modified) {
        Ordering::Greater => Decision::PushLocal,
        Ordering::Less => Decision::AcceptRemote,
        Ordering::Equal => Decision::NoOp,
    }
}

/// Resolve a queued item against the server record.
///
/// Items without a logical timestamp are pushed unconditionally.
pub fn resolve_item(local: &SyncItem, remote: &RemoteRecord) -> Decision {
    match local.last_modified() {
        Some(local_modified) => resolve(local_modified, remote.last_modified),
        None => Decision::PushLocal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_sync_types::ItemType;
    use serde_json::json;

    const T: u64 = 1_700_000_000_000;

    fn progress(last_modified: u64) -> SyncItem {
        SyncItem::new(
            ItemType::Progress,
            json!({"lesson": "fractions-1", "stars": 2, "lastModified": last_modified}),
            "/progress",
        )
    }

    fn remote(last_modified: u64) -> RemoteRecord {
        RemoteRecord {
            last_modified,
            body: json!({"lesson": "fractions-1", "stars": 3}),
        }
    }

    #[test]
    fn newer_remote_wins() {
        let decision = resolve_item(&progress(T - 10_000), &remote(T - 5_000));
        assert_eq!(decision, Decision::AcceptRemote);
        assert!(!decision.should_push());
    }

    #[test]
    fn newer_local_is_pushed() {
        let decision = resolve_item(&progress(T), &remote(T - 30_000));
        assert_eq!(decision, Decision::PushLocal);
        assert!(decision.should_push());
    }

    #[test]
    fn equal_timestamps_are_consistent() {
        assert_eq!(resolve(T, T), Decision::NoOp);
        assert!(!resolve(T, T).should_push());
    }

    #[test]
    fn item_without_timestamp_is_pushed() {
        let item = SyncItem::new(ItemType::Progress, json!({"stars": 1}), "/progress");
        assert_eq!(resolve_item(&item, &remote(T)), Decision::PushLocal);
    }
}
