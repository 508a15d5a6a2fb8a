//! # sync-client
//!
//! Offline-first sync engine for app state mutations.
//!
//! Mutations (lesson progress, achievements, settings, analytics) are always
//! persisted to a local queue first, delivered right away when the network is
//! reachable, and drained once connectivity returns.
//!
//! ## Features
//!
//! - **Durable Queue**: SQLite store with a serialized-blob fallback
//! - **Bounded Retry**: exponential backoff, abandonment after a fixed budget
//! - **Last-Write-Wins**: stale local mutations are dropped, never merged
//! - **Pluggable Remote**: HTTP delivery, mock for testing
//! - **Pure Core**: decisions come from side-effect-free sync-core logic
//!
//! ## Example
//!
//! ```ignore
//! use offline_sync_client::{AnyStore, ConnectivityMonitor, HttpRemote, OfflineSync, StoreConfig, SyncConfig};
//!
//! let store = AnyStore::open(&StoreConfig::in_dir("/var/lib/app")).await;
//! let sync = OfflineSync::new(store, HttpRemote::new("https://api.example.com"), ConnectivityMonitor::new(true), SyncConfig::default());
//!
//! sync.enqueue(ItemType::Progress, json!({"lesson": 3, "lastModified": now}), "/progress").await?;
//! let result = sync.sync_all().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod events;
pub mod manager;
pub mod remote;
pub mod store;
pub mod wakeup;

pub use config::{SyncConfig, DEFAULT_DELIVERY_TIMEOUT, DEFAULT_WAKEUP_TAG};
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor};
pub use coordinator::{Coordinator, EnqueueReceipt, ItemOutcome};
pub use events::{EventBus, EventKind, ListenerId, SyncEvent};
pub use manager::{OfflineSync, SyncStatus, TriggerLoop};
pub use remote::{DeliveryError, HttpRemote, MockRemote, Remote, RemoteResponse};
pub use store::{
    AnyStore, Backend, BackendPreference, BlobStore, QueueStore, SqliteStore, StoreConfig,
    StoreError, DEFAULT_BLOB_QUOTA_BYTES, DEFAULT_MAX_ITEMS_PER_TYPE,
};
pub use wakeup::{LocalWakeup, WakeupError, WakeupFacility, WakeupTrigger, MAX_REGISTRATIONS};

pub use offline_sync_core::{Decision, RetryPolicy};
pub use offline_sync_types::{
    DrainOutcome, ItemId, ItemType, QueueSnapshot, RemoteRecord, SyncItem, SyncResult,
};
