//! Durable storage for the pending sync queue.
//!
//! Two backends implement the same [`QueueStore`] contract:
//! - [`SqliteStore`] - structured store, one row per item
//! - [`BlobStore`] - the whole queue as one serialized JSON document
//!
//! [`AnyStore::open`] prefers the structured backend and falls back to the
//! blob backend when it cannot be opened, so callers never branch on which
//! one is active.
//!
//! Both backends keep at most `max_items_per_type` items of each
//! [`ItemType`], silently evicting the oldest.

mod blob;
mod sqlite;

pub use blob::BlobStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use offline_sync_types::{ItemId, ItemType, QueueSnapshot, SyncItem};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Default soft cap on queued items per type.
pub const DEFAULT_MAX_ITEMS_PER_TYPE: usize = 100;

/// Default byte quota for the blob backend.
pub const DEFAULT_BLOB_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend cannot be opened on this host.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded.
    #[error("store corrupt: {0}")]
    Corrupt(String),

    /// The write would exceed the storage quota.
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which backend is serving the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// SQLite-backed structured store.
    Structured,
    /// Serialized JSON blob.
    Blob,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Structured => f.write_str("structured"),
            Backend::Blob => f.write_str("blob"),
        }
    }
}

/// Trait for queue storage backends.
///
/// All operations are idempotent with respect to item ids.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert an item, or replace the stored item with the same id.
    ///
    /// May evict the oldest items of the same type to honour the cap.
    async fn put(&self, item: &SyncItem) -> Result<(), StoreError>;

    /// All items, optionally of one type, ordered by `created_at` ascending.
    async fn get_all(&self, filter: Option<ItemType>) -> Result<Vec<SyncItem>, StoreError>;

    /// The stored version of one item.
    async fn get(&self, id: &ItemId) -> Result<Option<SyncItem>, StoreError> {
        let items = self.get_all(None).await?;
        Ok(items.into_iter().find(|item| item.id == *id))
    }

    /// Remove an item. Removing an absent id is not an error.
    async fn remove(&self, id: &ItemId) -> Result<(), StoreError>;

    /// Remove every item.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Which backend this is.
    fn backend(&self) -> Backend;

    /// The pending queue with derived statistics.
    async fn stats(&self) -> Result<QueueSnapshot, StoreError> {
        let items = self.get_all(None).await?;
        Ok(QueueSnapshot::from_items(items))
    }
}

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Structured store, falling back to the blob store.
    #[default]
    Auto,
    /// Blob store only.
    Blob,
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory for the queue files; `None` keeps the queue in memory.
    pub data_dir: Option<PathBuf>,
    /// Backend selection.
    pub backend: BackendPreference,
    /// Soft cap on items per type.
    pub max_items_per_type: usize,
    /// Byte quota for the blob backend.
    pub blob_quota_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            backend: BackendPreference::Auto,
            max_items_per_type: DEFAULT_MAX_ITEMS_PER_TYPE,
            blob_quota_bytes: DEFAULT_BLOB_QUOTA_BYTES,
        }
    }
}

impl StoreConfig {
    /// Persist the queue under `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Set the backend preference.
    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    /// Set the per-type cap.
    pub fn with_max_items_per_type(mut self, cap: usize) -> Self {
        self.max_items_per_type = cap;
        self
    }

    /// Set the blob quota.
    pub fn with_blob_quota(mut self, bytes: usize) -> Self {
        self.blob_quota_bytes = bytes;
        self
    }

    fn database_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("queue.db"))
    }

    fn blob_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("queue.json"))
    }
}

/// Whichever backend could be opened.
pub enum AnyStore {
    /// Structured backend.
    Structured(SqliteStore),
    /// Blob fallback.
    Blob(BlobStore),
}

impl AnyStore {
    /// Open the preferred backend, falling back to the blob store.
    ///
    /// Never fails: an unusable structured store is logged and replaced.
    pub async fn open(config: &StoreConfig) -> Self {
        if config.backend == BackendPreference::Auto {
            let opened = match config.database_path() {
                Some(path) => SqliteStore::open(&path, config.max_items_per_type).await,
                None => SqliteStore::in_memory(config.max_items_per_type).await,
            };
            match opened {
                Ok(store) => {
                    tracing::debug!("Queue store: structured backend");
                    return AnyStore::Structured(store);
                }
                Err(e) => {
                    tracing::warn!("Structured store unavailable, using blob fallback: {}", e);
                }
            }
        }

        let blob = match config.blob_path() {
            Some(path) => BlobStore::open(&path, config.max_items_per_type, config.blob_quota_bytes)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("Blob file unavailable, keeping queue in memory: {}", e);
                    BlobStore::in_memory(config.max_items_per_type, config.blob_quota_bytes)
                }),
            None => BlobStore::in_memory(config.max_items_per_type, config.blob_quota_bytes),
        };
        AnyStore::Blob(blob)
    }
}

#[async_trait]
impl QueueStore for AnyStore {
    async fn put(&self, item: &SyncItem) -> Result<(), StoreError> {
        match self {
            AnyStore::Structured(s) => s.put(item).await,
            AnyStore::Blob(s) => s.put(item).await,
        }
    }

    async fn get_all(&self, filter: Option<ItemType>) -> Result<Vec<SyncItem>, StoreError> {
        match self {
            AnyStore::Structured(s) => s.get_all(filter).await,
            AnyStore::Blob(s) => s.get_all(filter).await,
        }
    }

    async fn get(&self, id: &ItemId) -> Result<Option<SyncItem>, StoreError> {
        match self {
            AnyStore::Structured(s) => s.get(id).await,
            AnyStore::Blob(s) => s.get(id).await,
        }
    }

    async fn remove(&self, id: &ItemId) -> Result<(), StoreError> {
        match self {
            AnyStore::Structured(s) => s.remove(id).await,
            AnyStore::Blob(s) => s.remove(id).await,
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match self {
            AnyStore::Structured(s) => s.clear().await,
            AnyStore::Blob(s) => s.clear().await,
        }
    }

    fn backend(&self) -> Backend {
        match self {
            AnyStore::Structured(s) => s.backend(),
            AnyStore::Blob(s) => s.backend(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn item(item_type: ItemType, created_at: u64) -> SyncItem {
        SyncItem::with_created_at(item_type, json!({"n": created_at}), "/x", created_at)
    }

    /// Contract shared by every backend.
    async fn check_contract(store: &dyn QueueStore) {
        let a = item(ItemType::Progress, 30);
        let b = item(ItemType::Progress, 10);
        let c = item(ItemType::Settings, 20);
        store.put(&a).await.unwrap();
        store.put(&b).await.unwrap();
        store.put(&c).await.unwrap();

        // Ordered by created_at across types
        let all = store.get_all(None).await.unwrap();
        let order: Vec<u64> = all.iter().map(|i| i.created_at).collect();
        assert_eq!(order, vec![10, 20, 30]);

        // Filtered
        let progress = store.get_all(Some(ItemType::Progress)).await.unwrap();
        assert_eq!(progress.len(), 2);
        assert!(progress.iter().all(|i| i.item_type == ItemType::Progress));

        // Put replaces by id
        let mut updated = a.clone();
        updated.retry_count = 2;
        updated.next_attempt_at = Some(99);
        store.put(&updated).await.unwrap();
        let all = store.get_all(None).await.unwrap();
        assert_eq!(all.len(), 3);
        let stored = all.iter().find(|i| i.id == a.id).unwrap();
        assert_eq!(stored.retry_count, 2);
        assert_eq!(stored.next_attempt_at, Some(99));
        assert_eq!(stored.payload, a.payload);

        // Stats
        let snapshot = store.stats().await.unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.count(ItemType::Progress), 2);
        assert_eq!(snapshot.oldest, Some(10));

        // Get by id
        assert_eq!(store.get(&c.id).await.unwrap(), Some(c.clone()));

        // Remove, and remove again is a no-op
        store.remove(&b.id).await.unwrap();
        store.remove(&b.id).await.unwrap();
        assert_eq!(store.get_all(None).await.unwrap().len(), 2);
        assert_eq!(store.get(&b.id).await.unwrap(), None);

        store.clear().await.unwrap();
        assert!(store.get_all(None).await.unwrap().is_empty());
    }

    async fn check_cap(store: &dyn QueueStore) {
        for t in 1..=4 {
            store.put(&item(ItemType::Analytics, t)).await.unwrap();
        }
        store.put(&item(ItemType::Progress, 1)).await.unwrap();

        let analytics = store.get_all(Some(ItemType::Analytics)).await.unwrap();
        let kept: Vec<u64> = analytics.iter().map(|i| i.created_at).collect();
        assert_eq!(kept, vec![2, 3, 4], "oldest analytics item is evicted");
        assert_eq!(store.get_all(Some(ItemType::Progress)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sqlite_store_honours_contract() {
        let store = SqliteStore::in_memory(DEFAULT_MAX_ITEMS_PER_TYPE).await.unwrap();
        check_contract(&store).await;
    }

    #[tokio::test]
    async fn blob_store_honours_contract() {
        let store = BlobStore::in_memory(DEFAULT_MAX_ITEMS_PER_TYPE, DEFAULT_BLOB_QUOTA_BYTES);
        check_contract(&store).await;
    }

    #[tokio::test]
    async fn sqlite_store_evicts_oldest_over_cap() {
        let store = SqliteStore::in_memory(3).await.unwrap();
        check_cap(&store).await;
    }

    #[tokio::test]
    async fn blob_store_evicts_oldest_over_cap() {
        let store = BlobStore::in_memory(3, DEFAULT_BLOB_QUOTA_BYTES);
        check_cap(&store).await;
    }

    #[tokio::test]
    async fn open_prefers_structured_backend() {
        let dir = tempdir().unwrap();
        let store = AnyStore::open(&StoreConfig::in_dir(dir.path())).await;
        assert_eq!(store.backend(), Backend::Structured);
        check_contract(&store).await;
    }

    #[tokio::test]
    async fn open_falls_back_to_blob_when_database_cannot_open() {
        let dir = tempdir().unwrap();
        // A directory where the database file should be makes SQLite fail.
        std::fs::create_dir(dir.path().join("queue.db")).unwrap();

        let store = AnyStore::open(&StoreConfig::in_dir(dir.path())).await;

        assert_eq!(store.backend(), Backend::Blob);
        check_contract(&store).await;
    }

    #[tokio::test]
    async fn blob_preference_skips_structured_backend() {
        let config = StoreConfig::default().with_backend(BackendPreference::Blob);
        let store = AnyStore::open(&config).await;
        assert_eq!(store.backend(), Backend::Blob);
    }

    #[tokio::test]
    async fn structured_queue_survives_reopen() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::in_dir(dir.path());
        let queued = item(ItemType::Achievement, 7);

        {
            let store = AnyStore::open(&config).await;
            store.put(&queued).await.unwrap();
        }

        let reopened = AnyStore::open(&config).await;
        let items = reopened.get_all(None).await.unwrap();
        assert_eq!(items, vec![queued]);
    }
}
