//! Serialized-blob queue backend.
//!
//! The whole queue is a single JSON array, rewritten on every mutation.
//! A document that fails to parse is treated as an empty queue.

use super::{Backend, QueueStore, StoreError};
use async_trait::async_trait;
use offline_sync_core::overflow;
use offline_sync_types::{ItemId, ItemType, SyncItem};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

enum Location {
    File(PathBuf),
    Memory(String),
}

/// Queue store that keeps every item in one serialized document.
pub struct BlobStore {
    location: Mutex<Location>,
    max_items_per_type: usize,
    quota_bytes: usize,
}

impl BlobStore {
    /// Use the document at `path`, creating parent directories as needed.
    pub async fn open(
        path: &Path,
        max_items_per_type: usize,
        quota_bytes: usize,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(Self {
            location: Mutex::new(Location::File(path.to_path_buf())),
            max_items_per_type,
            quota_bytes,
        })
    }

    /// Keep the document in memory.
    pub fn in_memory(max_items_per_type: usize, quota_bytes: usize) -> Self {
        Self::with_document(String::new(), max_items_per_type, quota_bytes)
    }

    /// In-memory store seeded with a raw document.
    pub(crate) fn with_document(
        document: String,
        max_items_per_type: usize,
        quota_bytes: usize,
    ) -> Self {
        Self {
            location: Mutex::new(Location::Memory(document)),
            max_items_per_type,
            quota_bytes,
        }
    }

    async fn load(location: &Location) -> Result<Vec<SyncItem>, StoreError> {
        let document = match location {
            Location::Memory(doc) => doc.clone(),
            Location::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(doc) => doc,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(e) => return Err(StoreError::Io(e)),
            },
        };

        if document.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<SyncItem>>(&document) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!("Queue document is corrupt, treating as empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, location: &mut Location, items: &[SyncItem]) -> Result<(), StoreError> {
        let document = serde_json::to_string(items)?;
        if document.len() > self.quota_bytes {
            return Err(StoreError::QuotaExceeded(format!(
                "queue document is {} bytes (limit: {} bytes)",
                document.len(),
                self.quota_bytes
            )));
        }

        match location {
            Location::Memory(doc) => *doc = document,
            Location::File(path) => {
                let tmp = path.with_extension("json.tmp");
                tokio::fs::write(&tmp, document.as_bytes()).await?;
                tokio::fs::rename(&tmp, &*path).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for BlobStore {
    async fn put(&self, item: &SyncItem) -> Result<(), StoreError> {
        let mut location = self.location.lock().await;
        let mut items = Self::load(&location).await?;

        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }

        let evicted = overflow(&items, self.max_items_per_type);
        if !evicted.is_empty() {
            tracing::debug!(
                "Evicted {} oldest item(s) over cap {}",
                evicted.len(),
                self.max_items_per_type
            );
            items.retain(|i| !evicted.contains(&i.id));
        }

        self.save(&mut location, &items).await
    }

    async fn get_all(&self, filter: Option<ItemType>) -> Result<Vec<SyncItem>, StoreError> {
        let location = self.location.lock().await;
        let mut items = Self::load(&location).await?;
        if let Some(item_type) = filter {
            items.retain(|i| i.item_type == item_type);
        }
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn remove(&self, id: &ItemId) -> Result<(), StoreError> {
        let mut location = self.location.lock().await;
        let mut items = Self::load(&location).await?;
        let before = items.len();
        items.retain(|i| i.id != *id);
        if items.len() == before {
            return Ok(());
        }
        self.save(&mut location, &items).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut location = self.location.lock().await;
        self.save(&mut location, &[]).await
    }

    fn backend(&self) -> Backend {
        Backend::Blob
    }
}
