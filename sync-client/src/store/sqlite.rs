//! SQLite structured queue backend.

use super::{Backend, QueueStore, StoreError};
use async_trait::async_trait;
use offline_sync_types::{ItemId, ItemType, SyncItem};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// SQLite result code for a full database or disk.
const SQLITE_FULL: &str = "13";

/// SQLite-backed queue store, one row per item.
///
/// Uses WAL mode so status reads do not block a drain.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    max_items_per_type: usize,
}

impl SqliteStore {
    /// Open (or create) the queue database at `path`.
    pub async fn open(path: &Path, max_items_per_type: usize) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self {
            pool,
            max_items_per_type,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory store (for testing and path-less hosts).
    pub async fn in_memory(max_items_per_type: usize) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StoreError::Database)?
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // A single connection that is never recycled: the database lives in it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self {
            pool,
            max_items_per_type,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_items (
                id TEXT PRIMARY KEY,
                item_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_attempt_at INTEGER,
                next_attempt_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sync_items_type_created ON sync_items(item_type, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }
}

impl SqliteStore {
    /// Decode a row, deleting it if it no longer decodes.
    ///
    /// A corrupt row is lost data; it must not block the rest of the queue.
    async fn decode_or_discard(&self, row: ItemRow) -> Result<Option<SyncItem>, StoreError> {
        let raw_id = row.id.clone();
        match SyncItem::try_from(row) {
            Ok(item) => Ok(Some(item)),
            Err(e) => {
                tracing::warn!("Discarding undecodable queue row {:?}: {}", raw_id, e);
                sqlx::query("DELETE FROM sync_items WHERE id = ?1")
                    .bind(&raw_id)
                    .execute(&self.pool)
                    .await
                    .map_err(StoreError::Database)?;
                Ok(None)
            }
        }
    }
}

/// Map a write error, surfacing a full database as a quota failure.
fn write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(SQLITE_FULL) {
            return StoreError::QuotaExceeded(db.message().to_string());
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl QueueStore for SqliteStore {
    async fn put(&self, item: &SyncItem) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&item.payload)?;
        let mut tx = self.pool.begin().await.map_err(StoreError::Database)?;

        sqlx::query(
            r#"
            INSERT INTO sync_items
                (id, item_type, payload, endpoint, created_at, retry_count, last_attempt_at, next_attempt_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                item_type = excluded.item_type,
                payload = excluded.payload,
                endpoint = excluded.endpoint,
                created_at = excluded.created_at,
                retry_count = excluded.retry_count,
                last_attempt_at = excluded.last_attempt_at,
                next_attempt_at = excluded.next_attempt_at
            "#,
        )
        .bind(item.id.to_string())
        .bind(item.item_type.as_str())
        .bind(payload)
        .bind(&item.endpoint)
        .bind(item.created_at as i64)
        .bind(item.retry_count as i64)
        .bind(item.last_attempt_at.map(|t| t as i64))
        .bind(item.next_attempt_at.map(|t| t as i64))
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        // Keep only the newest `max_items_per_type` rows of this type
        let evicted = sqlx::query(
            r#"
            DELETE FROM sync_items
            WHERE item_type = ?1 AND id NOT IN (
                SELECT id FROM sync_items
                WHERE item_type = ?1
                ORDER BY created_at DESC, id DESC
                LIMIT ?2
            )
            "#,
        )
        .bind(item.item_type.as_str())
        .bind(self.max_items_per_type as i64)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?
        .rows_affected();

        tx.commit().await.map_err(write_error)?;

        if evicted > 0 {
            tracing::debug!(
                "Evicted {} oldest {} item(s) over cap {}",
                evicted,
                item.item_type,
                self.max_items_per_type
            );
        }
        Ok(())
    }

    async fn get_all(&self, filter: Option<ItemType>) -> Result<Vec<SyncItem>, StoreError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, item_type, payload, endpoint, created_at, retry_count, last_attempt_at, next_attempt_at
            FROM sync_items
            WHERE ?1 IS NULL OR item_type = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(filter.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(item) = self.decode_or_discard(row).await? {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn get(&self, id: &ItemId) -> Result<Option<SyncItem>, StoreError> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, item_type, payload, endpoint, created_at, retry_count, last_attempt_at, next_attempt_at
            FROM sync_items
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        match row {
            Some(r) => self.decode_or_discard(r).await,
            None => Ok(None),
        }
    }

    async fn remove(&self, id: &ItemId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sync_items WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sync_items")
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        Ok(())
    }

    fn backend(&self) -> Backend {
        Backend::Structured
    }
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    item_type: String,
    payload: String,
    endpoint: String,
    created_at: i64,
    retry_count: i64,
    last_attempt_at: Option<i64>,
    next_attempt_at: Option<i64>,
}

impl TryFrom<ItemRow> for SyncItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(SyncItem {
            id: row
                .id
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("item id {:?}: {}", row.id, e)))?,
            item_type: row
                .item_type
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("row {}: {}", row.id, e)))?,
            payload: serde_json::from_str(&row.payload)?,
            endpoint: row.endpoint,
            created_at: row.created_at as u64,
            retry_count: row.retry_count as u32,
            last_attempt_at: row.last_attempt_at.map(|t| t as u64),
            next_attempt_at: row.next_attempt_at.map(|t| t as u64),
        })
    }
}
