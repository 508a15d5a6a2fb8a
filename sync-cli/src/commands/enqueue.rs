//! Queue a mutation.

use anyhow::{Context, Result};
use offline_sync_client::{EnqueueReceipt, ItemOutcome};
use offline_sync_types::ItemType;
use serde_json::Value;
use std::path::Path;

use super::open_engine;
use crate::config::Config;

/// Run the enqueue command.
pub async fn run(
    data_dir: &Path,
    config: &Config,
    item_type: ItemType,
    payload: Value,
    endpoint: &str,
    online: bool,
) -> Result<EnqueueReceipt> {
    let engine = open_engine(data_dir, config, online).await;

    let receipt = engine
        .enqueue(item_type, payload, endpoint)
        .await
        .context("Failed to queue item")?;

    println!("Queued {} item {}", item_type, receipt.id);
    match &receipt.immediate {
        None => println!("  Delivery: deferred (offline)"),
        Some(ItemOutcome::Synced) => println!("  Delivery: synced"),
        Some(ItemOutcome::Resolved(decision)) => {
            println!("  Delivery: dropped, server copy wins ({:?})", decision)
        }
        Some(ItemOutcome::Failed { retry_count, error }) => {
            println!("  Delivery: failed (attempt {}): {}", retry_count, error)
        }
        Some(ItemOutcome::Abandoned { retry_count, error }) => {
            println!("  Delivery: abandoned after {} attempts: {}", retry_count, error)
        }
        Some(other) => println!("  Delivery: skipped ({:?})", other),
    }

    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use tempfile::tempdir;

    /// Nothing listens on the discard port; connections are refused at once.
    fn unreachable_config() -> Config {
        let mut config = Config::default();
        config.delivery.base_url = "http://127.0.0.1:9".to_string();
        config.delivery.timeout_secs = 2;
        config
    }

    #[tokio::test]
    async fn offline_enqueue_is_persisted() {
        let dir = tempdir().unwrap();
        let config = Config::default();

        let receipt = run(
            dir.path(),
            &config,
            ItemType::Progress,
            json!({"lesson": 1}),
            "/progress",
            false,
        )
        .await
        .unwrap();
        assert!(receipt.immediate.is_none());

        let engine = open_engine(dir.path(), &config, false).await;
        let snapshot = engine.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.items[0].id, receipt.id);
    }

    #[tokio::test]
    async fn failed_immediate_attempt_stays_queued() {
        let dir = tempdir().unwrap();
        let config = unreachable_config();

        let receipt = run(
            dir.path(),
            &config,
            ItemType::Settings,
            json!({"theme": "dark"}),
            "/settings",
            true,
        )
        .await
        .unwrap();
        assert!(matches!(
            receipt.immediate,
            Some(ItemOutcome::Failed { retry_count: 1, .. })
        ));

        let engine = open_engine(dir.path(), &config, false).await;
        let snapshot = engine.snapshot().await.unwrap();
        assert_eq!(snapshot.items[0].retry_count, 1);
    }
}
