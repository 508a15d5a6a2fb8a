//! Show queue and engine status.

use anyhow::{Context, Result};
use offline_sync_types::now_millis;
use std::path::Path;

use super::open_engine;
use crate::config::Config;

/// Run the status command.
pub async fn run(data_dir: &Path, config: &Config, json: bool) -> Result<()> {
    // Status never touches the network
    let engine = open_engine(data_dir, config, false).await;
    let status = engine.status().await.context("Failed to read queue")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let snapshot = engine.snapshot().await.context("Failed to read queue")?;

    println!("=== sync-cli status ===");
    println!();
    println!("Queue:");
    println!("  Backend: {}", status.backend);
    println!("  Pending: {}", status.pending_items);
    for (item_type, count) in &status.pending_by_type {
        println!("    {:<12} {}", item_type.as_str(), count);
    }
    if let (Some(oldest), Some(newest)) = (snapshot.oldest, snapshot.newest) {
        println!("  Oldest:  {}", format_age(oldest));
        println!("  Newest:  {}", format_age(newest));
    }

    let retrying: Vec<_> = snapshot.items.iter().filter(|i| i.retry_count > 0).collect();
    if !retrying.is_empty() {
        println!();
        println!("Retrying:");
        for item in retrying {
            println!(
                "  {} {} (attempts: {}, endpoint: {})",
                item.item_type, item.id, item.retry_count, item.endpoint
            );
        }
    }

    println!();
    println!("Delivery:");
    println!("  Server:  {}", config.delivery.base_url);
    println!(
        "  Retries: {} (backoff {}ms..{}ms)",
        config.retry.max_retries, config.retry.base_delay_ms, config.retry.max_delay_ms
    );

    Ok(())
}

/// Format a unix-ms timestamp relative to now.
fn format_age(ts: u64) -> String {
    let diff = now_millis().saturating_sub(ts) / 1000;

    if diff < 60 {
        format!("{} seconds ago", diff)
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}
