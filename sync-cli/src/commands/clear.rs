//! Drop every queued item.

use anyhow::{Context, Result};
use std::path::Path;

use super::open_engine;
use crate::config::Config;

/// Run the clear command.
pub async fn run(data_dir: &Path, config: &Config) -> Result<usize> {
    let engine = open_engine(data_dir, config, false).await;
    let pending = engine.snapshot().await.context("Failed to read queue")?.len();
    engine.clear().await.context("Failed to clear queue")?;

    println!("Cleared {} queued item(s)", pending);
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::enqueue;
    use offline_sync_types::ItemType;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn clear_empties_the_queue() {
        let dir = tempdir().unwrap();
        let config = Config::default();
        for lesson in 0..3 {
            enqueue::run(
                dir.path(),
                &config,
                ItemType::Progress,
                json!({ "lesson": lesson }),
                "/progress",
                false,
            )
            .await
            .unwrap();
        }

        assert_eq!(run(dir.path(), &config).await.unwrap(), 3);
        assert_eq!(run(dir.path(), &config).await.unwrap(), 0);
    }
}
