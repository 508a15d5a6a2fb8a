//! Run one drain cycle.

use anyhow::Result;
use offline_sync_types::{DrainOutcome, SyncResult};
use std::path::Path;

use super::open_engine;
use crate::config::Config;

/// Run the drain command.
pub async fn run(data_dir: &Path, config: &Config, online: bool) -> Result<SyncResult> {
    let engine = open_engine(data_dir, config, online).await;
    let result = engine.sync_all().await;

    match result.outcome {
        DrainOutcome::Offline => {
            println!("Offline: nothing attempted");
            return Ok(result);
        }
        DrainOutcome::AlreadyRunning => {
            println!("A drain is already running");
            return Ok(result);
        }
        DrainOutcome::Cancelled => println!("Drain cancelled"),
        DrainOutcome::Completed => println!("Drain complete"),
    }

    println!("  Synced:    {}", result.synced);
    println!("  Failed:    {}", result.failed);
    println!("  Abandoned: {}", result.abandoned);
    println!("  Resolved:  {}", result.resolved);
    println!("  Deferred:  {}", result.deferred);
    for error in &result.errors {
        println!("  ! {}", error);
    }

    Ok(result)
}
