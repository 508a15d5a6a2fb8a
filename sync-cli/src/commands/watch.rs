//! Run the trigger loop in the foreground.
//!
//! Drains on start, on the poll timer, and whenever the wake-up tag fires.
//! On unix, `kill -USR1 <pid>` fires the wake-up.

use anyhow::Result;
use offline_sync_client::{LocalWakeup, SyncEvent};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::{open_engine, Engine};
use crate::config::Config;

/// Run the watch command until Ctrl-C.
pub async fn run(data_dir: &Path, config: &Config) -> Result<()> {
    let wakeup = LocalWakeup::new();
    let engine = open_engine(data_dir, config, true)
        .await
        .with_wakeup(Arc::new(wakeup.clone()));

    let tag = config.sync.wakeup_tag.clone();
    let signals = spawn_wakeup_signal(wakeup, tag);

    println!("Watching queue in {} (Ctrl-C to stop)", data_dir.display());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let seen = watch_until(&engine, shutdown).await;

    if let Some(handle) = signals {
        handle.abort();
    }
    println!("Stopped after {} drain(s)", seen);
    Ok(())
}

/// Run the trigger loop until `shutdown` resolves. Returns the drain events seen.
pub async fn watch_until(engine: &Engine, shutdown: impl Future<Output = ()>) -> usize {
    let mut events = engine.subscribe();
    let tag = engine.config().wakeup_tag.clone();
    if !engine.register_wakeup(&tag) {
        println!("Background wake-up unavailable; using foreground triggers only");
    }

    let Some(trigger_loop) = engine.start() else {
        return 0;
    };
    let first = engine.sync_all().await;
    tracing::debug!("Initial drain: {:?}", first.outcome);

    let mut seen = 0;
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(SyncEvent::SyncComplete(result)) => {
                    seen += 1;
                    println!("sync-complete: {} synced, {} resolved", result.synced, result.resolved);
                }
                Ok(SyncEvent::SyncFailed(result)) => {
                    seen += 1;
                    println!(
                        "sync-failed: {} synced, {} failed, {} abandoned",
                        result.synced, result.failed, result.abandoned
                    );
                }
                Ok(event) => println!("{}", event.kind()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    trigger_loop.shutdown().await;
    seen
}

#[cfg(unix)]
fn spawn_wakeup_signal(wakeup: LocalWakeup, tag: String) -> Option<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("Could not listen for SIGUSR1: {}", e);
            return None;
        }
    };
    Some(tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            if !wakeup.fire(&tag) {
                tracing::warn!("Wake-up {:?} is not registered", tag);
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_wakeup_signal(_wakeup: LocalWakeup, _tag: String) -> Option<tokio::task::JoinHandle<()>> {
    None
}
