//! CLI command implementations.

pub mod clear;
pub mod drain;
pub mod enqueue;
pub mod status;
pub mod watch;

use offline_sync_client::{AnyStore, ConnectivityMonitor, HttpRemote, OfflineSync};
use std::path::Path;

use crate::config::Config;

/// Engine type every command drives.
pub type Engine = OfflineSync<AnyStore, HttpRemote>;

/// Open the queue in `data_dir` and build the engine around it.
pub async fn open_engine(data_dir: &Path, config: &Config, online: bool) -> Engine {
    let store = AnyStore::open(&config.store_config(data_dir)).await;
    let mut remote = HttpRemote::new(&config.delivery.base_url);
    if let Some(token) = &config.delivery.bearer_token {
        remote = remote.with_bearer_token(token);
    }
    OfflineSync::new(
        store,
        remote,
        ConnectivityMonitor::new(online),
        config.sync_config(),
    )
}
