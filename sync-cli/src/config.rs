//! Configuration loading for sync-cli.
//!
//! Configuration is loaded from a TOML file (default: `offline-sync.toml`
//! in the data directory). Every field has a default, so a missing file or
//! section is not an error.

use offline_sync_client::{BackendPreference, RetryPolicy, StoreConfig, SyncConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "offline-sync.toml";

/// Root configuration for sync-cli.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Queue storage configuration.
    #[serde(default)]
    pub store: StoreSection,
    /// Retry configuration.
    #[serde(default)]
    pub retry: RetrySection,
    /// Remote delivery configuration.
    #[serde(default)]
    pub delivery: DeliverySection,
    /// Trigger configuration.
    #[serde(default)]
    pub sync: SyncSection,
}

/// Queue storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Backend: "auto" (structured with blob fallback) or "blob".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Soft cap on queued items per type (default: 100).
    #[serde(default = "default_max_items_per_type")]
    pub max_items_per_type: usize,
    /// Byte quota for the blob backend (default: 5MB).
    #[serde(default = "default_blob_quota_bytes")]
    pub blob_quota_bytes: usize,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Attempts before an item is abandoned (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff seed in milliseconds (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds (default: 300000 = 5 minutes).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Remote delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliverySection {
    /// Base URL endpoints are joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-delivery timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token sent with every request.
    pub bearer_token: Option<String>,
}

/// Trigger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSection {
    /// Foreground poll interval in seconds for `watch`; 0 disables (default: 60).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Background wake-up tag (default: "offline-sync").
    #[serde(default = "default_wakeup_tag")]
    pub wakeup_tag: String,
}

// Default value functions
fn default_backend() -> String {
    "auto".to_string()
}

fn default_max_items_per_type() -> usize {
    offline_sync_client::DEFAULT_MAX_ITEMS_PER_TYPE
}

fn default_blob_quota_bytes() -> usize {
    offline_sync_client::DEFAULT_BLOB_QUOTA_BYTES
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    5 * 60 * 1000 // 5 minutes
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_wakeup_tag() -> String {
    offline_sync_client::DEFAULT_WAKEUP_TAG.to_string()
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            max_items_per_type: default_max_items_per_type(),
            blob_quota_bytes: default_blob_quota_bytes(),
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for DeliverySection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            bearer_token: None,
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            wakeup_tag: default_wakeup_tag(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else the default file in `data_dir` if present.
    pub fn load(explicit: Option<&Path>, data_dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let default_path = data_dir.join(CONFIG_FILE);
        if default_path.exists() {
            Self::from_file(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.backend_preference()?;
        if self.retry.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_retries must be at least 1".into(),
            ));
        }
        if self.store.max_items_per_type == 0 {
            return Err(ConfigError::Invalid(
                "store.max_items_per_type must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn backend_preference(&self) -> Result<BackendPreference, ConfigError> {
        match self.store.backend.as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "blob" => Ok(BackendPreference::Blob),
            other => Err(ConfigError::Invalid(format!(
                "store.backend must be \"auto\" or \"blob\", got {:?}",
                other
            ))),
        }
    }

    /// Store configuration rooted at `data_dir`.
    pub fn store_config(&self, data_dir: &Path) -> StoreConfig {
        StoreConfig::in_dir(data_dir)
            .with_backend(self.backend_preference().unwrap_or_default())
            .with_max_items_per_type(self.store.max_items_per_type)
            .with_blob_quota(self.store.blob_quota_bytes)
    }

    /// Retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// Engine configuration.
    pub fn sync_config(&self) -> SyncConfig {
        let config = SyncConfig::new()
            .with_retry_policy(self.retry_policy())
            .with_delivery_timeout(Duration::from_secs(self.delivery.timeout_secs))
            .with_wakeup_tag(&self.sync.wakeup_tag);
        match self.sync.poll_interval_secs {
            0 => config,
            secs => config.with_poll_interval(Duration::from_secs(secs)),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
