//! Engine configuration.

use offline_sync_core::RetryPolicy;
use std::time::Duration;

/// Default timeout for a single delivery.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wake-up registration tag.
pub const DEFAULT_WAKEUP_TAG: &str = "offline-sync";

/// Configuration for the coordinator and façade.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Retry budget and backoff.
    pub retry: RetryPolicy,
    /// Upper bound on one delivery (including the conflict lookup).
    pub delivery_timeout: Duration,
    /// Foreground poll interval; `None` disables polling.
    pub poll_interval: Option<Duration>,
    /// Tag used for background wake-up registration.
    pub wakeup_tag: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            poll_interval: None,
            wakeup_tag: DEFAULT_WAKEUP_TAG.to_string(),
        }
    }
}

impl SyncConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the delivery timeout.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Enable the foreground poll timer.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set the wake-up tag.
    pub fn with_wakeup_tag(mut self, tag: &str) -> Self {
        self.wakeup_tag = tag.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.delivery_timeout, Duration::from_secs(30));
        assert!(config.poll_interval.is_none());
        assert_eq!(config.wakeup_tag, "offline-sync");
    }

    #[test]
    fn builder_overrides() {
        let config = SyncConfig::new()
            .with_retry_policy(RetryPolicy::new(3))
            .with_delivery_timeout(Duration::from_millis(250))
            .with_poll_interval(Duration::from_secs(60))
            .with_wakeup_tag("outbox");

        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.delivery_timeout, Duration::from_millis(250));
        assert_eq!(config.poll_interval, Some(Duration::from_secs(60)));
        assert_eq!(config.wakeup_tag, "outbox");
    }
}
