//! Mock remote for testing.
//!
//! Records every call and lets tests script failures per endpoint.

use super::{DeliveryError, Remote, RemoteResponse};
use async_trait::async_trait;
use offline_sync_types::RemoteRecord;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SendHook = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Mock remote for testing.
///
/// Clones share state, so a test can keep a handle after giving one to
/// the coordinator.
#[derive(Default, Clone)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
}

#[derive(Default)]
struct MockRemoteInner {
    attempts: Vec<(String, Value)>,
    delivered: Vec<(String, Value)>,
    fetches: Vec<String>,
    failing: HashSet<String>,
    rejecting: HashMap<String, u16>,
    fail_next_send: Option<String>,
    records: HashMap<String, RemoteRecord>,
    delay: Option<Duration>,
    on_send: Option<SendHook>,
}

impl MockRemote {
    /// Create a mock remote that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `send()` call, successful or not.
    pub fn attempts(&self) -> Vec<(String, Value)> {
        let inner = self.inner.lock().unwrap();
        inner.attempts.clone()
    }

    /// Number of `send()` calls.
    pub fn attempt_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.attempts.len()
    }

    /// Payloads the remote accepted, in arrival order.
    pub fn delivered(&self) -> Vec<(String, Value)> {
        let inner = self.inner.lock().unwrap();
        inner.delivered.clone()
    }

    /// Number of `fetch_record()` calls.
    pub fn fetch_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.fetches.len()
    }

    /// Make every call to `endpoint` fail with a network error.
    pub fn fail_endpoint(&self, endpoint: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.failing.insert(endpoint.to_string());
    }

    /// Undo `fail_endpoint()` and `reject_endpoint()`.
    pub fn heal_endpoint(&self, endpoint: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.failing.remove(endpoint);
        inner.rejecting.remove(endpoint);
    }

    /// Answer every send to `endpoint` with a non-success status.
    pub fn reject_endpoint(&self, endpoint: &str, status: u16) {
        let mut inner = self.inner.lock().unwrap();
        inner.rejecting.insert(endpoint.to_string(), status);
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }

    /// Serve `record` as the server copy for `endpoint`.
    pub fn set_record(&self, endpoint: &str, record: RemoteRecord) {
        let mut inner = self.inner.lock().unwrap();
        inner.records.insert(endpoint.to_string(), record);
    }

    /// Delay every send() by `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.delay = Some(delay);
    }

    /// Run `hook` at the start of every send().
    pub fn on_send(&self, hook: impl Fn(&str, &Value) + Send + Sync + 'static) {
        let mut inner = self.inner.lock().unwrap();
        inner.on_send = Some(Arc::new(hook));
    }

    /// Clear all state (calls, scripts, records).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockRemoteInner::default();
    }
}

#[async_trait]
impl Remote for MockRemote {
    async fn send(&self, endpoint: &str, payload: &Value) -> Result<RemoteResponse, DeliveryError> {
        let (delay, hook) = {
            let mut inner = self.inner.lock().unwrap();
            inner.attempts.push((endpoint.to_string(), payload.clone()));
            (inner.delay, inner.on_send.clone())
        };

        if let Some(hook) = hook {
            hook(endpoint, payload);
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(DeliveryError::Network(error));
        }
        if inner.failing.contains(endpoint) {
            return Err(DeliveryError::Network(format!("{} unreachable", endpoint)));
        }
        if let Some(status) = inner.rejecting.get(endpoint) {
            return Ok(RemoteResponse::rejected(*status));
        }

        inner.delivered.push((endpoint.to_string(), payload.clone()));
        Ok(RemoteResponse::accepted(Value::Null))
    }

    async fn fetch_record(
        &self,
        endpoint: &str,
        _payload: &Value,
    ) -> Result<Option<RemoteRecord>, DeliveryError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetches.push(endpoint.to_string());

        if inner.failing.contains(endpoint) {
            return Err(DeliveryError::Network(format!("{} unreachable", endpoint)));
        }
        Ok(inner.records.get(endpoint).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ===========================================
    // MockRemote Tests
    // ===========================================

    #[tokio::test]
    async fn accepts_by_default() {
        let remote = MockRemote::new();

        let response = remote.send("/progress", &json!({"stars": 1})).await.unwrap();

        assert!(response.ok);
        assert_eq!(remote.attempt_count(), 1);
        assert_eq!(remote.delivered(), vec![("/progress".to_string(), json!({"stars": 1}))]);
    }

    #[tokio::test]
    async fn failing_endpoint_records_attempt_but_not_delivery() {
        let remote = MockRemote::new();
        remote.fail_endpoint("/progress");

        let err = remote.send("/progress", &json!({})).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Network(_)));
        assert_eq!(remote.attempt_count(), 1);
        assert!(remote.delivered().is_empty());

        remote.heal_endpoint("/progress");
        assert!(remote.send("/progress", &json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn fail_next_send_applies_once() {
        let remote = MockRemote::new();
        remote.fail_next_send("boom");

        assert!(remote.send("/a", &json!({})).await.is_err());
        assert!(remote.send("/a", &json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_endpoint_answers_with_status() {
        let remote = MockRemote::new();
        remote.reject_endpoint("/settings", 422);

        let response = remote.send("/settings", &json!({})).await.unwrap();

        assert!(!response.ok);
        assert_eq!(response.status, 422);
    }

    #[tokio::test]
    async fn serves_scripted_records() {
        let remote = MockRemote::new();
        let record = RemoteRecord {
            last_modified: 5,
            body: json!({"lastModified": 5}),
        };
        remote.set_record("/progress", record.clone());

        assert_eq!(remote.fetch_record("/progress", &json!({})).await.unwrap(), Some(record));
        assert_eq!(remote.fetch_record("/settings", &json!({})).await.unwrap(), None);
        assert_eq!(remote.fetch_count(), 2);
        assert_eq!(remote.attempt_count(), 0);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let remote = MockRemote::new();
        let handle = remote.clone();

        remote.send("/a", &json!({})).await.unwrap();
        assert_eq!(handle.attempt_count(), 1);

        handle.reset();
        assert_eq!(remote.attempt_count(), 0);
    }
}
