//! Remote delivery abstraction.
//!
//! The coordinator talks to the server through the [`Remote`] trait:
//! - `send()` delivers a queued payload to its endpoint
//! - `fetch_record()` reads the server copy for conflict resolution
//!
//! Every failure mode (unreachable host, timeout, non-success status) is a
//! [`DeliveryError`] and goes through the same retry path.

mod http;
mod mock;

pub use http::HttpRemote;
pub use mock::MockRemote;

use async_trait::async_trait;
use offline_sync_types::RemoteRecord;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Delivery errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The request never completed.
    #[error("network error: {0}")]
    Network(String),

    /// No response within the delivery timeout.
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-success status.
    #[error("rejected with status {status}")]
    Rejected {
        /// HTTP-like status code.
        status: u16,
    },
}

/// Response to a delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    /// Whether the server accepted the payload.
    pub ok: bool,
    /// HTTP-like status code.
    pub status: u16,
    /// Response body (`Null` when empty or not JSON).
    pub body: Value,
}

impl RemoteResponse {
    /// A `200` response with the given body.
    pub fn accepted(body: Value) -> Self {
        Self {
            ok: true,
            status: 200,
            body,
        }
    }

    /// A failed response with the given status.
    pub fn rejected(status: u16) -> Self {
        Self {
            ok: false,
            status,
            body: Value::Null,
        }
    }

    /// Turn a non-success response into an error.
    pub fn into_result(self) -> Result<Self, DeliveryError> {
        if self.ok {
            Ok(self)
        } else {
            Err(DeliveryError::Rejected {
                status: self.status,
            })
        }
    }
}

/// Server the queue drains into.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Deliver `payload` to `endpoint`.
    async fn send(&self, endpoint: &str, payload: &Value) -> Result<RemoteResponse, DeliveryError>;

    /// Fetch the server copy of the record `payload` mutates.
    ///
    /// `Ok(None)` means the server holds no such record.
    async fn fetch_record(
        &self,
        endpoint: &str,
        payload: &Value,
    ) -> Result<Option<RemoteRecord>, DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_response_becomes_error() {
        let err = RemoteResponse::rejected(503).into_result().unwrap_err();
        assert_eq!(err, DeliveryError::Rejected { status: 503 });
        assert_eq!(err.to_string(), "rejected with status 503");
    }

    #[test]
    fn accepted_response_passes_through() {
        let response = RemoteResponse::accepted(Value::Null).into_result().unwrap();
        assert_eq!(response.status, 200);
    }
}
