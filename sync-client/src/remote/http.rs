//! HTTP delivery over reqwest.

use super::{DeliveryError, Remote, RemoteResponse};
use async_trait::async_trait;
use offline_sync_types::RemoteRecord;
use serde_json::Value;

/// Payload fields used to address the server copy of a record.
const RECORD_KEY_FIELDS: [&str; 2] = ["id", "recordId"];

/// Remote that POSTs payloads to `{base_url}/{endpoint}`.
///
/// Endpoints that are already absolute URLs are used as-is.
pub struct HttpRemote {
    base_url: String,
    bearer_token: Option<String>,
    http: reqwest::Client,
}

impl HttpRemote {
    /// Create a remote for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: None,
            http: reqwest::Client::new(),
        }
    }

    /// Authenticate every request with a bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL for an endpoint.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Record key carried by a payload, rendered as a query value.
fn record_key(payload: &Value) -> Option<String> {
    let object = payload.as_object()?;
    RECORD_KEY_FIELDS
        .iter()
        .find_map(|field| object.get(*field))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn network_error(e: reqwest::Error) -> DeliveryError {
    DeliveryError::Network(e.to_string())
}

#[async_trait]
impl Remote for HttpRemote {
    async fn send(&self, endpoint: &str, payload: &Value) -> Result<RemoteResponse, DeliveryError> {
        let url = self.endpoint_url(endpoint);
        let response = self
            .authorize(self.http.post(&url).json(payload))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);

        Ok(RemoteResponse {
            ok: status.is_success(),
            status: status.as_u16(),
            body,
        })
    }

    async fn fetch_record(
        &self,
        endpoint: &str,
        payload: &Value,
    ) -> Result<Option<RemoteRecord>, DeliveryError> {
        let url = self.endpoint_url(endpoint);
        let mut request = self.http.get(&url);
        if let Some(key) = record_key(payload) {
            request = request.query(&[("id", key)]);
        }

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(network_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DeliveryError::Rejected {
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(network_error)?;
        Ok(RemoteRecord::from_body(body))
    }
}
