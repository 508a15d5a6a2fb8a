//! Queued mutations and the server records they are checked against.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{ItemId, ItemType, TypesError};

/// Payload fields that carry a logical "last modified" instant.
const LAST_MODIFIED_FIELDS: [&str; 2] = ["lastModified", "last_modified"];

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Interpret a JSON timestamp as unix milliseconds.
///
/// Integers are taken as milliseconds; strings must be RFC 3339.
pub fn parse_timestamp(value: &Value) -> Result<u64, TypesError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| TypesError::InvalidTimestamp(n.to_string())),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .and_then(|dt| u64::try_from(dt.timestamp_millis()).ok())
            .ok_or_else(|| TypesError::InvalidTimestamp(s.clone())),
        other => Err(TypesError::InvalidTimestamp(other.to_string())),
    }
}

/// A mutation waiting to be delivered to the remote.
///
/// Owned by the queue store; only the coordinator mutates `retry_count`
/// and the attempt timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    /// Unique identifier, assigned at enqueue time.
    pub id: ItemId,
    /// Mutation category.
    pub item_type: ItemType,
    /// Caller-supplied payload, opaque to the engine.
    pub payload: Value,
    /// Logical destination the coordinator delivers to.
    pub endpoint: String,
    /// Creation time (unix ms).
    pub created_at: u64,
    /// Failed delivery attempts so far.
    #[serde(default)]
    pub retry_count: u32,
    /// Time of the most recent failed attempt (unix ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<u64>,
    /// Earliest time the item may be attempted again (unix ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<u64>,
}

impl SyncItem {
    /// Create a fresh item stamped with the current time.
    pub fn new(item_type: ItemType, payload: Value, endpoint: &str) -> Self {
        Self::with_created_at(item_type, payload, endpoint, now_millis())
    }

    /// Create a fresh item with an explicit creation time.
    pub fn with_created_at(
        item_type: ItemType,
        payload: Value,
        endpoint: &str,
        created_at: u64,
    ) -> Self {
        Self {
            id: ItemId::new(),
            item_type,
            payload,
            endpoint: endpoint.to_string(),
            created_at,
            retry_count: 0,
            last_attempt_at: None,
            next_attempt_at: None,
        }
    }

    /// Logical "last modified" instant carried by the payload, if any.
    pub fn last_modified(&self) -> Option<u64> {
        let object = self.payload.as_object()?;
        LAST_MODIFIED_FIELDS
            .iter()
            .find_map(|field| object.get(*field))
            .and_then(|v| parse_timestamp(v).ok())
    }

    /// Whether the backoff window has elapsed at `now`.
    pub fn is_due(&self, now: u64) -> bool {
        self.next_attempt_at.map_or(true, |at| at <= now)
    }
}

/// The authoritative server copy of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    /// When the server copy was last modified (unix ms).
    pub last_modified: u64,
    /// Server body, as returned.
    pub body: Value,
}

impl RemoteRecord {
    /// Build a record from a server body carrying a `lastModified` field.
    ///
    /// Returns `None` if the body has no usable timestamp.
    pub fn from_body(body: Value) -> Option<Self> {
        let object = body.as_object()?;
        let last_modified = LAST_MODIFIED_FIELDS
            .iter()
            .find_map(|field| object.get(*field))
            .and_then(|v| parse_timestamp(v).ok())?;
        Some(Self {
            last_modified,
            body,
        })
    }
}
