//! Identity and routing types for offline-sync.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A unique identifier for a queued mutation.
///
/// UUID v7 format: the leading 48 bits are the creation time in
/// milliseconds, so ids sort in creation order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(uuid::Uuid);

impl ItemId {
    /// Create a new time-ordered ItemId.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ItemId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(TypesError::InvalidItemId)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

/// Category of a queued mutation.
///
/// Used for routing and statistics only, never for ordering across types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Lesson and quiz progress.
    Progress,
    /// Unlocked achievements and badges.
    Achievement,
    /// Profile and app settings.
    Settings,
    /// Usage analytics events.
    Analytics,
}

impl ItemType {
    /// All item types, in display order.
    pub const ALL: [ItemType; 4] = [
        ItemType::Progress,
        ItemType::Achievement,
        ItemType::Settings,
        ItemType::Analytics,
    ];

    /// The lowercase tag used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Progress => "progress",
            ItemType::Achievement => "achievement",
            ItemType::Settings => "settings",
            ItemType::Analytics => "analytics",
        }
    }
}

impl FromStr for ItemType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "progress" => Ok(ItemType::Progress),
            "achievement" => Ok(ItemType::Achievement),
            "settings" => Ok(ItemType::Settings),
            "analytics" => Ok(ItemType::Analytics),
            other => Err(TypesError::UnknownItemType(other.to_string())),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
