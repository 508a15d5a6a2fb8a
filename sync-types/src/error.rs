//! Error types for offline-sync data model parsing.

use thiserror::Error;

/// Errors raised while parsing data model values.
#[derive(Debug, Error)]
pub enum TypesError {
    /// The item type tag is not one of the known categories.
    #[error("unknown item type: {0}")]
    UnknownItemType(String),

    /// The item id is not a valid UUID.
    #[error("invalid item id: {0}")]
    InvalidItemId(#[source] uuid::Error),

    /// A timestamp could not be interpreted.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The event name is not one the engine publishes.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TypesError::UnknownItemType("badges".into());
        assert_eq!(err.to_string(), "unknown item type: badges");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypesError>();
    }
}
