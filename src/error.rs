//! Error types for feedrelay.

use thiserror::Error;

/// Common error type for feedrelay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for configuration values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Network or parse failure while retrieving a feed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The destination rejected or failed to accept a notification.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Durable write of the delivery history failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Persisted delivery history could not be read back.
    #[error("corrupt history: {0}")]
    CorruptHistory(String),

    /// A polling cycle is already running.
    #[error("a polling cycle is already running")]
    CycleInProgress,
}

/// Result type alias for feedrelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
