//! Error types for the event log.

use thiserror::Error;

/// Errors that can occur while reading or writing the event log.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An entry could not be persisted.
    #[error("log write failed: {0}")]
    Write(String),

    /// History could not be read back.
    #[error("log read failed: {0}")]
    Read(String),

    /// The store has been closed and accepts no more entries.
    #[error("log store closed")]
    Closed,

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, StoreError>;
