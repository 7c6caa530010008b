//! Error types for wardend.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while building or running the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Event log error.
    #[error("event log error: {0}")]
    Store(#[from] warden_log::StoreError),

    /// Notification channel error.
    #[error("notification channel error: {0}")]
    Channel(#[from] warden_notify::ChannelError),

    /// Incident layer error.
    #[error("incident error: {0}")]
    Incident(#[from] warden_incident::IncidentError),

    /// Identifier parse error.
    #[error("invalid identifier: {0}")]
    Proto(#[from] warden_proto::ProtoError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by probes. None of them stop a watcher.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The resource could not be sampled right now.
    #[error("probe unavailable: {0}")]
    Unavailable(String),

    /// The probe did not answer in time.
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    /// An event stream failed or ended.
    #[error("event stream error: {0}")]
    Stream(String),
}

/// Result type alias for daemon operations.
pub type Result<T> = std::result::Result<T, DaemonError>;
