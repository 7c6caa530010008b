//! Error types for incident tracking.

use thiserror::Error;
use warden_log::StoreError;
use warden_notify::ChannelError;
use warden_proto::ResourceKind;

/// Errors surfaced by the incident layer.
///
/// None of these stop a watcher: classification has a total fallback, and
/// store or channel failures are logged by the engine and absorbed.
#[derive(Debug, Error)]
pub enum IncidentError {
    /// A raw payload could not be mapped to a canonical state.
    #[error("ambiguous {kind} sample: {detail}")]
    ClassificationAmbiguous {
        /// Resource kind being classified.
        kind: ResourceKind,
        /// What was wrong with the payload.
        detail: String,
    },

    /// The event log failed.
    #[error("event log error: {0}")]
    Store(#[from] StoreError),

    /// The notification channel failed.
    #[error("notification error: {0}")]
    Channel(#[from] ChannelError),
}

/// Result type alias for incident operations.
pub type Result<T> = std::result::Result<T, IncidentError>;
