//! Error types for notification channels.

use std::fmt;

use thiserror::Error;

/// Why an edit could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditFailure {
    /// The message no longer exists (deleted, or the handle is unknown).
    NotFound,
    /// The channel failed for a reason that may not repeat.
    Transient,
}

impl fmt::Display for EditFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

/// Errors returned by a [`NotificationChannel`](crate::NotificationChannel).
#[derive(Debug, Error)]
pub enum ChannelError {
    /// A new message could not be sent.
    #[error("send failed on {channel}: {reason}")]
    Send {
        /// Channel name.
        channel: String,
        /// Failure description.
        reason: String,
    },

    /// An existing message could not be edited.
    #[error("edit failed on {channel} ({failure}): {reason}")]
    Edit {
        /// Channel name.
        channel: String,
        /// Failure class.
        failure: EditFailure,
        /// Failure description.
        reason: String,
    },

    /// The channel is misconfigured.
    #[error("channel configuration error: {0}")]
    Config(String),
}

impl ChannelError {
    /// Creates a send error.
    #[must_use]
    pub fn send(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Send {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    /// Creates an edit error.
    #[must_use]
    pub fn edit(channel: impl Into<String>, failure: EditFailure, reason: impl Into<String>) -> Self {
        Self::Edit {
            channel: channel.into(),
            failure,
            reason: reason.into(),
        }
    }

    /// Returns the edit failure class, if this is an edit error.
    #[must_use]
    pub const fn edit_failure(&self) -> Option<EditFailure> {
        match self {
            Self::Edit { failure, .. } => Some(*failure),
            _ => None,
        }
    }
}

/// Result type alias for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = ChannelError::send("telegram", "timeout");
        assert_eq!(err.to_string(), "send failed on telegram: timeout");

        let err = ChannelError::edit("telegram", EditFailure::NotFound, "message to edit not found");
        assert_eq!(
            err.to_string(),
            "edit failed on telegram (not found): message to edit not found"
        );
    }

    #[test]
    fn edit_failure_accessor() {
        assert_eq!(
            ChannelError::edit("memory", EditFailure::Transient, "boom").edit_failure(),
            Some(EditFailure::Transient)
        );
        assert_eq!(ChannelError::send("memory", "boom").edit_failure(), None);
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChannelError>();
    }
}
