//! Error types for warden-proto.

use thiserror::Error;

/// Errors raised while parsing shared identifiers.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Unknown resource kind name.
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    /// A resource key string could not be parsed.
    #[error("invalid resource key: {0}")]
    InvalidKey(String),

    /// A correlation id was empty or malformed.
    #[error("invalid correlation id: {0}")]
    InvalidCorrelation(String),
}

/// Result type for proto operations.
pub type Result<T> = std::result::Result<T, ProtoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            ProtoError::UnknownKind("disk".to_string()).to_string(),
            "unknown resource kind: disk"
        );
        assert_eq!(
            ProtoError::InvalidKey("nope".to_string()).to_string(),
            "invalid resource key: nope"
        );
    }
}
