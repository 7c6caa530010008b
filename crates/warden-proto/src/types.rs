//! Identifiers shared across the warden crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtoError;

/// The family a monitored resource belongs to.
///
/// Each watcher owns exactly one kind, so keys never collide across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A container managed by the local container runtime.
    Container,
    /// Outbound network reachability.
    Network,
    /// Backup power supply.
    Ups,
    /// The host process lifecycle (startup / shutdown).
    System,
}

impl ResourceKind {
    /// All resource kinds, in display order.
    pub const ALL: [Self; 4] = [Self::Container, Self::Network, Self::Ups, Self::System];

    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Network => "network",
            Self::Ups => "ups",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "container" => Ok(Self::Container),
            "network" => Ok(Self::Network),
            "ups" => Ok(Self::Ups),
            "system" => Ok(Self::System),
            other => Err(ProtoError::UnknownKind(other.to_string())),
        }
    }
}

/// Stable identifier for one monitored entity.
///
/// Rendered as `kind/name`, e.g. `container/3f2a9c1b7d0e` or `ups/eaton`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey {
    kind: ResourceKind,
    name: String,
}

impl ResourceKey {
    /// Create a key for the given kind and name.
    #[must_use]
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Key for a singleton resource whose name equals its kind (`network`, `system`).
    #[must_use]
    pub fn singleton(kind: ResourceKind) -> Self {
        Self::new(kind, kind.as_str())
    }

    /// Parse a key from its `kind/name` form.
    ///
    /// # Errors
    ///
    /// Returns an error if the separator is missing, the kind is unknown or
    /// the name is empty.
    pub fn parse(s: &str) -> Result<Self, ProtoError> {
        let (kind, name) = s
            .split_once('/')
            .ok_or_else(|| ProtoError::InvalidKey(s.to_string()))?;
        if name.is_empty() {
            return Err(ProtoError::InvalidKey(s.to_string()));
        }
        Ok(Self::new(kind.parse()?, name))
    }

    /// The resource kind.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The name within the kind.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

impl FromStr for ResourceKey {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = ProtoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.to_string()
    }
}

/// Handle of the single outbound message that represents an incident.
///
/// Issued by a notification channel and never interpreted outside of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap a channel-issued handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is empty.
    pub fn new(handle: impl Into<String>) -> Result<Self, ProtoError> {
        let handle = handle.into();
        if handle.trim().is_empty() {
            return Err(ProtoError::InvalidCorrelation(
                "correlation id cannot be empty".to_string(),
            ));
        }
        Ok(Self(handle))
    }

    /// The raw handle.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("container/abc123", ResourceKind::Container, "abc123")]
    #[test_case("network/network", ResourceKind::Network, "network")]
    #[test_case("ups/eaton@localhost", ResourceKind::Ups, "eaton@localhost")]
    #[test_case("system/system", ResourceKind::System, "system")]
    fn parse_resource_key(input: &str, kind: ResourceKind, name: &str) {
        let key = ResourceKey::parse(input).expect("valid key");
        assert_eq!(key.kind(), kind);
        assert_eq!(key.name(), name);
        assert_eq!(key.to_string(), input);
    }

    #[test_case("container" ; "missing separator")]
    #[test_case("disk/sda" ; "unknown kind")]
    #[test_case("ups/" ; "empty name")]
    fn parse_resource_key_rejects(input: &str) {
        assert!(ResourceKey::parse(input).is_err());
    }

    #[test]
    fn singleton_key_uses_kind_as_name() {
        let key = ResourceKey::singleton(ResourceKind::Network);
        assert_eq!(key.to_string(), "network/network");
    }

    #[test]
    fn resource_key_serializes_as_string() {
        let key = ResourceKey::new(ResourceKind::Container, "web");
        let json = serde_json::to_string(&key).expect("serialize");
        assert_eq!(json, "\"container/web\"");
        let back: ResourceKey = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, key);
    }

    #[test]
    fn correlation_id_rejects_blank() {
        assert!(CorrelationId::new("  ").is_err());
        let id = CorrelationId::new("-100123:42").expect("valid");
        assert_eq!(id.as_str(), "-100123:42");
    }

    #[test]
    fn kind_from_str_matches_as_str() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().expect("parse"), kind);
        }
    }
}
