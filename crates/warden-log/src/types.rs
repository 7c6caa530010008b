//! Core types for the event log.
//!
//! This module provides:
//! - [`LogId`]: Unique identifier for log entries
//! - [`LogAction`]: What an entry records (incident opened, updated, resolved, ...)
//! - [`EntryPayload`]: Display label, grouping key and metrics of an observation
//! - [`LogEntry`]: Immutable persisted record
//! - [`LogFilter`] / [`TimeRange`]: Query filters

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_proto::{CorrelationId, Metrics, ResourceKey, ResourceKind};

/// Unique identifier for a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogId(pub u64);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogAction {
    /// A problem state opened a new incident.
    Opened,
    /// An open incident changed problem kind.
    Updated,
    /// Periodic sample of an unchanged, still-open incident.
    Sampled,
    /// The resource returned to its nominal state.
    Resolved,
    /// A saturating recovery signal closed the incident thread.
    Saturated,
    /// A standalone announcement (e.g. first startup).
    Announced,
}

impl LogAction {
    /// Returns the action as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Updated => "updated",
            Self::Sampled => "sampled",
            Self::Resolved => "resolved",
            Self::Saturated => "saturated",
            Self::Announced => "announced",
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived data persisted with an entry.
///
/// The raw probe sample is never stored verbatim; only what rendering and
/// recovery need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPayload {
    /// Human-readable name of the resource (e.g. the container name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Grouping key used to batch related resources into one message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Numeric readings at observation time.
    #[serde(default, skip_serializing_if = "Metrics::is_empty")]
    pub metrics: Metrics,
    /// Free-form attributes (image name, probe host, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// When the incident this entry belongs to was opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<DateTime<Utc>>,
    /// Incident duration, set on resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
}

/// An immutable record of one state observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier, assigned by the store on append.
    pub id: LogId,
    /// When the observation was made.
    pub timestamp: DateTime<Utc>,
    /// The resource the entry is about.
    pub resource: ResourceKey,
    /// Canonical state symbol.
    pub state: String,
    /// What this entry records.
    pub action: LogAction,
    /// Derived payload.
    #[serde(default)]
    pub payload: EntryPayload,
    /// Handle of the message tracking the incident, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(resource: ResourceKey, state: impl Into<String>, action: LogAction) -> Self {
        Self {
            id: LogId(0),
            timestamp: Utc::now(),
            resource,
            state: state.into(),
            action,
            payload: EntryPayload::default(),
            correlation_id: None,
        }
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: EntryPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation(mut self, id: Option<CorrelationId>) -> Self {
        self.correlation_id = id;
        self
    }

    /// Ordering key used to decide which entry is the most recent.
    #[must_use]
    pub fn order_key(&self) -> (DateTime<Utc>, LogId) {
        (self.timestamp, self.id)
    }

    /// The display label, falling back to the resource name.
    #[must_use]
    pub fn label(&self) -> &str {
        self.payload
            .label
            .as_deref()
            .unwrap_or_else(|| self.resource.name())
    }

    /// Checks if this entry matches the given filter.
    #[must_use]
    pub fn matches(&self, filter: &LogFilter) -> bool {
        if !filter.kinds.is_empty() && !filter.kinds.contains(&self.resource.kind()) {
            return false;
        }

        if let Some(ref resource) = filter.resource {
            if &self.resource != resource {
                return false;
            }
        }

        if let Some(ref id) = filter.correlation_id {
            if self.correlation_id.as_ref() != Some(id) {
                return false;
            }
        }

        if !filter.actions.is_empty() && !filter.actions.contains(&self.action) {
            return false;
        }

        filter.time_range.contains(self.timestamp)
    }
}

/// Time range for filtering entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the time range (inclusive)
    pub start: Option<DateTime<Utc>>,
    /// End of the time range (exclusive)
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Creates a new time range with the given bounds.
    #[must_use]
    pub const fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Creates a time range from a start time to now.
    #[must_use]
    pub const fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Checks if a timestamp falls within this range.
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if timestamp >= end {
                return false;
            }
        }
        true
    }
}

/// Filter criteria for querying the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Filter by resource kinds (empty means all kinds)
    #[serde(default)]
    pub kinds: Vec<ResourceKind>,
    /// Restrict to a single resource
    pub resource: Option<ResourceKey>,
    /// Restrict to one incident thread
    pub correlation_id: Option<CorrelationId>,
    /// Filter by actions (empty means all actions)
    #[serde(default)]
    pub actions: Vec<LogAction>,
    /// Time range filter
    #[serde(default)]
    pub time_range: TimeRange,
}

impl LogFilter {
    /// Creates a new empty filter that matches every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a kind filter.
    #[must_use]
    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kinds.push(kind);
        self
    }

    /// Restricts to one resource.
    #[must_use]
    pub fn with_resource(mut self, resource: ResourceKey) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Restricts to one correlation id.
    #[must_use]
    pub fn with_correlation(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Adds an action filter.
    #[must_use]
    pub fn with_action(mut self, action: LogAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Sets the time range.
    #[must_use]
    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = range;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use warden_proto::MetricValue;

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new(ResourceKind::Container, name)
    }

    #[test]
    fn entry_builder_sets_fields() {
        let id = CorrelationId::new("chat:1").expect("id");
        let entry = LogEntry::new(key("web"), "stopped", LogAction::Opened)
            .with_correlation(Some(id.clone()));
        assert_eq!(entry.state, "stopped");
        assert_eq!(entry.correlation_id, Some(id));
        assert_eq!(entry.label(), "web");
    }

    #[test]
    fn label_prefers_payload() {
        let entry = LogEntry::new(key("3f2a9c"), "running", LogAction::Opened).with_payload(
            EntryPayload {
                label: Some("web-1".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(entry.label(), "web-1");
    }

    #[test]
    fn filter_by_kind_and_resource() {
        let entry = LogEntry::new(key("web"), "running", LogAction::Opened);

        assert!(entry.matches(&LogFilter::new()));
        assert!(entry.matches(&LogFilter::new().with_kind(ResourceKind::Container)));
        assert!(!entry.matches(&LogFilter::new().with_kind(ResourceKind::Ups)));
        assert!(entry.matches(&LogFilter::new().with_resource(key("web"))));
        assert!(!entry.matches(&LogFilter::new().with_resource(key("db"))));
    }

    #[test]
    fn filter_by_correlation() {
        let id = CorrelationId::new("chat:7").expect("id");
        let other = CorrelationId::new("chat:8").expect("id");
        let entry = LogEntry::new(key("web"), "stopped", LogAction::Opened)
            .with_correlation(Some(id.clone()));

        assert!(entry.matches(&LogFilter::new().with_correlation(id)));
        assert!(!entry.matches(&LogFilter::new().with_correlation(other)));
    }

    #[test]
    fn filter_by_time_range() {
        let now = Utc::now();
        let entry = LogEntry::new(key("web"), "running", LogAction::Opened).at(now);

        assert!(entry.matches(
            &LogFilter::new().with_time_range(TimeRange::since(now - Duration::minutes(1)))
        ));
        assert!(!entry.matches(
            &LogFilter::new().with_time_range(TimeRange::new(None, Some(now)))
        ));
    }

    #[test]
    fn entry_json_roundtrip_keeps_metrics() {
        let mut payload = EntryPayload::default();
        payload.metrics.insert("charge", MetricValue::Value(64.0));
        payload.metrics.insert("load", MetricValue::NotAvailable);
        let entry = LogEntry::new(ResourceKey::new(ResourceKind::Ups, "eaton"), "onbattery", LogAction::Opened)
            .with_payload(payload);

        let json = serde_json::to_string(&entry).expect("serialize");
        let back: LogEntry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, entry);
        assert_eq!(back.payload.metrics.get("load"), MetricValue::NotAvailable);
    }

    #[test]
    fn action_display() {
        assert_eq!(LogAction::Saturated.to_string(), "saturated");
        assert_eq!(LogAction::Opened.as_str(), "opened");
    }
}
