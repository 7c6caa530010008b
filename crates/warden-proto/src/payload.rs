//! Raw probe payloads and derived numeric metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw output of one probe call, before classification.
///
/// `status` carries the runtime's own vocabulary (a container state, NUT
/// status flags, ...). `fields` holds every other key/value the probe
/// reported; classification and metric extraction read from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPayload {
    /// Status word(s) reported by the resource, if any.
    pub status: Option<String>,
    /// Additional reported fields.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl RawPayload {
    /// Payload with a status and no fields.
    #[must_use]
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            fields: BTreeMap::new(),
        }
    }

    /// Payload with no status at all.
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Looks up a field, ignoring blank values.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Parses a numeric field. Missing or unparseable values are
    /// [`MetricValue::NotAvailable`], never zero.
    #[must_use]
    pub fn number(&self, key: &str) -> MetricValue {
        self.get(key).map_or(MetricValue::NotAvailable, MetricValue::parse)
    }
}

/// A numeric reading or the explicit absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum MetricValue {
    /// A finite reading.
    Value(f64),
    /// The probe did not report a usable value.
    #[default]
    NotAvailable,
}

impl MetricValue {
    /// Parses a reading, accepting surrounding whitespace and a trailing `%`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map_or(Self::NotAvailable, Self::Value)
    }

    /// Returns the reading, if available.
    #[must_use]
    pub const fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::NotAvailable => None,
        }
    }

    /// Returns true if a reading is present.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        value
            .filter(|v| v.is_finite())
            .map_or(Self::NotAvailable, Self::Value)
    }
}

impl From<MetricValue> for Option<f64> {
    fn from(value: MetricValue) -> Self {
        value.value()
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) if v.fract() == 0.0 => write!(f, "{v:.0}"),
            Self::Value(v) => write!(f, "{v:.1}"),
            Self::NotAvailable => f.write_str("N/A"),
        }
    }
}

/// Named metric readings attached to a log entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics(BTreeMap<String, MetricValue>);

impl Metrics {
    /// Creates an empty set of metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reading.
    pub fn insert(&mut self, name: impl Into<String>, value: MetricValue) {
        self.0.insert(name.into(), value);
    }

    /// Builder-style [`Metrics::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: MetricValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Looks up a reading. Unknown names are reported as not available.
    #[must_use]
    pub fn get(&self, name: &str) -> MetricValue {
        self.0.get(name).copied().unwrap_or_default()
    }

    /// Returns true if no metric was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over readings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, MetricValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("87", MetricValue::Value(87.0))]
    #[test_case(" 99.5 ", MetricValue::Value(99.5))]
    #[test_case("42%", MetricValue::Value(42.0))]
    #[test_case("", MetricValue::NotAvailable)]
    #[test_case("n/a", MetricValue::NotAvailable)]
    #[test_case("NaN", MetricValue::NotAvailable)]
    fn parse_metric(raw: &str, expected: MetricValue) {
        assert_eq!(MetricValue::parse(raw), expected);
    }

    #[test]
    fn missing_field_is_not_zero() {
        let raw = RawPayload::with_status("OL").field("battery.charge", "garbage");
        assert_eq!(raw.number("battery.charge"), MetricValue::NotAvailable);
        assert_eq!(raw.number("battery.runtime"), MetricValue::NotAvailable);
    }

    #[test]
    fn blank_fields_are_ignored() {
        let raw = RawPayload::absent().field("name", "   ");
        assert!(raw.get("name").is_none());
    }

    #[test]
    fn metric_display() {
        assert_eq!(MetricValue::Value(100.0).to_string(), "100");
        assert_eq!(MetricValue::Value(12.34).to_string(), "12.3");
        assert_eq!(MetricValue::NotAvailable.to_string(), "N/A");
    }

    #[test]
    fn metrics_serialize_not_available_as_null() {
        let metrics = Metrics::new()
            .with("charge", MetricValue::Value(80.0))
            .with("load", MetricValue::NotAvailable);
        let json = serde_json::to_string(&metrics).expect("serialize");
        assert_eq!(json, r#"{"charge":80.0,"load":null}"#);
        let back: Metrics = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, metrics);
    }

    proptest! {
        #[test]
        fn parse_never_yields_non_finite(raw in ".*") {
            if let MetricValue::Value(v) = MetricValue::parse(&raw) {
                prop_assert!(v.is_finite());
            }
        }
    }
}
