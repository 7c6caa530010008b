//! A classified sample of one resource.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use warden_log::EntryPayload;
use warden_proto::{Metrics, ResourceKey};

use crate::state::ResourceState;

/// Grouping key used when a resource carries none.
pub const DEFAULT_GROUP: &str = "standalone";

/// A sample after classification: the canonical state plus the derived data
/// worth persisting.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<S> {
    /// The resource observed.
    pub resource: ResourceKey,
    /// Canonical state.
    pub state: S,
    /// Display label.
    pub label: Option<String>,
    /// Grouping key for batching messages.
    pub group: Option<String>,
    /// Numeric readings.
    pub metrics: Metrics,
    /// Free-form attributes.
    pub attributes: BTreeMap<String, String>,
    /// When the sample was taken.
    pub observed_at: DateTime<Utc>,
}

impl<S: ResourceState> Observation<S> {
    /// Creates an observation stamped with the current time.
    #[must_use]
    pub fn new(resource: ResourceKey, state: S) -> Self {
        Self {
            resource,
            state,
            label: None,
            group: None,
            metrics: Metrics::new(),
            attributes: BTreeMap::new(),
            observed_at: Utc::now(),
        }
    }

    /// Sets the display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the grouping key.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Sets the metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Sets the observation time.
    #[must_use]
    pub const fn at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }

    /// The grouping key, falling back to [`DEFAULT_GROUP`].
    #[must_use]
    pub fn group_key(&self) -> &str {
        self.group.as_deref().unwrap_or(DEFAULT_GROUP)
    }

    /// The payload persisted with a log entry for this observation.
    #[must_use]
    pub fn payload(&self) -> EntryPayload {
        EntryPayload {
            label: self.label.clone(),
            group: self.group.clone(),
            metrics: self.metrics.clone(),
            attributes: self.attributes.clone(),
            opened_at: None,
            duration_secs: None,
        }
    }
}
