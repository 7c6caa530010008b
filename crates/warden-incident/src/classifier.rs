//! Raw sample → canonical state.
//!
//! A [`StateClassifier`] is configured with a vocabulary table rather than
//! per-kind control flow: the status reported by the probe is split into
//! tokens and the first table row whose token appears wins, so table order
//! is priority order. Numeric fields are extracted into [`Metrics`], and
//! escalation rules can move a state based on a metric (on battery with a
//! nearly empty battery is reported as low).

use chrono::{DateTime, Utc};
use tracing::debug;
use warden_proto::{Metrics, RawPayload, ResourceKey};

use crate::error::{IncidentError, Result};
use crate::observation::Observation;
use crate::state::{ContainerState, NetworkState, ResourceState, SystemState, UpsState};

/// Maps a metric name to the raw field it is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSpec {
    /// Name in the persisted metrics.
    pub name: String,
    /// Raw payload field.
    pub field: String,
}

/// Moves `from` to `to` when `metric` is at or below `at_or_below`.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation<S> {
    /// State the rule applies to.
    pub from: S,
    /// Metric compared.
    pub metric: String,
    /// Inclusive threshold.
    pub at_or_below: f64,
    /// Resulting state.
    pub to: S,
}

/// Configurable, total classifier for one resource kind.
#[derive(Debug, Clone)]
pub struct StateClassifier<S> {
    vocabulary: Vec<(String, S)>,
    absent: S,
    unrecognized: S,
    escalations: Vec<Escalation<S>>,
    metrics: Vec<MetricSpec>,
    label_field: Option<String>,
    group_field: Option<String>,
    attribute_fields: Vec<String>,
}

impl<S: ResourceState> StateClassifier<S> {
    /// Creates a classifier with an empty vocabulary.
    ///
    /// `absent` is used when the probe reported no status at all,
    /// `unrecognized` when it reported something outside the vocabulary.
    #[must_use]
    pub fn new(absent: S, unrecognized: S) -> Self {
        Self {
            vocabulary: Vec::new(),
            absent,
            unrecognized,
            escalations: Vec::new(),
            metrics: Vec::new(),
            label_field: None,
            group_field: None,
            attribute_fields: Vec::new(),
        }
    }

    /// Adds a vocabulary row. Matching is case-insensitive.
    #[must_use]
    pub fn token(mut self, token: &str, state: S) -> Self {
        self.vocabulary.push((token.to_ascii_lowercase(), state));
        self
    }

    /// Adds an escalation rule.
    #[must_use]
    pub fn escalate(mut self, from: S, metric: &str, at_or_below: f64, to: S) -> Self {
        self.escalations.push(Escalation {
            from,
            metric: metric.to_string(),
            at_or_below,
            to,
        });
        self
    }

    /// Extracts `field` as metric `name`.
    #[must_use]
    pub fn metric(mut self, name: &str, field: &str) -> Self {
        self.metrics.push(MetricSpec {
            name: name.to_string(),
            field: field.to_string(),
        });
        self
    }

    /// Reads the display label from `field`.
    #[must_use]
    pub fn label_field(mut self, field: &str) -> Self {
        self.label_field = Some(field.to_string());
        self
    }

    /// Reads the grouping key from `field`.
    #[must_use]
    pub fn group_field(mut self, field: &str) -> Self {
        self.group_field = Some(field.to_string());
        self
    }

    /// Copies `field` into the observation attributes.
    #[must_use]
    pub fn attribute(mut self, field: &str) -> Self {
        self.attribute_fields.push(field.to_string());
        self
    }

    /// Classifies a payload, reporting why it could not be when the status is
    /// missing or outside the vocabulary.
    pub fn try_classify(&self, raw: &RawPayload) -> Result<S> {
        let status = raw
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IncidentError::ClassificationAmbiguous {
                kind: S::KIND,
                detail: "no status reported".to_string(),
            })?;

        let tokens: Vec<String> = status
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        let state = self
            .vocabulary
            .iter()
            .find(|(token, _)| tokens.contains(token))
            .map(|(_, state)| *state)
            .ok_or_else(|| IncidentError::ClassificationAmbiguous {
                kind: S::KIND,
                detail: format!("unrecognized status '{status}'"),
            })?;

        Ok(self.apply_escalations(state, &self.metrics(raw)))
    }

    /// Classifies a payload. Never fails: ambiguous input resolves to the
    /// configured fallback state.
    pub fn classify(&self, raw: &RawPayload) -> S {
        match self.try_classify(raw) {
            Ok(state) => state,
            Err(e) => {
                let fallback = if raw.status.as_deref().is_none_or(|s| s.trim().is_empty()) {
                    self.absent
                } else {
                    self.unrecognized
                };
                debug!(kind = %S::KIND, error = %e, fallback = %fallback, "Using fallback state");
                fallback
            }
        }
    }

    /// Extracts every configured metric. Missing or unparseable fields are
    /// recorded as not available.
    pub fn metrics(&self, raw: &RawPayload) -> Metrics {
        let mut metrics = Metrics::new();
        for spec in &self.metrics {
            metrics.insert(spec.name.clone(), raw.number(&spec.field));
        }
        metrics
    }

    /// Classifies a payload and attaches label, group, metrics and attributes.
    pub fn observe(
        &self,
        resource: ResourceKey,
        raw: &RawPayload,
        observed_at: DateTime<Utc>,
    ) -> Observation<S> {
        let mut obs = Observation::new(resource, self.classify(raw))
            .with_metrics(self.metrics(raw))
            .at(observed_at);

        if let Some(label) = self.label_field.as_deref().and_then(|f| raw.get(f)) {
            obs.label = Some(label.to_string());
        }
        if let Some(group) = self.group_field.as_deref().and_then(|f| raw.get(f)) {
            obs.group = Some(group.to_string());
        }
        for field in &self.attribute_fields {
            if let Some(value) = raw.get(field) {
                obs.attributes.insert(field.clone(), value.to_string());
            }
        }
        obs
    }

    fn apply_escalations(&self, state: S, metrics: &Metrics) -> S {
        self.escalations
            .iter()
            .filter(|rule| rule.from == state)
            .find(|rule| {
                metrics
                    .get(&rule.metric)
                    .value()
                    .is_some_and(|v| v <= rule.at_or_below)
            })
            .map_or(state, |rule| rule.to)
    }
}

/// Raw field carrying the display name.
pub const FIELD_NAME: &str = "name";

impl StateClassifier<ContainerState> {
    /// Classifier for container runtime states.
    ///
    /// A missing state means the container is not running; `dead` and
    /// `removing` count as removed. The group is read from the
    /// `label.<group_label>` field.
    #[must_use]
    pub fn containers(group_label: &str) -> Self {
        Self::new(ContainerState::Stopped, ContainerState::Unknown)
            .token("running", ContainerState::Running)
            .token("restarting", ContainerState::Restarting)
            .token("paused", ContainerState::Paused)
            .token("created", ContainerState::Stopped)
            .token("exited", ContainerState::Stopped)
            .token("stopped", ContainerState::Stopped)
            .token("removing", ContainerState::Removed)
            .token("dead", ContainerState::Removed)
            .token("removed", ContainerState::Removed)
            .label_field(FIELD_NAME)
            .group_field(&format!("label.{group_label}"))
            .attribute("id")
            .attribute("image")
    }
}

impl StateClassifier<NetworkState> {
    /// Classifier for reachability probes.
    #[must_use]
    pub fn network() -> Self {
        Self::new(NetworkState::Down, NetworkState::Down)
            .token("up", NetworkState::Up)
            .token("down", NetworkState::Down)
            .label_field(FIELD_NAME)
            .attribute("host")
    }
}

impl StateClassifier<UpsState> {
    /// Classifier for NUT status flags.
    ///
    /// `LB` wins over `OB`, which wins over `OL`. On battery with the charge at
    /// or below `low_charge_percent` is escalated to low.
    #[must_use]
    pub fn ups(low_charge_percent: f64) -> Self {
        Self::new(UpsState::Unknown, UpsState::Unknown)
            .token("lb", UpsState::Low)
            .token("ob", UpsState::OnBattery)
            .token("ol", UpsState::Online)
            .escalate(UpsState::OnBattery, "charge", low_charge_percent, UpsState::Low)
            .metric("charge", "battery.charge")
            .metric("runtime", "battery.runtime")
            .metric("runtime_low", "battery.runtime.low")
            .metric("input_voltage", "input.voltage")
            .metric("load", "ups.load")
            .label_field(FIELD_NAME)
            .attribute("device.model")
    }
}

impl StateClassifier<SystemState> {
    /// Classifier for host lifecycle events.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SystemState::Down, SystemState::Down)
            .token("up", SystemState::Up)
            .token("down", SystemState::Down)
            .label_field(FIELD_NAME)
    }
}
