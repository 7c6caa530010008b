//! Per-kind incident policies.
//!
//! | kind      | refresh while open | announce open | saturating close |
//! |-----------|--------------------|---------------|------------------|
//! | container | no                 | yes           | no               |
//! | network   | no                 | no            | no               |
//! | ups       | yes                | yes           | charge ≥ 100%    |
//! | system    | no                 | yes           | no               |
//!
//! Network outages are not announced because the channel is normally
//! unreachable while they last; a single message is sent on restore.

use chrono::Duration;
use warden_proto::Metrics;

/// A metric reaching a threshold that ends a lingering incident thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Saturation {
    /// Metric compared.
    pub metric: String,
    /// Inclusive threshold, compared against the rounded reading.
    pub at_or_above: f64,
}

impl Saturation {
    /// Returns true if the metrics show saturation.
    #[must_use]
    pub fn reached(&self, metrics: &Metrics) -> bool {
        metrics
            .get(&self.metric)
            .value()
            .is_some_and(|v| v.round() >= self.at_or_above)
    }
}

/// How incidents of one resource kind behave.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentPolicy {
    /// Emit a sampled entry and refresh the message at this cadence while an
    /// incident stays open in the same state.
    pub refresh_every: Option<Duration>,
    /// Send a message when an incident opens. When false, only the
    /// resolution is delivered.
    pub announce_open: bool,
    /// Keep the thread live after recovery until this condition is reached.
    pub saturation: Option<Saturation>,
    /// Recovered correlation ids older than this are not reused.
    pub stale_after: Option<Duration>,
}

impl Default for IncidentPolicy {
    fn default() -> Self {
        Self {
            refresh_every: None,
            announce_open: true,
            saturation: None,
            stale_after: Some(Duration::hours(24)),
        }
    }
}

impl IncidentPolicy {
    /// Containers: announce, no refresh.
    #[must_use]
    pub fn container() -> Self {
        Self::default()
    }

    /// Network reachability: record outages, message on restore only.
    #[must_use]
    pub fn network() -> Self {
        Self {
            announce_open: false,
            ..Self::default()
        }
    }

    /// UPS: refresh while on battery, hold the thread until fully charged.
    #[must_use]
    pub fn ups(refresh_every: Duration) -> Self {
        Self {
            refresh_every: Some(refresh_every),
            saturation: Some(Saturation {
                metric: "charge".to_string(),
                at_or_above: 100.0,
            }),
            ..Self::default()
        }
    }

    /// Host lifecycle: a shutdown message is always closed on the next start.
    #[must_use]
    pub fn system() -> Self {
        Self {
            stale_after: None,
            ..Self::default()
        }
    }

    /// Sets the recovery grace window.
    #[must_use]
    pub fn with_stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Returns true if a live thread should linger after recovery.
    #[must_use]
    pub const fn holds_until_saturated(&self) -> bool {
        self.saturation.is_some()
    }
}
