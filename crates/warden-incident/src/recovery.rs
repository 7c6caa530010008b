//! Restart recovery.
//!
//! The in-memory incident of a resource is rebuilt from the most recent log
//! entry for its key. Seeding is a pure function of that entry, the policy
//! and the clock, so running it twice over the same log yields the same
//! incident.

use chrono::{DateTime, Utc};
use tracing::warn;
use warden_log::{LogAction, LogEntry};
use warden_proto::ResourceKey;

use crate::policy::IncidentPolicy;
use crate::state::ResourceState;
use crate::tracker::Incident;

/// Rebuilds the incident of `resource` from its most recent log entry.
///
/// - No entry: nominal, no message.
/// - Problem state: that state and its message, unless the entry is older
///   than the policy's grace window, in which case the next change sends a
///   fresh message. A recent problem logged without a message is marked
///   undelivered so the next sample sends it.
/// - Nominal state: no message, except a lingering thread under a
///   saturating policy that was not yet saturated.
#[must_use]
pub fn seed<S: ResourceState>(
    resource: ResourceKey,
    latest: Option<&LogEntry>,
    policy: &IncidentPolicy,
    now: DateTime<Utc>,
) -> Incident<S> {
    let mut incident = Incident::nominal(resource);
    let Some(entry) = latest else {
        return incident;
    };

    incident.label.clone_from(&entry.payload.label);
    incident.group.clone_from(&entry.payload.group);

    let Some(state) = S::parse(&entry.state) else {
        warn!(
            resource = %entry.resource,
            state = %entry.state,
            "Unknown state in event log, assuming nominal"
        );
        return incident;
    };

    let stale = policy
        .stale_after
        .is_some_and(|window| now - entry.timestamp > window);

    incident.last_state = state;
    incident.opened_at = entry.payload.opened_at;

    if state.is_nominal() {
        let lingering = policy.holds_until_saturated()
            && !matches!(entry.action, LogAction::Saturated | LogAction::Announced);
        if lingering && !stale {
            incident.correlation_id.clone_from(&entry.correlation_id);
        }
        if entry.action == LogAction::Resolved {
            incident.closed_at = Some(entry.timestamp);
        }
    } else {
        if !stale {
            incident.correlation_id.clone_from(&entry.correlation_id);
            incident.undelivered = entry.correlation_id.is_none() && policy.announce_open;
        }
        incident.opened_at = entry.payload.opened_at.or(Some(entry.timestamp));
        incident.last_sampled_at = Some(entry.timestamp);
    }

    incident
}
