//! Per-resource incident state machine.
//!
//! [`IncidentTracker::assess`] is pure: it decides what an observation means
//! for the resource's incident without side effects. The engine performs the
//! resulting log append and message delivery, then feeds the outcome back
//! through [`IncidentTracker::apply`].

use std::fmt;

use chrono::{DateTime, Utc};
use warden_log::LogAction;
use warden_proto::{CorrelationId, ResourceKey};

use crate::observation::Observation;
use crate::policy::IncidentPolicy;
use crate::state::ResourceState;

/// What an observation does to a resource's incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Same state as before; nothing to record.
    Unchanged,
    /// Same problem state, due for a periodic sample of the open message.
    Refresh,
    /// Same problem state whose last message never reached the channel.
    Retry,
    /// Nominal → problem: a new incident and a new message.
    Open,
    /// Problem → different problem: same incident, same message.
    Escalate,
    /// Nominal → problem while a lingering thread is still live: continue it.
    Reopen,
    /// Problem → nominal.
    Resolve,
    /// Nominal with a lingering thread whose saturation condition was reached.
    Saturate,
}

impl Transition {
    /// The log action recorded for this transition.
    #[must_use]
    pub const fn action(self) -> Option<LogAction> {
        match self {
            Self::Unchanged => None,
            Self::Refresh => Some(LogAction::Sampled),
            Self::Open | Self::Reopen | Self::Retry => Some(LogAction::Opened),
            Self::Escalate => Some(LogAction::Updated),
            Self::Resolve => Some(LogAction::Resolved),
            Self::Saturate => Some(LogAction::Saturated),
        }
    }

    /// Returns the transition name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Refresh => "refresh",
            Self::Retry => "retry",
            Self::Open => "open",
            Self::Escalate => "escalate",
            Self::Reopen => "reopen",
            Self::Resolve => "resolve",
            Self::Saturate => "saturate",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached incident state of one resource.
///
/// The event log is the source of truth; this is what recovery rebuilds.
#[derive(Debug, Clone, PartialEq)]
pub struct Incident<S> {
    /// The resource.
    pub resource: ResourceKey,
    /// Current canonical state.
    pub last_state: S,
    /// Handle of the live message, if any.
    pub correlation_id: Option<CorrelationId>,
    /// When the current (or last) incident opened.
    pub opened_at: Option<DateTime<Utc>>,
    /// When the last incident closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// When the open message was last sampled.
    pub last_sampled_at: Option<DateTime<Utc>>,
    /// Last known display label.
    pub label: Option<String>,
    /// Last known grouping key.
    pub group: Option<String>,
    /// The open incident has no message because delivery failed.
    pub undelivered: bool,
}

impl<S: ResourceState> Incident<S> {
    /// A nominal resource with no history.
    #[must_use]
    pub fn nominal(resource: ResourceKey) -> Self {
        Self {
            resource,
            last_state: S::NOMINAL,
            correlation_id: None,
            opened_at: None,
            closed_at: None,
            last_sampled_at: None,
            label: None,
            group: None,
            undelivered: false,
        }
    }

    /// Returns true while the resource is in a problem state.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.last_state.is_nominal()
    }
}

/// State machine for one resource key.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentTracker<S> {
    incident: Incident<S>,
}

impl<S: ResourceState> IncidentTracker<S> {
    /// Tracker for a resource with no history.
    #[must_use]
    pub fn new(resource: ResourceKey) -> Self {
        Self {
            incident: Incident::nominal(resource),
        }
    }

    /// Tracker seeded with a recovered incident.
    #[must_use]
    pub const fn from_incident(incident: Incident<S>) -> Self {
        Self { incident }
    }

    /// The cached incident.
    #[must_use]
    pub const fn incident(&self) -> &Incident<S> {
        &self.incident
    }

    /// Current canonical state.
    #[must_use]
    pub fn state(&self) -> S {
        self.incident.last_state
    }

    /// Handle of the live message, if any.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.incident.correlation_id.as_ref()
    }

    /// Decides what `obs` means for this resource.
    #[must_use]
    pub fn assess(&self, obs: &Observation<S>, policy: &IncidentPolicy) -> Transition {
        let last = self.incident.last_state;
        let live = self.incident.correlation_id.is_some();
        let saturated = policy
            .saturation
            .as_ref()
            .is_some_and(|s| s.reached(&obs.metrics));

        if obs.state == last {
            if last.is_nominal() {
                return if live && saturated {
                    Transition::Saturate
                } else {
                    Transition::Unchanged
                };
            }
            if !live && self.incident.undelivered && policy.announce_open {
                return Transition::Retry;
            }
            let due = policy.refresh_every.is_some_and(|every| {
                self.incident
                    .last_sampled_at
                    .is_none_or(|at| obs.observed_at - at >= every)
            });
            return if live && due {
                Transition::Refresh
            } else {
                Transition::Unchanged
            };
        }

        if last.is_nominal() {
            if live && !saturated {
                Transition::Reopen
            } else {
                Transition::Open
            }
        } else if obs.state.is_nominal() {
            Transition::Resolve
        } else {
            Transition::Escalate
        }
    }

    /// Applies a transition.
    ///
    /// `delivered` is the handle of the message that now represents the
    /// incident: the existing one after a successful edit, a new one after a
    /// send, or `None` when nothing was delivered.
    pub fn apply(
        &mut self,
        transition: Transition,
        obs: &Observation<S>,
        policy: &IncidentPolicy,
        delivered: Option<CorrelationId>,
    ) {
        if transition == Transition::Unchanged {
            return;
        }

        let at = obs.observed_at;
        let incident = &mut self.incident;
        if obs.label.is_some() {
            incident.label.clone_from(&obs.label);
        }
        if obs.group.is_some() {
            incident.group.clone_from(&obs.group);
        }

        match transition {
            Transition::Unchanged => {}
            Transition::Open | Transition::Reopen => {
                incident.opened_at = Some(at);
                incident.closed_at = None;
                incident.last_sampled_at = Some(at);
                incident.undelivered = delivered.is_none() && policy.announce_open;
                incident.correlation_id = delivered;
            }
            Transition::Escalate | Transition::Refresh | Transition::Retry => {
                incident.last_sampled_at = Some(at);
                incident.undelivered = delivered.is_none() && policy.announce_open;
                incident.correlation_id = delivered;
            }
            Transition::Resolve => {
                incident.closed_at = Some(at);
                incident.undelivered = false;
                incident.correlation_id = delivered.filter(|_| policy.holds_until_saturated());
            }
            Transition::Saturate => {
                incident.undelivered = false;
                incident.correlation_id = None;
            }
        }
        incident.last_state = obs.state;
    }

    /// Forgets the live message if it is `id`. Returns true if it was.
    ///
    /// An open incident that loses its message is sent again on the next
    /// sample.
    pub fn invalidate(&mut self, id: &CorrelationId) -> bool {
        if self.incident.correlation_id.as_ref() == Some(id) {
            self.incident.correlation_id = None;
            self.incident.undelivered = self.incident.is_open();
            true
        } else {
            false
        }
    }
}
