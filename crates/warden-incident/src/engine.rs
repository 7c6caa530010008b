//! Incident engine: the glue between trackers, the event log and the channel.
//!
//! One engine serves one resource kind. Observations taken in the same tick
//! are fed as a batch: every changed resource gets its log entry, resources
//! opening new messages are grouped by their grouping key into one send, and
//! resources continuing an existing thread are folded into one edit per
//! message.
//!
//! Nothing here is fatal. Store and channel failures are logged and the
//! tracker still advances; a message whose edit failed is treated as dead and
//! the next transition of its resources opens a fresh one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use warden_log::{EventLogStore, LogAction, LogEntry};
use warden_notify::NotificationChannel;
use warden_proto::{CorrelationId, ResourceKey};

use crate::error::Result;
use crate::observation::Observation;
use crate::policy::IncidentPolicy;
use crate::reconcile;
use crate::recovery;
use crate::render::MessageRenderer;
use crate::state::ResourceState;
use crate::tracker::{Incident, IncidentTracker, Transition};

/// How a pending transition reaches the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Delivery {
    /// Recorded in the log only.
    LogOnly,
    /// Part of a newly sent message.
    New,
    /// Folded into an edit of an existing message.
    Edit(CorrelationId),
}

#[derive(Debug)]
struct Pending<S> {
    obs: Observation<S>,
    transition: Transition,
    entry: LogEntry,
}

/// Drives the incidents of one resource kind.
pub struct IncidentEngine<S: ResourceState> {
    policy: IncidentPolicy,
    trackers: HashMap<ResourceKey, IncidentTracker<S>>,
    store: Arc<dyn EventLogStore>,
    channel: Arc<dyn NotificationChannel>,
    renderer: MessageRenderer,
}

impl<S: ResourceState> std::fmt::Debug for IncidentEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentEngine")
            .field("kind", &S::KIND)
            .field("policy", &self.policy)
            .field("tracked", &self.trackers.len())
            .field("channel", &self.channel.name())
            .finish_non_exhaustive()
    }
}

impl<S: ResourceState> IncidentEngine<S> {
    /// Creates an engine with no tracked resources.
    #[must_use]
    pub fn new(
        policy: IncidentPolicy,
        store: Arc<dyn EventLogStore>,
        channel: Arc<dyn NotificationChannel>,
        renderer: MessageRenderer,
    ) -> Self {
        Self {
            policy,
            trackers: HashMap::new(),
            store,
            channel,
            renderer,
        }
    }

    /// The policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &IncidentPolicy {
        &self.policy
    }

    /// Recovers the incident of `key` from the log unless it is already
    /// tracked. Calling it again has no effect.
    pub fn recover(&mut self, key: &ResourceKey) -> &Incident<S> {
        tracker_entry(&mut self.trackers, self.store.as_ref(), &self.policy, key).incident()
    }

    /// Recovers every resource of this kind the log knows about.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot list its resources.
    pub fn recover_all(&mut self) -> Result<usize> {
        let keys = self.store.resources(S::KIND)?;
        for key in &keys {
            self.recover(key);
        }
        debug!(kind = %S::KIND, resources = keys.len(), "Recovered incidents from event log");
        Ok(keys.len())
    }

    /// The tracked incident of `key`, if any.
    #[must_use]
    pub fn incident(&self, key: &ResourceKey) -> Option<&Incident<S>> {
        self.trackers.get(key).map(IncidentTracker::incident)
    }

    /// Every tracked incident, ordered by key.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Incident<S>> {
        let mut incidents: Vec<Incident<S>> = self
            .trackers
            .values()
            .map(|t| t.incident().clone())
            .collect();
        incidents.sort_by(|a, b| a.resource.cmp(&b.resource));
        incidents
    }

    /// Feeds a single observation.
    pub async fn observe(&mut self, obs: Observation<S>) -> Transition {
        self.observe_batch(vec![obs])
            .await
            .into_iter()
            .next()
            .map_or(Transition::Unchanged, |(_, t)| t)
    }

    /// Feeds observations taken in the same tick.
    ///
    /// If a key appears more than once only its last observation counts.
    pub async fn observe_batch(
        &mut self,
        observations: Vec<Observation<S>>,
    ) -> Vec<(ResourceKey, Transition)> {
        let mut outcomes = Vec::with_capacity(observations.len());
        let mut log_only = Vec::new();
        let mut fresh: Vec<(String, Vec<Pending<S>>)> = Vec::new();
        let mut edits: Vec<(CorrelationId, Vec<Pending<S>>)> = Vec::new();

        for obs in last_per_key(observations) {
            let tracker =
                tracker_entry(&mut self.trackers, self.store.as_ref(), &self.policy, &obs.resource);
            let transition = tracker.assess(&obs, &self.policy);
            outcomes.push((obs.resource.clone(), transition));

            let Some(action) = transition.action() else {
                continue;
            };
            let incident = tracker.incident();
            let (from, live, opened_at) = (
                incident.last_state,
                incident.correlation_id.clone(),
                incident.opened_at,
            );
            let delivery = self.delivery(transition, live);

            let mut payload = obs.payload();
            payload.opened_at = match transition {
                Transition::Open | Transition::Reopen => Some(obs.observed_at),
                _ => opened_at,
            };
            if transition == Transition::Resolve {
                payload.opened_at = self
                    .store
                    .latest(&obs.resource)
                    .ok()
                    .flatten()
                    .and_then(|e| e.payload.opened_at)
                    .or(opened_at);
                payload.duration_secs = payload
                    .opened_at
                    .map(|at| (obs.observed_at - at).num_seconds());
            }

            info!(
                resource = %obs.resource,
                from = %from,
                to = %obs.state,
                transition = %transition,
                "Incident transition"
            );

            let entry = LogEntry::new(obs.resource.clone(), obs.state.as_str(), action)
                .at(obs.observed_at)
                .with_payload(payload);
            let pending = Pending {
                obs,
                transition,
                entry,
            };

            match delivery {
                Delivery::LogOnly => log_only.push(pending),
                Delivery::New => {
                    let group = pending.obs.group_key().to_string();
                    match fresh.iter_mut().find(|(g, _)| *g == group) {
                        Some((_, items)) => items.push(pending),
                        None => fresh.push((group, vec![pending])),
                    }
                }
                Delivery::Edit(id) => match edits.iter_mut().find(|(e, _)| *e == id) {
                    Some((_, items)) => items.push(pending),
                    None => edits.push((id, vec![pending])),
                },
            }
        }

        if !log_only.is_empty() {
            self.append_all(&log_only, None);
            self.apply_all(&log_only, None);
        }
        for (id, items) in edits {
            self.deliver_edit(id, items).await;
        }
        for (_, items) in fresh {
            self.deliver_new(items).await;
        }

        outcomes
    }

    /// Feeds a full listing of the resources of this kind. Tracked resources
    /// absent from it are observed in the `missing` state.
    pub async fn reconcile(
        &mut self,
        listing: Vec<Observation<S>>,
        missing: S,
    ) -> Vec<(ResourceKey, Transition)> {
        let merged = reconcile::reconcile(&self.snapshot(), listing, missing, Utc::now());
        self.observe_batch(merged).await
    }

    /// Sends a standalone announcement for a nominal observation and records
    /// it. The resource is left nominal with no live message.
    pub async fn announce(&mut self, obs: Observation<S>) -> Option<CorrelationId> {
        let entry = LogEntry::new(obs.resource.clone(), obs.state.as_str(), LogAction::Announced)
            .at(obs.observed_at)
            .with_payload(obs.payload());
        let text = self.renderer.render::<S>(std::slice::from_ref(&entry));

        let delivered = match self.channel.send(&text).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(
                    resource = %obs.resource,
                    channel = self.channel.name(),
                    error = %e,
                    "Failed to send announcement"
                );
                None
            }
        };
        info!(resource = %obs.resource, state = %obs.state, "Announced");
        self.append(entry.with_correlation(delivered.clone()));

        let mut incident = Incident::nominal(obs.resource.clone());
        incident.last_state = obs.state;
        incident.label = obs.label;
        incident.group = obs.group;
        self.trackers
            .insert(obs.resource, IncidentTracker::from_incident(incident));
        delivered
    }

    fn delivery(&self, transition: Transition, live: Option<CorrelationId>) -> Delivery {
        match (transition, live) {
            (Transition::Resolve, None) => Delivery::New,
            (Transition::Open, _) | (_, None) => {
                if self.policy.announce_open {
                    Delivery::New
                } else {
                    Delivery::LogOnly
                }
            }
            (_, Some(id)) => Delivery::Edit(id),
        }
    }

    async fn deliver_new(&mut self, items: Vec<Pending<S>>) {
        let entries: Vec<LogEntry> = items.iter().map(|p| p.entry.clone()).collect();
        let text = self.renderer.render::<S>(&entries);

        let delivered = match self.channel.send(&text).await {
            Ok(id) => {
                debug!(id = %id, resources = items.len(), "Opened message");
                Some(id)
            }
            Err(e) => {
                warn!(
                    channel = self.channel.name(),
                    resources = items.len(),
                    error = %e,
                    "Failed to send notification"
                );
                None
            }
        };

        self.append_all(&items, delivered.clone());
        self.apply_all(&items, delivered);
    }

    async fn deliver_edit(&mut self, id: CorrelationId, items: Vec<Pending<S>>) {
        self.append_all(&items, Some(id.clone()));

        let thread = match self.store.all_for_correlation(&id) {
            Ok(thread) if !thread.is_empty() => thread,
            Ok(_) => correlated(&items, &id),
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to read message thread, rendering latest entries only");
                correlated(&items, &id)
            }
        };
        let text = self.renderer.render::<S>(&thread);

        let delivered = match self.channel.edit(&id, &text).await {
            Ok(()) => {
                debug!(id = %id, resources = items.len(), "Updated message");
                Some(id)
            }
            Err(e) => {
                warn!(
                    id = %id,
                    channel = self.channel.name(),
                    failure = ?e.edit_failure(),
                    error = %e,
                    "Failed to edit notification, next change opens a new message"
                );
                for tracker in self.trackers.values_mut() {
                    tracker.invalidate(&id);
                }
                None
            }
        };

        self.apply_all(&items, delivered);
    }

    fn append_all(&self, items: &[Pending<S>], id: Option<CorrelationId>) {
        for item in items {
            self.append(item.entry.clone().with_correlation(id.clone()));
        }
    }

    fn apply_all(&mut self, items: &[Pending<S>], delivered: Option<CorrelationId>) {
        for item in items {
            if let Some(tracker) = self.trackers.get_mut(&item.obs.resource) {
                tracker.apply(item.transition, &item.obs, &self.policy, delivered.clone());
            }
        }
    }

    fn append(&self, entry: LogEntry) {
        let resource = entry.resource.clone();
        if let Err(e) = self.store.append(entry) {
            warn!(resource = %resource, error = %e, "Failed to append to event log");
        }
    }
}

/// Rebuilds the text of a message from its log thread.
///
/// Returns `None` if nothing was logged under `id`.
///
/// # Errors
///
/// Returns an error if the log cannot be read.
pub fn render_thread(
    store: &dyn EventLogStore,
    renderer: &MessageRenderer,
    id: &CorrelationId,
) -> Result<Option<String>> {
    let thread = store.all_for_correlation(id)?;
    if thread.is_empty() {
        return Ok(None);
    }
    Ok(Some(renderer.render_any(&thread)))
}

fn tracker_entry<'a, S: ResourceState>(
    trackers: &'a mut HashMap<ResourceKey, IncidentTracker<S>>,
    store: &dyn EventLogStore,
    policy: &IncidentPolicy,
    key: &ResourceKey,
) -> &'a mut IncidentTracker<S> {
    trackers.entry(key.clone()).or_insert_with(|| {
        let latest = store.latest(key).unwrap_or_else(|e| {
            warn!(resource = %key, error = %e, "Failed to read event log, assuming nominal");
            None
        });
        let incident = recovery::seed(key.clone(), latest.as_ref(), policy, Utc::now());
        if incident.is_open() || incident.correlation_id.is_some() {
            info!(
                resource = %key,
                state = %incident.last_state,
                id = ?incident.correlation_id.as_ref().map(CorrelationId::as_str),
                "Recovered open incident"
            );
        }
        IncidentTracker::from_incident(incident)
    })
}

fn last_per_key<S: ResourceState>(observations: Vec<Observation<S>>) -> Vec<Observation<S>> {
    let mut kept: Vec<Observation<S>> = Vec::with_capacity(observations.len());
    for obs in observations {
        match kept.iter_mut().find(|o| o.resource == obs.resource) {
            Some(slot) => *slot = obs,
            None => kept.push(obs),
        }
    }
    kept
}

fn correlated<S>(items: &[Pending<S>], id: &CorrelationId) -> Vec<LogEntry> {
    items
        .iter()
        .map(|p| p.entry.clone().with_correlation(Some(id.clone())))
        .collect()
}
