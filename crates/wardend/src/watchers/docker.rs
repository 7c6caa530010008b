//! Container watcher: event subscription plus periodic reconciliation.
//!
//! Events are fed as they arrive. Because a stream can silently miss events
//! (daemon restarts, dropped connections), a full listing is reconciled on
//! the poll interval and after every reconnect. Containers that disappear
//! from the listing are reported as removed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warden_incident::classifier::FIELD_NAME;
use warden_incident::{ContainerState, Observation, StateClassifier, Transition};
use warden_proto::{RawPayload, ResourceKey, ResourceKind};

use super::SharedEngine;
use crate::backoff::{Backoff, sleep_or_cancel};
use crate::error::ProbeError;
use crate::probes::{ContainerEvent, ContainerSource};

/// Watches every container known to the runtime.
pub struct DockerWatcher {
    source: Arc<dyn ContainerSource>,
    classifier: StateClassifier<ContainerState>,
    engine: SharedEngine<ContainerState>,
    poll_interval: Duration,
    reconnect: Backoff,
}

/// Containers are keyed by name, which survives re-creation by compose.
fn container_key(raw: &RawPayload) -> Option<ResourceKey> {
    raw.get(FIELD_NAME)
        .or_else(|| raw.get("id"))
        .map(|name| ResourceKey::new(ResourceKind::Container, name))
}

fn changed(outcomes: &[(ResourceKey, Transition)]) -> usize {
    outcomes
        .iter()
        .filter(|(_, t)| *t != Transition::Unchanged)
        .count()
}

impl DockerWatcher {
    /// Creates a watcher.
    #[must_use]
    pub fn new(
        source: Arc<dyn ContainerSource>,
        classifier: StateClassifier<ContainerState>,
        engine: SharedEngine<ContainerState>,
        poll_interval: Duration,
        reconnect: Backoff,
    ) -> Self {
        Self {
            source,
            classifier,
            engine,
            poll_interval,
            reconnect,
        }
    }

    fn observe(&self, raw: &RawPayload) -> Option<Observation<ContainerState>> {
        let key = container_key(raw)?;
        Some(self.classifier.observe(key, raw, Utc::now()))
    }

    /// Lists all containers and reconciles them against the tracked ones.
    ///
    /// The engine stays locked from the listing until it is applied, so an
    /// event handled meanwhile can never be overwritten by an older listing.
    ///
    /// Returns the number of resources that changed.
    pub async fn scan(&self) -> Result<usize, ProbeError> {
        let mut engine = self.engine.lock().await;
        let listing: Vec<_> = self
            .source
            .list()
            .await?
            .iter()
            .filter_map(|raw| self.observe(raw))
            .collect();
        debug!(containers = listing.len(), "Reconciling container listing");

        let outcomes = engine.reconcile(listing, ContainerState::Removed).await;
        Ok(changed(&outcomes))
    }

    /// Handles one lifecycle event by looking the container up again.
    ///
    /// A container that no longer exists is reported as removed under its
    /// last known name. Events for unnamed, vanished containers are dropped.
    pub async fn handle_event(&self, event: &ContainerEvent) -> Result<Transition, ProbeError> {
        debug!(container = %event.id, action = %event.action, "Container event");

        let mut engine = self.engine.lock().await;
        let obs = match self.source.container(&event.id).await? {
            Some(raw) => self.observe(&raw),
            None => None,
        };

        let obs = match obs {
            Some(obs) => obs,
            None => {
                let Some(name) = event.name.as_deref() else {
                    return Ok(Transition::Unchanged);
                };
                let key = ResourceKey::new(ResourceKind::Container, name);
                let known = engine.recover(&key);
                let mut obs = Observation::new(key, ContainerState::Removed).at(Utc::now());
                obs.label.clone_from(&known.label);
                obs.group.clone_from(&known.group);
                obs
            }
        };
        Ok(engine.observe(obs).await)
    }

    async fn subscribe(&self, token: &CancellationToken) {
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                if let Err(e) = self.scan().await {
                    warn!(error = %e, "Container scan after reconnect failed");
                }
            }

            let mut events = self.source.events();
            loop {
                let next = tokio::select! {
                    () = token.cancelled() => return,
                    next = events.next() => next,
                };
                match next {
                    Some(Ok(event)) => {
                        attempt = 0;
                        if let Err(e) = self.handle_event(&event).await {
                            warn!(container = %event.id, error = %e, "Failed to handle container event");
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Container event stream failed");
                        break;
                    }
                    None => {
                        warn!("Container event stream ended");
                        break;
                    }
                }
            }
            drop(events);

            attempt = attempt.saturating_add(1);
            let delay = self.reconnect.delay_for_attempt(attempt);
            info!(attempt, delay = ?delay, "Reconnecting to container events");
            if !sleep_or_cancel(delay, token).await {
                return;
            }
        }
    }

    async fn reconcile_loop(&self, token: &CancellationToken) {
        while sleep_or_cancel(self.poll_interval, token).await {
            if let Err(e) = self.scan().await {
                warn!(error = %e, "Container scan failed");
            }
        }
    }

    /// Recovers every container ever logged, reconciles once, then follows
    /// events and reconciles periodically until cancelled.
    pub async fn run(self, token: CancellationToken) {
        match self.engine.lock().await.recover_all() {
            Ok(count) => info!(containers = count, "Recovered container incidents"),
            Err(e) => warn!(error = %e, "Failed to recover container incidents"),
        }

        match self.scan().await {
            Ok(changed) => info!(changed, "Initial container scan complete"),
            Err(e) => warn!(error = %e, "Initial container scan failed"),
        }

        tokio::join!(self.subscribe(&token), self.reconcile_loop(&token));
        info!("Container watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_prefers_name_over_id() {
        let raw = RawPayload::with_status("running")
            .field(FIELD_NAME, "web-1")
            .field("id", "abc");
        assert_eq!(
            container_key(&raw),
            Some(ResourceKey::new(ResourceKind::Container, "web-1"))
        );

        let raw = RawPayload::with_status("running").field("id", "abc");
        assert_eq!(
            container_key(&raw),
            Some(ResourceKey::new(ResourceKind::Container, "abc"))
        );

        assert!(container_key(&RawPayload::absent()).is_none());
    }
}
