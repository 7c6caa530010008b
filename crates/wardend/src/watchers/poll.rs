//! Fixed-cadence polling of a single resource.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warden_incident::{ResourceState, StateClassifier, Transition};
use warden_proto::ResourceKey;

use super::SharedEngine;
use crate::backoff::{poll_delay, sleep_or_cancel};
use crate::error::ProbeError;
use crate::probes::Probe;

/// Samples one resource on a fixed interval and feeds the engine.
///
/// A failed probe produces no observation. The next attempt is delayed by
/// [`poll_delay`], so a broken probe backs off up to a minute.
pub struct PollWatcher<S: ResourceState> {
    key: ResourceKey,
    probe: Arc<dyn Probe>,
    classifier: StateClassifier<S>,
    engine: SharedEngine<S>,
    interval: Duration,
}

impl<S: ResourceState> PollWatcher<S> {
    /// Creates a watcher for `key`.
    #[must_use]
    pub fn new(
        key: ResourceKey,
        probe: Arc<dyn Probe>,
        classifier: StateClassifier<S>,
        engine: SharedEngine<S>,
        interval: Duration,
    ) -> Self {
        Self {
            key,
            probe,
            classifier,
            engine,
            interval,
        }
    }

    /// Resource this watcher samples.
    #[must_use]
    pub const fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Takes one sample and feeds it to the engine.
    pub async fn tick(&self) -> Result<Transition, ProbeError> {
        let raw = self.probe.sample().await?;
        let obs = self.classifier.observe(self.key.clone(), &raw, Utc::now());
        debug!(resource = %self.key, state = %obs.state, "Sampled");
        Ok(self.engine.lock().await.observe(obs).await)
    }

    /// Polls until cancelled. The iteration in flight when the token fires
    /// completes first.
    pub async fn run(self, token: CancellationToken) {
        {
            let mut engine = self.engine.lock().await;
            let incident = engine.recover(&self.key);
            info!(
                resource = %self.key,
                probe = self.probe.name(),
                state = %incident.last_state,
                live = incident.correlation_id.is_some(),
                "Starting poll watcher"
            );
        }

        let mut failures: u32 = 0;
        loop {
            match self.tick().await {
                Ok(_) => failures = 0,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!(
                        resource = %self.key,
                        probe = self.probe.name(),
                        failures,
                        error = %e,
                        "Probe failed"
                    );
                }
            }

            if !sleep_or_cancel(poll_delay(self.interval, failures), &token).await {
                break;
            }
        }

        info!(resource = %self.key, "Poll watcher stopped");
    }
}
