//! Host lifecycle: startup and shutdown of the notifier itself.

use chrono::Utc;
use tracing::info;
use warden_incident::classifier::FIELD_NAME;
use warden_incident::{Observation, StateClassifier, SystemState, Transition};
use warden_proto::{CorrelationId, RawPayload, ResourceKey, ResourceKind};

use super::SharedEngine;

/// What startup reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Startup {
    /// No open shutdown incident; a standalone message was sent.
    Announced(Option<CorrelationId>),
    /// A recovered shutdown incident was closed.
    Resumed(Transition),
}

/// Reports the host going down and coming back.
pub struct SystemWatcher {
    key: ResourceKey,
    label: String,
    classifier: StateClassifier<SystemState>,
    engine: SharedEngine<SystemState>,
}

impl SystemWatcher {
    /// Creates a watcher displaying the host as `label`.
    #[must_use]
    pub fn new(engine: SharedEngine<SystemState>, label: impl Into<String>) -> Self {
        Self {
            key: ResourceKey::singleton(ResourceKind::System),
            label: label.into(),
            classifier: StateClassifier::system(),
            engine,
        }
    }

    fn observation(&self, status: &str) -> Observation<SystemState> {
        let raw = RawPayload::with_status(status).field(FIELD_NAME, self.label.clone());
        self.classifier.observe(self.key.clone(), &raw, Utc::now())
    }

    /// Reports startup.
    ///
    /// If the log shows the host went down, that incident's message is
    /// edited to "back up and running". Otherwise (first start, or the last
    /// run crashed without logging a shutdown) an announcement is sent.
    pub async fn startup(&self) -> Startup {
        let up = self.observation("up");
        let mut engine = self.engine.lock().await;

        if engine.recover(&self.key).is_open() {
            let transition = engine.observe(up).await;
            info!(host = %self.label, transition = %transition, "Host back up");
            Startup::Resumed(transition)
        } else {
            let id = engine.announce(up).await;
            info!(host = %self.label, announced = id.is_some(), "Host up");
            Startup::Announced(id)
        }
    }

    /// Reports shutdown. Call after the other watchers have stopped.
    pub async fn shutdown(&self) -> Transition {
        let down = self.observation("down");
        let transition = self.engine.lock().await.observe(down).await;
        info!(host = %self.label, transition = %transition, "Host shutting down");
        transition
    }
}
