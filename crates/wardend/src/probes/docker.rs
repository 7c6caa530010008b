//! Container probe using the Docker Engine API via bollard.

use std::collections::HashMap;

use bollard::Docker;
use bollard::container::ListContainersOptions;
use bollard::models::{ContainerSummary, EventMessage};
use bollard::system::EventsOptions;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tracing::debug;
use warden_incident::classifier::FIELD_NAME;
use warden_proto::RawPayload;

use crate::error::ProbeError;

/// Prefix of raw fields carrying container labels.
pub const LABEL_PREFIX: &str = "label.";

/// Container event actions that can change the reported state.
pub const WATCHED_ACTIONS: &[&str] = &[
    "start", "restart", "die", "stop", "kill", "oom", "pause", "unpause", "destroy",
];

/// A container lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEvent {
    /// Container id.
    pub id: String,
    /// Container name, when the runtime reported it.
    pub name: Option<String>,
    /// Event action (`start`, `die`, ...).
    pub action: String,
}

/// Source of container listings and lifecycle events.
pub trait ContainerSource: Send + Sync {
    /// Lists every container, running or not.
    fn list(&self) -> BoxFuture<'_, Result<Vec<RawPayload>, ProbeError>>;

    /// Looks up one container. `None` if it no longer exists.
    fn container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<RawPayload>, ProbeError>>;

    /// Subscribes to lifecycle events. The stream ends or errors when the
    /// connection to the runtime drops.
    fn events(&self) -> BoxStream<'_, Result<ContainerEvent, ProbeError>>;
}

/// Display name for a container: first name without the leading `/`, else
/// the short id.
#[must_use]
pub fn display_name(names: Option<&[String]>, id: &str) -> String {
    names
        .and_then(|n| n.first())
        .map(|n| n.trim_start_matches('/'))
        .filter(|n| !n.is_empty())
        .map_or_else(|| id.chars().take(12).collect(), str::to_string)
}

/// Converts a listing entry into a raw payload.
#[must_use]
pub fn summary_payload(summary: &ContainerSummary) -> RawPayload {
    let id = summary.id.clone().unwrap_or_default();
    let mut raw = RawPayload {
        status: summary.state.clone(),
        ..RawPayload::default()
    }
    .field(FIELD_NAME, display_name(summary.names.as_deref(), &id))
    .field("id", id);

    if let Some(image) = &summary.image {
        raw = raw.field("image", image.clone());
    }
    if let Some(labels) = &summary.labels {
        for (key, value) in labels {
            raw = raw.field(format!("{LABEL_PREFIX}{key}"), value.clone());
        }
    }
    raw
}

fn event_from_message(message: EventMessage) -> Option<ContainerEvent> {
    let action = message.action?;
    let actor = message.actor?;
    let id = actor.id?;
    let name = actor
        .attributes
        .and_then(|mut attrs| attrs.remove("name"));
    Some(ContainerEvent { id, name, action })
}

/// Docker-backed container source.
#[derive(Debug, Clone)]
pub struct DockerSource {
    docker: Docker,
}

impl DockerSource {
    /// Connects using the local defaults (`DOCKER_HOST` or the unix socket).
    pub fn connect() -> Result<Self, ProbeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ProbeError::Unavailable(format!("failed to connect to Docker: {e}")))?;
        Ok(Self { docker })
    }

    async fn list_filtered(
        &self,
        filters: HashMap<String, Vec<String>>,
    ) -> Result<Vec<RawPayload>, ProbeError> {
        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| ProbeError::Unavailable(format!("failed to list containers: {e}")))?;
        Ok(containers.iter().map(summary_payload).collect())
    }
}

impl ContainerSource for DockerSource {
    fn list(&self) -> BoxFuture<'_, Result<Vec<RawPayload>, ProbeError>> {
        Box::pin(self.list_filtered(HashMap::new()))
    }

    fn container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<RawPayload>, ProbeError>> {
        Box::pin(async move {
            let mut filters = HashMap::new();
            filters.insert("id".to_string(), vec![id.to_string()]);
            let found = self.list_filtered(filters).await?;
            Ok(found
                .into_iter()
                .find(|raw| raw.get("id").is_some_and(|full| full.starts_with(id))))
        })
    }

    fn events(&self) -> BoxStream<'_, Result<ContainerEvent, ProbeError>> {
        let mut filters = HashMap::new();
        filters.insert("type".to_string(), vec!["container".to_string()]);
        filters.insert(
            "event".to_string(),
            WATCHED_ACTIONS.iter().map(|a| (*a).to_string()).collect(),
        );
        let options = EventsOptions::<String> {
            filters,
            ..Default::default()
        };

        self.docker
            .events(Some(options))
            .filter_map(|message| async move {
                match message {
                    Ok(message) => {
                        let event = event_from_message(message);
                        if event.is_none() {
                            debug!("Ignoring container event without actor");
                        }
                        event.map(Ok)
                    }
                    Err(e) => Some(Err(ProbeError::Stream(e.to_string()))),
                }
            })
            .boxed()
    }
}
