//! Daemon wiring: builds the store, channel and watchers from configuration
//! and runs them until cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use warden_incident::{
    ContainerState, IncidentEngine, IncidentPolicy, MessageRenderer, NetworkState, ResourceState,
    StateClassifier, SystemState, UpsState,
};
use warden_log::{EventLogStore, FileEventLogStore};
use warden_notify::{LogChannel, NotificationChannel, TelegramChannel};
use warden_proto::{ResourceKey, ResourceKind};

use crate::backoff::Backoff;
use crate::config::WardenConfig;
use crate::error::Result;
use crate::probes::{DnsProbe, DockerSource, UpsProbe};
use crate::watchers::{DockerWatcher, PollWatcher, SharedEngine, SystemWatcher, shared};

/// Opens the event log in the configured state directory.
pub fn open_store(config: &WardenConfig) -> Result<Arc<dyn EventLogStore>> {
    let store_config = config.log.store_config(config.state_dir.clone());
    Ok(Arc::new(FileEventLogStore::open(store_config)?))
}

/// Host name shown in lifecycle messages.
#[must_use]
pub fn host_label() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// The running notifier.
pub struct Daemon {
    config: WardenConfig,
    store: Arc<dyn EventLogStore>,
    channel: Arc<dyn NotificationChannel>,
    renderer: MessageRenderer,
    host: String,
}

impl Daemon {
    /// Builds a daemon from configuration.
    ///
    /// Messages go to Telegram when configured, or to the log when
    /// `dry_run` is set or no `[telegram]` section exists.
    pub fn from_config(config: WardenConfig, dry_run: bool) -> Result<Self> {
        let store = open_store(&config)?;
        let channel: Arc<dyn NotificationChannel> = match &config.telegram {
            Some(telegram) if !dry_run => {
                Arc::new(TelegramChannel::new(telegram.to_channel_config())?)
            }
            _ => Arc::new(LogChannel::new("dry-run")),
        };
        Ok(Self::with_parts(config, store, channel))
    }

    /// Builds a daemon around an existing store and channel.
    #[must_use]
    pub fn with_parts(
        config: WardenConfig,
        store: Arc<dyn EventLogStore>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        let renderer = MessageRenderer::new(config.deploy_name.clone());
        Self {
            config,
            store,
            channel,
            renderer,
            host: host_label(),
        }
    }

    /// Overrides the host name shown in lifecycle messages.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &WardenConfig {
        &self.config
    }

    fn engine<S: ResourceState>(&self, policy: IncidentPolicy) -> SharedEngine<S> {
        shared(IncidentEngine::new(
            policy,
            Arc::clone(&self.store),
            Arc::clone(&self.channel),
            self.renderer.clone(),
        ))
    }

    fn spawn_watchers(&self, tasks: &mut JoinSet<()>, token: &CancellationToken) {
        let stale_after = self.config.stale_after();

        if self.config.docker.enabled {
            let docker = &self.config.docker;
            match DockerSource::connect() {
                Ok(source) => {
                    let watcher = DockerWatcher::new(
                        Arc::new(source),
                        StateClassifier::containers(&docker.group_label),
                        self.engine::<ContainerState>(
                            IncidentPolicy::container().with_stale_after(stale_after),
                        ),
                        Duration::from_secs(docker.poll_interval_secs),
                        Backoff::new(
                            Duration::from_secs(docker.reconnect_initial_secs),
                            Duration::from_secs(docker.reconnect_max_secs),
                        ),
                    );
                    tasks.spawn(watcher.run(token.clone()));
                }
                Err(e) => warn!(error = %e, "Docker unavailable, container watcher disabled"),
            }
        }

        if self.config.network.enabled {
            let network = &self.config.network;
            let watcher = PollWatcher::new(
                ResourceKey::singleton(ResourceKind::Network),
                Arc::new(DnsProbe::new(
                    network.probe_host.clone(),
                    network.probe_port,
                    Duration::from_secs(network.timeout_secs),
                )),
                StateClassifier::network(),
                self.engine::<NetworkState>(IncidentPolicy::network().with_stale_after(stale_after)),
                Duration::from_secs(network.interval_secs),
            );
            tasks.spawn(watcher.run(token.clone()));
        }

        if self.config.ups.enabled {
            let ups = &self.config.ups;
            let Some(refresh) = ups.refresh() else {
                warn!(refresh_secs = ups.refresh_secs, "UPS refresh out of range, UPS watcher disabled");
                return;
            };
            let watcher = PollWatcher::new(
                ResourceKey::new(ResourceKind::Ups, ups.name.clone()),
                Arc::new(UpsProbe::new(
                    ups.command.clone(),
                    ups.name.clone(),
                    Duration::from_secs(ups.timeout_secs),
                )),
                StateClassifier::ups(ups.low_charge_percent),
                self.engine::<UpsState>(IncidentPolicy::ups(refresh).with_stale_after(stale_after)),
                Duration::from_secs(ups.interval_secs),
            );
            tasks.spawn(watcher.run(token.clone()));
        }
    }

    /// Runs until `token` is cancelled.
    ///
    /// Startup is reported before any watcher starts. On cancellation every
    /// watcher finishes its current iteration, then shutdown is reported.
    pub async fn run(self, token: CancellationToken) {
        info!(
            deploy = %self.config.deploy_name,
            channel = self.channel.name(),
            state_dir = %self.config.state_dir.display(),
            "Starting warden"
        );

        let system = self.config.system.enabled.then(|| {
            SystemWatcher::new(
                self.engine::<SystemState>(IncidentPolicy::system()),
                self.host.clone(),
            )
        });
        if let Some(system) = &system {
            system.startup().await;
        }

        let mut tasks = JoinSet::new();
        self.spawn_watchers(&mut tasks, &token);
        if tasks.is_empty() {
            warn!("No watchers enabled");
        }

        token.cancelled().await;
        info!(watchers = tasks.len(), "Shutdown requested, waiting for watchers");

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Watcher task failed");
            }
        }

        if let Some(system) = &system {
            system.shutdown().await;
        }
        info!("Warden stopped");
    }
}
