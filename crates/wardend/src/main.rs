//! wardend - infrastructure health notifier
//!
//! Watches containers, network reachability, UPS power and the host
//! lifecycle, and keeps one chat message per incident up to date.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use warden_incident::MessageRenderer;
use warden_proto::{CorrelationId, ResourceKey};
use wardend::config::{DEFAULT_CONFIG_PATH, SAMPLE};
use wardend::{Daemon, WardenConfig, commands, daemon};

#[derive(Parser)]
#[command(name = "wardend")]
#[command(about = "Infrastructure health notifier")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the notifier
    Run {
        /// Path to config file
        #[arg(short, long, env = "WARDEN_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Log messages instead of sending them
        #[arg(long)]
        dry_run: bool,

        /// Log output format
        #[arg(long, value_enum, default_value = "text")]
        log_format: LogFormat,
    },

    /// Write a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,
    },

    /// Validate a config file and print the effective configuration
    CheckConfig {
        /// Path to config file
        #[arg(short, long, env = "WARDEN_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Print recent event log entries, newest first
    History {
        /// Path to config file
        #[arg(short, long, env = "WARDEN_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Only entries for this resource (e.g. container/web-1)
        #[arg(short, long)]
        resource: Option<String>,

        /// Maximum number of entries
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Print the message text rebuilt from the event log
    Render {
        /// Path to config file
        #[arg(short, long, env = "WARDEN_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Message handle as recorded in the log
        correlation_id: String,
    },
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("wardend=info".parse()?)
        .add_directive("warden=info".parse()?);

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            dry_run,
            log_format,
        } => {
            init_tracing(log_format)?;
            run(config, dry_run).await?;
        }

        Commands::InitConfig { output } => {
            init_config(&output)?;
        }

        Commands::CheckConfig { config } => {
            let config = load(&config)?;
            print!("{}", config.to_toml()?);
        }

        Commands::History {
            config,
            resource,
            limit,
        } => {
            let config = load(&config)?;
            let resource = resource
                .as_deref()
                .map(ResourceKey::parse)
                .transpose()
                .context("invalid --resource, expected KIND/NAME")?;
            let store = daemon::open_store(&config)?;
            for line in commands::history(store.as_ref(), resource, limit)? {
                println!("{line}");
            }
        }

        Commands::Render {
            config,
            correlation_id,
        } => {
            let config = load(&config)?;
            let id = CorrelationId::new(correlation_id)?;
            let store = daemon::open_store(&config)?;
            let renderer = MessageRenderer::new(config.deploy_name.clone());
            match commands::render(store.as_ref(), &renderer, &id)? {
                Some(text) => println!("{text}"),
                None => anyhow::bail!("no log entries for message {id}"),
            }
        }
    }

    Ok(())
}

fn load(path: &Path) -> anyhow::Result<WardenConfig> {
    WardenConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

async fn run(config_path: PathBuf, dry_run: bool) -> anyhow::Result<()> {
    info!(config = %config_path.display(), dry_run, "starting wardend");

    let config = load(&config_path)?;
    let daemon = Daemon::from_config(config, dry_run)?;

    let token = CancellationToken::new();
    let signals = tokio::spawn(cancel_on_signal(token.clone()));

    daemon.run(token).await;
    signals.abort();
    Ok(())
}

async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
                    _ = term.recv() => info!("received SIGTERM"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                info!("received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received interrupt");
    }

    token.cancel();
}

fn init_config(output: &Path) -> anyhow::Result<()> {
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(output, SAMPLE).with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote sample config to {}", output.display());
    Ok(())
}
