//! Daemon configuration.
//!
//! Configuration for the warden daemon, including:
//! - Deployment naming, event log location and retention
//! - Telegram delivery settings
//! - Per-watcher settings (Docker, network, UPS, host lifecycle)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_log::FileEventLogStoreConfig;
use warden_notify::TelegramConfig;

use crate::error::DaemonError;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/warden/config.toml";

/// Commented sample written by `wardend init-config`.
pub const SAMPLE: &str = r#"# warden configuration

# Shown in the header of every message.
deploy_name = "production"

# Directory holding the event log.
state_dir = "/var/lib/warden"

# Message handles older than this are not reused after a restart (0 = never stale).
stale_after_secs = 86400

# Event log segments rotate at this size; the oldest are deleted beyond max_files.
[log]
max_file_size_mb = 10
max_files = 20

# Remove this section to run with the log channel only.
[telegram]
bot_token = "123456:replace-me"
chat_ids = [123456789]
# api_url = "https://api.telegram.org"
# timeout_secs = 10

[docker]
enabled = true
poll_interval_secs = 10
reconnect_initial_secs = 3
reconnect_max_secs = 30
group_label = "com.docker.compose.project"

[network]
enabled = true
interval_secs = 5
probe_host = "google.com"
probe_port = 443
timeout_secs = 5

[ups]
enabled = false
name = "ups@localhost"
command = "upsc"
interval_secs = 5
timeout_secs = 10
low_charge_percent = 20.0
refresh_secs = 60

[system]
enabled = true
"#;

/// Telegram delivery settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelegramSection {
    /// Bot token.
    pub bot_token: String,
    /// Chats every message is delivered to.
    pub chat_ids: Vec<i64>,
    /// Bot API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_telegram_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

const fn default_telegram_timeout() -> u64 {
    10
}

impl std::fmt::Debug for TelegramSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSection")
            .field("bot_token", &"<redacted>")
            .field("chat_ids", &self.chat_ids)
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl TelegramSection {
    /// Builds the channel configuration.
    #[must_use]
    pub fn to_channel_config(&self) -> TelegramConfig {
        TelegramConfig::new(self.bot_token.clone(), self.chat_ids.clone())
            .with_api_url(self.api_url.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Container watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DockerConfig {
    /// Whether to watch containers.
    pub enabled: bool,
    /// Full-listing reconciliation interval in seconds.
    pub poll_interval_secs: u64,
    /// First reconnect delay after the event stream drops.
    pub reconnect_initial_secs: u64,
    /// Reconnect delay cap.
    pub reconnect_max_secs: u64,
    /// Container label used to group messages.
    pub group_label: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 10,
            reconnect_initial_secs: 3,
            reconnect_max_secs: 30,
            group_label: "com.docker.compose.project".to_string(),
        }
    }
}

/// Reachability watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Whether to probe reachability.
    pub enabled: bool,
    /// Probe interval in seconds.
    pub interval_secs: u64,
    /// Host resolved by the probe.
    pub probe_host: String,
    /// Port paired with the host for resolution.
    pub probe_port: u16,
    /// Probe timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            probe_host: "google.com".to_string(),
            probe_port: 443,
            timeout_secs: 5,
        }
    }
}

/// UPS watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpsConfig {
    /// Whether to query the UPS.
    pub enabled: bool,
    /// NUT device name, e.g. `ups@localhost`.
    pub name: String,
    /// Query command.
    pub command: String,
    /// Poll interval in seconds.
    pub interval_secs: u64,
    /// Query timeout in seconds.
    pub timeout_secs: u64,
    /// On-battery charge at or below this is reported as low.
    pub low_charge_percent: f64,
    /// Message refresh cadence while on battery.
    pub refresh_secs: u64,
}

impl UpsConfig {
    /// Refresh cadence, `None` if out of range.
    #[must_use]
    pub fn refresh(&self) -> Option<chrono::Duration> {
        seconds(self.refresh_secs)
    }
}

impl Default for UpsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: String::new(),
            command: "upsc".to_string(),
            interval_secs: 5,
            timeout_secs: 10,
            low_charge_percent: 20.0,
            refresh_secs: 60,
        }
    }
}

/// Event log retention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Segment size in MiB before rotation.
    pub max_file_size_mb: u64,
    /// Segments kept on disk, the active one included.
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            max_files: 20,
        }
    }
}

impl LogConfig {
    /// Segment size in bytes, `None` on overflow.
    #[must_use]
    pub const fn max_file_size(&self) -> Option<u64> {
        self.max_file_size_mb.checked_mul(1024 * 1024)
    }

    /// File store settings for `base_dir`.
    #[must_use]
    pub fn store_config(&self, base_dir: impl Into<PathBuf>) -> FileEventLogStoreConfig {
        let config = FileEventLogStoreConfig::new(base_dir).with_max_files(self.max_files);
        match self.max_file_size() {
            Some(size) => config.with_max_file_size(size),
            None => config,
        }
    }
}

/// Host lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SystemConfig {
    /// Whether to report startup and shutdown.
    pub enabled: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Main daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WardenConfig {
    /// Deployment name shown in every message.
    pub deploy_name: String,
    /// Event log directory.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Recovery grace window in seconds. Zero disables staleness.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    /// Event log retention.
    #[serde(default)]
    pub log: LogConfig,
    /// Telegram delivery. Absent means log-only.
    #[serde(default)]
    pub telegram: Option<TelegramSection>,
    /// Container watcher.
    #[serde(default)]
    pub docker: DockerConfig,
    /// Reachability watcher.
    #[serde(default)]
    pub network: NetworkConfig,
    /// UPS watcher.
    #[serde(default)]
    pub ups: UpsConfig,
    /// Host lifecycle.
    #[serde(default)]
    pub system: SystemConfig,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/warden")
}

const fn default_stale_after() -> u64 {
    86_400
}

/// Converts whole seconds, `None` beyond what a time delta can hold.
fn seconds(secs: u64) -> Option<chrono::Duration> {
    i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds)
}

impl WardenConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DaemonError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DaemonError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, DaemonError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| DaemonError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Renders the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, DaemonError> {
        toml::to_string_pretty(self)
            .map_err(|e| DaemonError::Config(format!("failed to serialize config: {e}")))
    }

    /// Recovery grace window, `None` when disabled.
    #[must_use]
    pub fn stale_after(&self) -> Option<chrono::Duration> {
        if self.stale_after_secs == 0 {
            return None;
        }
        seconds(self.stale_after_secs)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), DaemonError> {
        if self.deploy_name.trim().is_empty() {
            return Err(DaemonError::Config(
                "deploy_name cannot be empty".to_string(),
            ));
        }

        if self.state_dir.as_os_str().is_empty() {
            return Err(DaemonError::Config("state_dir cannot be empty".to_string()));
        }

        if seconds(self.stale_after_secs).is_none() {
            return Err(DaemonError::Config(
                "stale_after_secs is out of range".to_string(),
            ));
        }

        if self.log.max_files == 0 {
            return Err(DaemonError::Config(
                "log.max_files must be greater than 0".to_string(),
            ));
        }
        if !matches!(self.log.max_file_size(), Some(size) if size > 0) {
            return Err(DaemonError::Config(
                "log.max_file_size_mb must be between 1 and 17592186044415".to_string(),
            ));
        }

        if let Some(telegram) = &self.telegram {
            if telegram.bot_token.trim().is_empty() {
                return Err(DaemonError::Config(
                    "telegram.bot_token cannot be empty".to_string(),
                ));
            }
            if telegram.chat_ids.is_empty() {
                return Err(DaemonError::Config(
                    "telegram.chat_ids must list at least one chat".to_string(),
                ));
            }
            if !telegram.api_url.starts_with("http://") && !telegram.api_url.starts_with("https://")
            {
                return Err(DaemonError::Config(
                    "telegram.api_url must start with http:// or https://".to_string(),
                ));
            }
        }

        if self.docker.enabled {
            if self.docker.poll_interval_secs == 0 {
                return Err(DaemonError::Config(
                    "docker.poll_interval_secs must be greater than 0".to_string(),
                ));
            }
            if self.docker.reconnect_initial_secs == 0
                || self.docker.reconnect_max_secs < self.docker.reconnect_initial_secs
            {
                return Err(DaemonError::Config(
                    "docker reconnect delays must satisfy 0 < initial <= max".to_string(),
                ));
            }
        }

        if self.network.enabled {
            if self.network.interval_secs == 0 || self.network.timeout_secs == 0 {
                return Err(DaemonError::Config(
                    "network.interval_secs and network.timeout_secs must be greater than 0"
                        .to_string(),
                ));
            }
            if self.network.probe_host.trim().is_empty() {
                return Err(DaemonError::Config(
                    "network.probe_host cannot be empty".to_string(),
                ));
            }
        }

        if self.ups.enabled {
            if self.ups.name.trim().is_empty() {
                return Err(DaemonError::Config(
                    "ups.name is required when the UPS watcher is enabled".to_string(),
                ));
            }
            if self.ups.command.trim().is_empty() {
                return Err(DaemonError::Config("ups.command cannot be empty".to_string()));
            }
            if self.ups.interval_secs == 0 || self.ups.timeout_secs == 0 {
                return Err(DaemonError::Config(
                    "ups.interval_secs and ups.timeout_secs must be greater than 0".to_string(),
                ));
            }
            if self.ups.refresh().is_none() {
                return Err(DaemonError::Config(
                    "ups.refresh_secs is out of range".to_string(),
                ));
            }
            if !(0.0..=100.0).contains(&self.ups.low_charge_percent) {
                return Err(DaemonError::Config(
                    "ups.low_charge_percent must be between 0 and 100".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use test_case::test_case;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("failed to write temp file");
        file
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = WardenConfig::from_toml(r#"deploy_name = "prod""#)
            .expect("should parse minimal config");

        assert_eq!(config.deploy_name, "prod");
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/warden"));
        assert_eq!(config.stale_after_secs, 86_400);
        assert!(config.telegram.is_none());
        assert!(config.docker.enabled);
        assert_eq!(config.docker.poll_interval_secs, 10);
        assert_eq!(config.network.probe_host, "google.com");
        assert!(!config.ups.enabled);
        assert!(config.system.enabled);
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = WardenConfig::from_toml(SAMPLE).expect("sample should parse");
        assert_eq!(config.deploy_name, "production");
        let telegram = config.telegram.expect("telegram section");
        assert_eq!(telegram.chat_ids, vec![123_456_789]);
        assert_eq!(telegram.api_url, "https://api.telegram.org");
    }

    #[test]
    fn test_effective_config_roundtrips() {
        let config = WardenConfig::from_toml(SAMPLE).expect("sample should parse");
        let rendered = config.to_toml().expect("serialize");
        let reparsed = WardenConfig::from_toml(&rendered).expect("reparse");
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_missing_deploy_name_fails() {
        let result = WardenConfig::from_toml("state_dir = \"/tmp\"");
        assert!(matches!(result, Err(DaemonError::Config(_))));
    }

    #[test]
    fn test_blank_deploy_name_fails() {
        let result = WardenConfig::from_toml(r#"deploy_name = "  ""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_ups_requires_name() {
        let toml = r#"
            deploy_name = "prod"
            [ups]
            enabled = true
        "#;
        let err = WardenConfig::from_toml(toml).expect_err("should fail");
        assert!(err.to_string().contains("ups.name"));
    }

    #[test]
    fn test_disabled_sections_skip_validation() {
        let toml = r#"
            deploy_name = "prod"
            [network]
            enabled = false
            interval_secs = 0
        "#;
        assert!(WardenConfig::from_toml(toml).is_ok());
    }

    #[test]
    fn test_telegram_requires_chats() {
        let toml = r#"
            deploy_name = "prod"
            [telegram]
            bot_token = "abc"
            chat_ids = []
        "#;
        assert!(WardenConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_inverted_reconnect_delays_fail() {
        let toml = r#"
            deploy_name = "prod"
            [docker]
            reconnect_initial_secs = 60
            reconnect_max_secs = 30
        "#;
        assert!(WardenConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_stale_after_zero_disables() {
        let toml = r#"
            deploy_name = "prod"
            stale_after_secs = 0
        "#;
        let config = WardenConfig::from_toml(toml).expect("parse");
        assert!(config.stale_after().is_none());

        let config = WardenConfig::from_toml(r#"deploy_name = "prod""#).expect("parse");
        assert_eq!(config.stale_after(), Some(chrono::Duration::hours(24)));
    }

    #[test_case("stale_after_secs = 10000000000000000" ; "stale window beyond a time delta")]
    #[test_case("stale_after_secs = 18446744073709551615" ; "stale window beyond i64")]
    #[test_case("[ups]\nenabled = true\nname = \"eaton\"\nrefresh_secs = 10000000000000000" ; "ups refresh")]
    #[test_case("[log]\nmax_files = 0" ; "no log files")]
    #[test_case("[log]\nmax_file_size_mb = 0" ; "empty log files")]
    #[test_case("[log]\nmax_file_size_mb = 17592186044416" ; "log file size overflow")]
    fn test_out_of_range_values_fail(extra: &str) {
        let toml = format!("deploy_name = \"prod\"\n{extra}");
        assert!(matches!(
            WardenConfig::from_toml(&toml),
            Err(DaemonError::Config(_))
        ));
    }

    #[test]
    fn test_large_stale_window_does_not_panic() {
        let mut config = WardenConfig::from_toml(r#"deploy_name = "prod""#).expect("parse");
        config.stale_after_secs = u64::MAX;
        assert!(config.stale_after().is_none());
        config.ups.refresh_secs = 10_000_000_000_000_000;
        assert!(config.ups.refresh().is_none());
    }

    #[test]
    fn test_log_retention() {
        let config = WardenConfig::from_toml(r#"deploy_name = "prod""#).expect("parse");
        let store = config.log.store_config("/tmp/warden");
        assert_eq!(store.max_files, Some(20));
        assert_eq!(store.max_file_size, 10 * 1024 * 1024);

        let config = WardenConfig::from_toml(
            "deploy_name = \"prod\"\n[log]\nmax_file_size_mb = 1\nmax_files = 3",
        )
        .expect("parse");
        let store = config.log.store_config("/tmp/warden");
        assert_eq!(store.max_files, Some(3));
        assert_eq!(store.max_file_size, 1024 * 1024);
    }

    #[test]
    fn test_telegram_debug_redacts_token() {
        let config = WardenConfig::from_toml(SAMPLE).expect("sample should parse");
        let debug = format!("{config:?}");
        assert!(!debug.contains("replace-me"));
    }

    #[test]
    fn test_from_file() {
        let file = create_temp_config(r#"deploy_name = "from-file""#);
        let config = WardenConfig::from_file(file.path()).expect("should load");
        assert_eq!(config.deploy_name, "from-file");
    }

    #[test]
    fn test_from_file_missing() {
        let err = WardenConfig::from_file("/nonexistent/warden.toml").expect_err("should fail");
        assert!(err.to_string().contains("failed to read config file"));
    }
}
