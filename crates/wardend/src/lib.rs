//! # wardend
//!
//! The warden daemon. Watches containers, network reachability, a UPS and
//! the host's own lifecycle, and reports each incident as one chat message
//! that is edited in place until the incident is over.
//!
//! # Components
//!
//! - [`config`]: TOML configuration with validation
//! - [`probes`]: Docker, DNS and NUT probes producing raw samples
//! - [`watchers`]: poll and subscribe loops feeding the incident engines
//! - [`daemon`]: wiring and graceful shutdown
//! - [`commands`]: offline history and message reconstruction

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod error;
pub mod probes;
pub mod watchers;

pub use config::WardenConfig;
pub use daemon::Daemon;
pub use error::{DaemonError, ProbeError, Result};
