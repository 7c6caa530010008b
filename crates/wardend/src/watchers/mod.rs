//! Watcher loops.
//!
//! Each watcher owns one [`IncidentEngine`] behind an async mutex. Every
//! transition of that watcher's resources goes through the lock, so the
//! read-modify-write of an incident, the log append and the message call
//! happen as one step per key. Watchers run as independent tasks.

pub mod docker;
pub mod poll;
pub mod system;

use std::sync::Arc;

use tokio::sync::Mutex;
use warden_incident::{IncidentEngine, ResourceState};

pub use docker::DockerWatcher;
pub use poll::PollWatcher;
pub use system::{Startup, SystemWatcher};

/// An incident engine shared between a watcher and its owner.
pub type SharedEngine<S> = Arc<Mutex<IncidentEngine<S>>>;

/// Wraps an engine for use by a watcher.
pub fn shared<S: ResourceState>(engine: IncidentEngine<S>) -> SharedEngine<S> {
    Arc::new(Mutex::new(engine))
}
