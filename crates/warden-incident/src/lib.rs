//! # warden-incident
//!
//! Incident tracking for infrastructure health notifications.
//!
//! Raw probe samples are classified into a small canonical vocabulary per
//! resource kind. Every resource then runs a state machine whose transitions
//! are appended to the event log and delivered as one chat message per
//! incident: sent when the incident opens, edited in place while it evolves
//! and resolves.
//!
//! # Building blocks
//!
//! - [`StateClassifier`]: table-driven, total mapping from [`RawPayload`](warden_proto::RawPayload) to a state
//! - [`IncidentTracker`]: pure per-resource state machine ([`Transition`])
//! - [`IncidentPolicy`]: per-kind refresh, announcement and saturation rules
//! - [`recovery::seed`]: rebuilds an incident from the most recent log entry
//! - [`IncidentEngine`]: batches transitions, groups messages and picks send or edit
//! - [`MessageRenderer`]: message text as a function of the log thread
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use warden_incident::{ContainerState, StateClassifier};
//! use warden_proto::{RawPayload, ResourceKey, ResourceKind};
//!
//! let classifier = StateClassifier::containers("com.docker.compose.project");
//! let raw = RawPayload::with_status("exited")
//!     .field("name", "web-1")
//!     .field("label.com.docker.compose.project", "shop");
//!
//! let obs = classifier.observe(
//!     ResourceKey::new(ResourceKind::Container, "web-1"),
//!     &raw,
//!     Utc::now(),
//! );
//! assert_eq!(obs.state, ContainerState::Stopped);
//! assert_eq!(obs.group.as_deref(), Some("shop"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classifier;
pub mod engine;
pub mod error;
pub mod observation;
pub mod policy;
pub mod reconcile;
pub mod recovery;
pub mod render;
pub mod state;
pub mod tracker;

pub use classifier::{Escalation, MetricSpec, StateClassifier};
pub use engine::{IncidentEngine, render_thread};
pub use error::{IncidentError, Result};
pub use observation::{DEFAULT_GROUP, Observation};
pub use policy::{IncidentPolicy, Saturation};
pub use render::{MAX_MESSAGE_LEN, MessageRenderer, format_duration};
pub use state::{ContainerState, NetworkState, ResourceState, SystemState, UpsState};
pub use tracker::{Incident, IncidentTracker, Transition};
