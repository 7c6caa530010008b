//! # warden-proto
//!
//! Identifiers and payload types shared by every warden crate.
//!
//! - [`ResourceKind`] / [`ResourceKey`]: which entity a sample or log entry is about
//! - [`CorrelationId`]: opaque handle of the outbound message tracking an incident
//! - [`RawPayload`]: raw probe output before classification
//! - [`Metrics`] / [`MetricValue`]: numeric readings with an explicit "not available" marker

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod payload;
pub mod types;

pub use error::{ProtoError, Result};
pub use payload::{MetricValue, Metrics, RawPayload};
pub use types::{CorrelationId, ResourceKey, ResourceKind};
