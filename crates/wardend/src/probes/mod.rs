//! Resource probes.
//!
//! A probe samples one resource and returns a [`RawPayload`]. Probes know
//! nothing about states or incidents; classification happens downstream.

pub mod docker;
pub mod network;
pub mod ups;

use futures::future::BoxFuture;
use warden_proto::RawPayload;

use crate::error::ProbeError;

pub use docker::{ContainerEvent, ContainerSource, DockerSource};
pub use network::DnsProbe;
pub use ups::UpsProbe;

/// A resource that is sampled on a fixed cadence.
pub trait Probe: Send + Sync {
    /// Probe name used in logs.
    fn name(&self) -> &str;

    /// Takes one sample.
    fn sample(&self) -> BoxFuture<'_, Result<RawPayload, ProbeError>>;
}
