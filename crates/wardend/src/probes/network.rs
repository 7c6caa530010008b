//! Reachability probe based on DNS resolution.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;
use warden_incident::classifier::FIELD_NAME;
use warden_proto::RawPayload;

use super::Probe;
use crate::error::ProbeError;

/// Display name of the network resource.
pub const NETWORK_LABEL: &str = "network";

/// Resolves a well-known host. Success means the uplink works.
///
/// Resolution failures are not errors: they are the "down" sample.
#[derive(Debug, Clone)]
pub struct DnsProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl DnsProbe {
    /// Creates a probe for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Target as `host:port`.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn payload(&self, status: &str) -> RawPayload {
        RawPayload::with_status(status)
            .field(FIELD_NAME, NETWORK_LABEL)
            .field("host", self.host.clone())
    }
}

impl Probe for DnsProbe {
    fn name(&self) -> &str {
        NETWORK_LABEL
    }

    fn sample(&self) -> BoxFuture<'_, Result<RawPayload, ProbeError>> {
        Box::pin(async move {
            let target = self.target();
            let resolved = tokio::time::timeout(self.timeout, tokio::net::lookup_host(target))
                .await
                .map(|lookup| lookup.map(|mut addrs| addrs.next().is_some()));

            let status = match resolved {
                Ok(Ok(true)) => "up",
                Ok(Ok(false)) => {
                    debug!(host = %self.host, "Resolution returned no addresses");
                    "down"
                }
                Ok(Err(e)) => {
                    debug!(host = %self.host, error = %e, "Resolution failed");
                    "down"
                }
                Err(_) => {
                    debug!(host = %self.host, timeout = ?self.timeout, "Resolution timed out");
                    "down"
                }
            };
            Ok(self.payload(status))
        })
    }
}
