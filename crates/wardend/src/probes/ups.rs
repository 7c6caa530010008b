//! UPS probe backed by the NUT `upsc` client.
//!
//! `upsc <name>` prints one `variable: value` pair per line. The `ups.status`
//! variable carries the status flags (`OL`, `OB`, `LB`, ...); every other
//! variable is passed through as a raw field for metric extraction.

use std::process::Stdio;
use std::time::Duration;

use futures::StreamExt;
use futures::future::BoxFuture;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::codec::{FramedRead, LinesCodec};
use warden_incident::classifier::FIELD_NAME;
use warden_proto::RawPayload;

use super::Probe;
use crate::error::ProbeError;

/// NUT variable holding the status flags.
pub const STATUS_VARIABLE: &str = "ups.status";

const MAX_LINE_LENGTH: usize = 4096;

/// Queries one UPS through an external command.
#[derive(Debug, Clone)]
pub struct UpsProbe {
    command: String,
    name: String,
    timeout: Duration,
}

impl UpsProbe {
    /// Creates a probe running `command name`.
    #[must_use]
    pub fn new(command: impl Into<String>, name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            name: name.into(),
            timeout,
        }
    }

    /// UPS device name.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.name
    }

    async fn query(&self) -> Result<RawPayload, ProbeError> {
        let mut child = Command::new(&self.command)
            .arg(&self.name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProbeError::Unavailable(format!("failed to run {}: {e}", self.command)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProbeError::Unavailable("stdout not captured".to_string()))?;

        let mut lines = FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let mut output = Vec::new();
        while let Some(line) = lines.next().await {
            let line = line.map_err(|e| ProbeError::Unavailable(format!("unreadable output: {e}")))?;
            output.push(line);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ProbeError::Unavailable(format!("failed to wait for {}: {e}", self.command)))?;

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr).await;
            }
            return Err(ProbeError::Unavailable(format!(
                "{} exited with {status}: {}",
                self.command,
                stderr.trim()
            )));
        }

        Ok(parse_variables(&self.name, output.iter().map(String::as_str)))
    }
}

/// Builds a payload from `variable: value` lines.
///
/// Lines without a separator are skipped. The status is absent when the
/// output has no `ups.status` line.
pub fn parse_variables<'a>(name: &str, lines: impl IntoIterator<Item = &'a str>) -> RawPayload {
    let mut raw = RawPayload::absent().field(FIELD_NAME, name);
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || key == FIELD_NAME {
            continue;
        }
        if key == STATUS_VARIABLE {
            raw.status = Some(value.to_string());
        }
        raw = raw.field(key, value);
    }
    raw
}

impl Probe for UpsProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample(&self) -> BoxFuture<'_, Result<RawPayload, ProbeError>> {
        Box::pin(async move {
            tokio::time::timeout(self.timeout, self.query())
                .await
                .map_err(|_| ProbeError::Timeout(self.timeout))?
        })
    }
}
