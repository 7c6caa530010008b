//! Offline commands that read the event log.

use warden_incident::{MessageRenderer, render_thread};
use warden_log::{EventLogStore, LogEntry, LogFilter};
use warden_proto::{CorrelationId, ResourceKey};

use crate::error::Result;

/// Formats one entry as a single history line.
#[must_use]
pub fn format_entry(entry: &LogEntry) -> String {
    let mut line = format!(
        "{} #{} {} {} {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.id,
        entry.resource,
        entry.action,
        entry.state,
    );
    if let Some(label) = entry.payload.label.as_deref() {
        line.push_str(&format!(" ({label})"));
    }
    if let Some(id) = &entry.correlation_id {
        line.push_str(&format!(" [{id}]"));
    }
    line
}

/// Recent entries, newest first, optionally for one resource.
pub fn history(
    store: &dyn EventLogStore,
    resource: Option<ResourceKey>,
    limit: usize,
) -> Result<Vec<String>> {
    let filter = match resource {
        Some(resource) => LogFilter::new().with_resource(resource),
        None => LogFilter::new(),
    };
    Ok(store
        .query(&filter, limit)?
        .iter()
        .map(format_entry)
        .collect())
}

/// Rebuilds the text of the message tracked under `id`.
pub fn render(
    store: &dyn EventLogStore,
    renderer: &MessageRenderer,
    id: &CorrelationId,
) -> Result<Option<String>> {
    Ok(render_thread(store, renderer, id)?)
}
