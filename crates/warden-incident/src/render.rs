//! Message rendering.
//!
//! A message is rebuilt from the log entries sharing its correlation id, so
//! the text shown after any edit is a pure function of the persisted thread.

use chrono::{DateTime, Local, Utc};
use warden_log::{LogAction, LogEntry};
use warden_proto::{MetricValue, Metrics, ResourceKind};

use crate::observation::DEFAULT_GROUP;
use crate::state::{ContainerState, NetworkState, ResourceState, SystemState, UpsState};

/// Longest message accepted by the chat transport, in characters.
pub const MAX_MESSAGE_LEN: usize = 4096;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Metrics shown first, in this order. Anything else follows alphabetically.
const METRIC_ORDER: [&str; 5] = ["charge", "runtime", "runtime_low", "input_voltage", "load"];

/// Builds message text from log entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRenderer {
    deploy_name: String,
    max_len: usize,
}

impl MessageRenderer {
    /// Creates a renderer for the named deployment.
    #[must_use]
    pub fn new(deploy_name: impl Into<String>) -> Self {
        Self {
            deploy_name: deploy_name.into(),
            max_len: MAX_MESSAGE_LEN,
        }
    }

    /// Overrides the length limit.
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// The deployment name shown in headers.
    #[must_use]
    pub fn deploy_name(&self) -> &str {
        &self.deploy_name
    }

    /// Renders a thread whose entries belong to the vocabulary `S`.
    ///
    /// Entries are ordered by timestamp; when the text exceeds the length
    /// limit the oldest entries are dropped and counted in a marker line.
    #[must_use]
    pub fn render<S: ResourceState>(&self, entries: &[LogEntry]) -> String {
        let entries = collapse_samples(entries);
        let header = format!(
            "{} {} {}",
            kind_icon(S::KIND),
            self.deploy_name,
            kind_title(S::KIND)
        );

        let mut skipped = 0;
        loop {
            let text = compose::<S>(&header, &entries[skipped..], skipped);
            if text.chars().count() <= self.max_len || skipped + 1 >= entries.len() {
                return truncate_chars(text, self.max_len);
            }
            skipped += 1;
        }
    }

    /// Renders a thread, picking the vocabulary from the entries' kind.
    #[must_use]
    pub fn render_any(&self, entries: &[LogEntry]) -> String {
        let kind = entries
            .first()
            .map_or(ResourceKind::System, |e| e.resource.kind());
        match kind {
            ResourceKind::Container => self.render::<ContainerState>(entries),
            ResourceKind::Network => self.render::<NetworkState>(entries),
            ResourceKind::Ups => self.render::<UpsState>(entries),
            ResourceKind::System => self.render::<SystemState>(entries),
        }
    }
}

/// Formats a duration as `1d 2h 3m 4s`, skipping zero units.
#[must_use]
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    let units = [
        (secs / 86_400, "d"),
        (secs % 86_400 / 3_600, "h"),
        (secs % 3_600 / 60, "m"),
        (secs % 60, "s"),
    ];
    let parts: Vec<String> = units
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect();
    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

const fn kind_icon(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Container => "🐳",
        ResourceKind::Network => "🌐",
        ResourceKind::Ups => "🔋",
        ResourceKind::System => "🖥",
    }
}

const fn kind_title(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Container => "containers",
        ResourceKind::Network => "network",
        ResourceKind::Ups => "UPS",
        ResourceKind::System => "system",
    }
}

/// Orders entries and keeps only the latest of consecutive samples of the
/// same resource.
fn collapse_samples(entries: &[LogEntry]) -> Vec<&LogEntry> {
    let mut ordered: Vec<&LogEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.order_key());

    let mut kept: Vec<&LogEntry> = Vec::with_capacity(ordered.len());
    for entry in ordered {
        if let Some(last) = kept.last_mut() {
            if entry.action == LogAction::Sampled
                && last.action == LogAction::Sampled
                && last.resource == entry.resource
            {
                *last = entry;
                continue;
            }
        }
        kept.push(entry);
    }
    kept
}

fn compose<S: ResourceState>(header: &str, entries: &[&LogEntry], skipped: usize) -> String {
    let mut lines = vec![header.to_string()];
    if skipped > 0 {
        lines.push(format!("… {skipped} earlier entries"));
    }

    if entries.iter().any(|e| e.payload.group.is_some()) {
        let mut sections: Vec<(&str, Vec<&LogEntry>)> = Vec::new();
        for entry in entries {
            let group = entry.payload.group.as_deref().unwrap_or(DEFAULT_GROUP);
            match sections.iter_mut().find(|(name, _)| *name == group) {
                Some((_, members)) => members.push(entry),
                None => sections.push((group, vec![entry])),
            }
        }
        for (group, members) in sections {
            lines.push(String::new());
            lines.push(format!("📦 {group}"));
            for entry in members {
                lines.extend(entry_lines::<S>(entry));
            }
        }
    } else {
        lines.push(String::new());
        for entry in entries {
            lines.extend(entry_lines::<S>(entry));
        }
    }

    lines.join("\n")
}

fn entry_lines<S: ResourceState>(entry: &LogEntry) -> [String; 2] {
    let state = S::parse(&entry.state);
    let icon = state.map_or("⚪", |s| s.icon());
    let description = match (entry.action, state) {
        (LogAction::Saturated, _) => "battery fully charged",
        (LogAction::Resolved, _) if S::KIND == ResourceKind::System => "back up and running",
        (_, Some(s)) => s.describe(),
        (_, None) => entry.state.as_str(),
    };

    let elapsed = match entry.action {
        LogAction::Resolved => entry
            .payload
            .duration_secs
            .or_else(|| entry.payload.opened_at.map(|at| (entry.timestamp - at).num_seconds()))
            .map(|secs| format!(" after {}", format_duration(secs))),
        LogAction::Sampled => entry
            .payload
            .opened_at
            .map(|at| format!(" for {}", format_duration((entry.timestamp - at).num_seconds()))),
        _ => None,
    }
    .unwrap_or_default();

    let when = match (entry.action, entry.payload.opened_at) {
        (LogAction::Resolved, Some(opened)) => {
            format!("[{} → {}]", local_time(opened), local_time(entry.timestamp))
        }
        _ => format!("[{}]", local_time(entry.timestamp)),
    };

    [
        format!(
            "{icon} {}: {description}{}{elapsed}",
            entry.label(),
            metrics_text(&entry.payload.metrics)
        ),
        when,
    ]
}

fn metrics_text(metrics: &Metrics) -> String {
    if metrics.is_empty() {
        return String::new();
    }
    let mut known: Vec<(usize, &str, MetricValue)> = metrics
        .iter()
        .map(|(name, value)| {
            let rank = METRIC_ORDER
                .iter()
                .position(|m| *m == name)
                .unwrap_or(METRIC_ORDER.len());
            (rank, name, value)
        })
        .collect();
    known.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(b.1)));

    let parts: Vec<String> = known
        .into_iter()
        .map(|(_, name, value)| metric_text(name, value))
        .collect();
    format!(" — {}", parts.join(", "))
}

#[allow(clippy::cast_possible_truncation)]
fn metric_text(name: &str, value: MetricValue) -> String {
    let MetricValue::Value(v) = value else {
        return format!("{} N/A", metric_label(name));
    };
    match name {
        "charge" | "load" => format!("{name} {value}%"),
        "runtime" | "runtime_low" => {
            format!("{} {}", metric_label(name), format_duration(v.round() as i64))
        }
        "input_voltage" => format!("input {value}V"),
        _ => format!("{name} {value}"),
    }
}

fn metric_label(name: &str) -> &str {
    match name {
        "runtime_low" => "low at",
        "input_voltage" => "input",
        other => other,
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

fn truncate_chars(text: String, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text;
    }
    let mut cut: String = text.chars().take(max_len.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
