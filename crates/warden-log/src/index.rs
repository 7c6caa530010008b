//! Indexing for the lookups incident tracking depends on.
//!
//! - Resource key → most recent entry (restart recovery)
//! - Correlation id → every entry of that thread (message rebuilding)

use parking_lot::RwLock;
use std::collections::HashMap;
use warden_proto::{CorrelationId, ResourceKey, ResourceKind};

use crate::types::{LogEntry, LogId};

/// In-memory index over appended entries.
pub struct EntryIndex {
    /// Most recent entry per resource
    latest: RwLock<HashMap<ResourceKey, LogEntry>>,
    /// Entries per correlation id, in append order
    by_correlation: RwLock<HashMap<CorrelationId, Vec<LogEntry>>>,
}

impl Default for EntryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryIndex {
    /// Creates a new empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            latest: RwLock::new(HashMap::new()),
            by_correlation: RwLock::new(HashMap::new()),
        }
    }

    /// Indexes an entry.
    pub fn insert(&self, entry: &LogEntry) {
        {
            let mut latest = self.latest.write();
            let newer = latest
                .get(&entry.resource)
                .is_none_or(|current| entry.order_key() >= current.order_key());
            if newer {
                latest.insert(entry.resource.clone(), entry.clone());
            }
        }

        if let Some(ref id) = entry.correlation_id {
            self.by_correlation
                .write()
                .entry(id.clone())
                .or_default()
                .push(entry.clone());
        }
    }

    /// The most recent entry for a resource.
    #[must_use]
    pub fn latest(&self, resource: &ResourceKey) -> Option<LogEntry> {
        self.latest.read().get(resource).cloned()
    }

    /// Every entry sharing a correlation id, oldest first.
    #[must_use]
    pub fn correlated(&self, id: &CorrelationId) -> Vec<LogEntry> {
        let mut entries = self
            .by_correlation
            .read()
            .get(id)
            .cloned()
            .unwrap_or_default();
        entries.sort_by_key(LogEntry::order_key);
        entries
    }

    /// Every resource of a kind that has at least one entry.
    #[must_use]
    pub fn resources(&self, kind: ResourceKind) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self
            .latest
            .read()
            .keys()
            .filter(|k| k.kind() == kind)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Drops correlated entries with ids below `cutoff`, and threads left
    /// empty. The latest entry per resource is kept for recovery.
    pub fn prune_before(&self, cutoff: LogId) {
        self.by_correlation.write().retain(|_, entries| {
            entries.retain(|e| e.id >= cutoff);
            !entries.is_empty()
        });
    }

    /// Clears all indices.
    pub fn clear(&self) {
        self.latest.write().clear();
        self.by_correlation.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogAction;
    use chrono::{Duration, Utc};

    fn entry(id: u64, name: &str, state: &str) -> LogEntry {
        let mut e = LogEntry::new(
            ResourceKey::new(ResourceKind::Container, name),
            state,
            LogAction::Sampled,
        );
        e.id = LogId(id);
        e
    }

    #[test]
    fn latest_tracks_newest_entry() {
        let index = EntryIndex::new();
        let now = Utc::now();
        index.insert(&entry(1, "web", "running").at(now));
        index.insert(&entry(2, "web", "stopped").at(now + Duration::seconds(1)));

        let key = ResourceKey::new(ResourceKind::Container, "web");
        assert_eq!(index.latest(&key).map(|e| e.state), Some("stopped".to_string()));
    }

    #[test]
    fn latest_ignores_out_of_order_older_entry() {
        let index = EntryIndex::new();
        let now = Utc::now();
        index.insert(&entry(2, "web", "stopped").at(now));
        index.insert(&entry(1, "web", "running").at(now - Duration::seconds(30)));

        let key = ResourceKey::new(ResourceKind::Container, "web");
        assert_eq!(index.latest(&key).map(|e| e.id), Some(LogId(2)));
    }

    #[test]
    fn correlated_is_chronological() {
        let index = EntryIndex::new();
        let id = CorrelationId::new("c1").expect("id");
        let now = Utc::now();
        index.insert(&entry(2, "web", "removed").at(now).with_correlation(Some(id.clone())));
        index.insert(
            &entry(1, "web", "stopped")
                .at(now - Duration::seconds(5))
                .with_correlation(Some(id.clone())),
        );

        let states: Vec<String> = index.correlated(&id).into_iter().map(|e| e.state).collect();
        assert_eq!(states, vec!["stopped", "removed"]);
    }

    #[test]
    fn resources_filters_by_kind() {
        let index = EntryIndex::new();
        index.insert(&entry(1, "web", "running"));
        index.insert(&entry(2, "db", "running"));
        let mut ups = entry(3, "eaton", "online");
        ups.resource = ResourceKey::new(ResourceKind::Ups, "eaton");
        index.insert(&ups);

        assert_eq!(index.resources(ResourceKind::Container).len(), 2);
        assert_eq!(index.resources(ResourceKind::Ups).len(), 1);
        assert!(index.resources(ResourceKind::Network).is_empty());
    }

    #[test]
    fn prune_drops_old_thread_entries() {
        let index = EntryIndex::new();
        let old = CorrelationId::new("c1").expect("id");
        let live = CorrelationId::new("c2").expect("id");
        index.insert(&entry(1, "web", "stopped").with_correlation(Some(old.clone())));
        index.insert(&entry(2, "web", "running").with_correlation(Some(old.clone())));
        index.insert(&entry(3, "db", "stopped").with_correlation(Some(live.clone())));

        index.prune_before(LogId(2));
        assert_eq!(index.correlated(&old).len(), 1);

        index.prune_before(LogId(3));
        assert!(index.correlated(&old).is_empty());
        assert_eq!(index.correlated(&live).len(), 1);
        assert!(index.latest(&ResourceKey::new(ResourceKind::Container, "web")).is_some());
    }
}
