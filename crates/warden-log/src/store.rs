//! In-memory event log.
//!
//! Used by tests and by dry runs where nothing should touch disk. Writes and
//! reads can be switched off to exercise the failure paths of callers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use warden_proto::{CorrelationId, ResourceKey, ResourceKind};

use crate::error::{Result, StoreError};
use crate::index::EntryIndex;
use crate::traits::EventLogStore;
use crate::types::{LogEntry, LogFilter, LogId};

/// Thread-safe in-memory event log.
pub struct MemoryEventLogStore {
    /// All entries, in append order
    entries: RwLock<Vec<LogEntry>>,
    /// Lookup index
    index: EntryIndex,
    /// Next log ID counter
    next_id: AtomicU64,
    /// Whether the store is accepting new entries
    accepting: AtomicBool,
    /// Whether reads are failing
    reads_failing: AtomicBool,
}

impl Default for MemoryEventLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventLogStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            index: EntryIndex::new(),
            next_id: AtomicU64::new(1),
            accepting: AtomicBool::new(true),
            reads_failing: AtomicBool::new(false),
        }
    }

    /// Creates a store pre-populated with entries, keeping their IDs.
    #[must_use]
    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        let store = Self::new();
        let max_id = entries.iter().map(|e| e.id.0).max().unwrap_or(0);
        for entry in &entries {
            store.index.insert(entry);
        }
        *store.entries.write() = entries;
        store.next_id.store(max_id + 1, Ordering::Relaxed);
        store
    }

    /// Returns every entry in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Stops accepting new entries; appends fail with [`StoreError::Closed`].
    pub fn stop(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    /// Resumes accepting new entries.
    pub fn start(&self) {
        self.accepting.store(true, Ordering::Release);
    }

    /// Makes every read fail until switched back.
    pub fn fail_reads(&self, failing: bool) {
        self.reads_failing.store(failing, Ordering::Release);
    }

    fn check_readable(&self) -> Result<()> {
        if self.reads_failing.load(Ordering::Acquire) {
            return Err(StoreError::Read("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl EventLogStore for MemoryEventLogStore {
    fn append(&self, mut entry: LogEntry) -> Result<LogId> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        let id = LogId(self.next_id.fetch_add(1, Ordering::Relaxed));
        entry.id = id;

        self.index.insert(&entry);
        self.entries.write().push(entry);

        Ok(id)
    }

    fn latest(&self, resource: &ResourceKey) -> Result<Option<LogEntry>> {
        self.check_readable()?;
        Ok(self.index.latest(resource))
    }

    fn all_for_correlation(&self, id: &CorrelationId) -> Result<Vec<LogEntry>> {
        self.check_readable()?;
        Ok(self.index.correlated(id))
    }

    fn resources(&self, kind: ResourceKind) -> Result<Vec<ResourceKey>> {
        self.check_readable()?;
        Ok(self.index.resources(kind))
    }

    fn query(&self, filter: &LogFilter, limit: usize) -> Result<Vec<LogEntry>> {
        self.check_readable()?;
        let mut results: Vec<LogEntry> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.matches(filter))
            .cloned()
            .collect();
        results.sort_by_key(|e| std::cmp::Reverse(e.order_key()));
        results.truncate(limit);
        Ok(results)
    }
}
