//! The storage contract used by incident tracking.
//!
//! This module provides the [`EventLogStore`] trait for abstracting over
//! log backends (file-based, in-memory).

use warden_proto::{CorrelationId, ResourceKey, ResourceKind};

use crate::error::Result;
use crate::types::{LogEntry, LogFilter, LogId};

/// Append-only event log.
///
/// Implementors must be safe to share between watchers: appends and queries
/// may come from several tasks at once. No cross-resource transactions are
/// required.
pub trait EventLogStore: Send + Sync {
    /// Appends an entry, assigning it an ID.
    ///
    /// The entry's ID field is overwritten with the newly assigned ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`](crate::StoreError::Write) (or an I/O
    /// error) if the entry cannot be persisted.
    fn append(&self, entry: LogEntry) -> Result<LogId>;

    /// Returns the most recent entry for a resource, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if history cannot be read.
    fn latest(&self, resource: &ResourceKey) -> Result<Option<LogEntry>>;

    /// Returns every entry recorded under a correlation id, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if history cannot be read.
    fn all_for_correlation(&self, id: &CorrelationId) -> Result<Vec<LogEntry>>;

    /// Returns every resource of the given kind that has been logged.
    ///
    /// # Errors
    ///
    /// Returns an error if history cannot be read.
    fn resources(&self, kind: ResourceKind) -> Result<Vec<ResourceKey>>;

    /// Queries entries matching the filter, newest first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if history cannot be read.
    fn query(&self, filter: &LogFilter, limit: usize) -> Result<Vec<LogEntry>>;
}
