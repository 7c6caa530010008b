//! # warden-log
//!
//! Append-only event log backing incident tracking.
//!
//! The log is the source of truth for incident state: the current state of a
//! resource is the state of its most recent [`LogEntry`], and the message for an
//! incident is rebuilt from every entry sharing its correlation id.
//!
//! This crate provides:
//!
//! - [`LogEntry`]: immutable record of one state observation
//! - [`LogFilter`]: query filters for browsing history
//! - [`EventLogStore`]: the storage contract used by the incident engine
//! - [`FileEventLogStore`]: JSON-lines files with size-based rotation
//! - [`MemoryEventLogStore`]: in-memory store for tests and dry runs
//!
//! ## Example
//!
//! ```rust
//! use warden_log::{EventLogStore, LogAction, LogEntry, MemoryEventLogStore};
//! use warden_proto::{ResourceKey, ResourceKind};
//!
//! let store = MemoryEventLogStore::new();
//! let key = ResourceKey::singleton(ResourceKind::Network);
//! store
//!     .append(LogEntry::new(key.clone(), "down", LogAction::Opened))
//!     .unwrap();
//!
//! let latest = store.latest(&key).unwrap().unwrap();
//! assert_eq!(latest.state, "down");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod file_store;
pub mod index;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{Result, StoreError};
pub use file_store::{FileEventLogStore, FileEventLogStoreConfig};
pub use index::EntryIndex;
pub use store::MemoryEventLogStore;
pub use traits::EventLogStore;
pub use types::{EntryPayload, LogAction, LogEntry, LogFilter, LogId, TimeRange};
