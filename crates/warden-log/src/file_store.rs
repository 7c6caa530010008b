//! File-based event log with rotation support.
//!
//! This module provides:
//! - [`FileEventLogStore`]: Persistent event log backed by JSON-lines files
//! - Size-based rotation and an optional cap on the number of kept files
//! - Implementation of [`EventLogStore`]
//!
//! Lookups by resource and correlation id are answered from an in-memory
//! [`EntryIndex`] rebuilt from disk when the store is opened. Only
//! [`FileEventLogStore::query`] goes back to the files. Threads are dropped
//! from the index together with the segments that held them.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, warn};
use warden_proto::{CorrelationId, ResourceKey, ResourceKind};

use crate::error::{Result, StoreError};
use crate::index::EntryIndex;
use crate::traits::EventLogStore;
use crate::types::{LogEntry, LogFilter, LogId};

/// Configuration for the file-based event log.
#[derive(Debug, Clone)]
pub struct FileEventLogStoreConfig {
    /// Directory holding the log files.
    pub base_dir: PathBuf,
    /// Maximum size of a single log file before rotation (bytes).
    pub max_file_size: u64,
    /// Prefix for log file names.
    pub file_prefix: String,
    /// Maximum number of files to keep; oldest rotated files are removed first.
    pub max_files: Option<usize>,
}

impl Default for FileEventLogStoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/var/lib/warden"),
            max_file_size: 10 * 1024 * 1024, // 10 MB
            file_prefix: "warden".to_string(),
            max_files: None,
        }
    }
}

impl FileEventLogStoreConfig {
    /// Creates a new config with the given base directory.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    /// Sets the max file size for rotation.
    #[must_use]
    pub const fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Sets the file prefix.
    #[must_use]
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Caps the number of files kept on disk.
    #[must_use]
    pub const fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = Some(max_files);
        self
    }
}

/// On-disk segments: the one being appended to and the sealed ones before it.
struct Segments {
    active: Option<PathBuf>,
    active_len: u64,
    /// Oldest first.
    sealed: Vec<PathBuf>,
}

impl Segments {
    fn count(&self) -> usize {
        self.sealed.len() + usize::from(self.active.is_some())
    }

    /// Newest segment first.
    fn newest_first(&self) -> impl Iterator<Item = &PathBuf> {
        self.active.iter().chain(self.sealed.iter().rev())
    }
}

/// File-based event log with rotation.
///
/// Entries are written as one JSON object per line and flushed before
/// [`EventLogStore::append`] returns.
pub struct FileEventLogStore {
    config: FileEventLogStoreConfig,
    segments: RwLock<Segments>,
    index: EntryIndex,
    next_id: AtomicU64,
    /// Disambiguates segments created within the same millisecond.
    segment_seq: AtomicU64,
}

impl FileEventLogStore {
    /// Opens (or creates) the event log in the configured directory.
    ///
    /// Every existing entry is read once to rebuild the index and continue
    /// the id sequence. Lines that fail to parse are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the base directory cannot be created or read.
    pub fn open(config: FileEventLogStoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.base_dir)?;

        let mut files: Vec<PathBuf> = fs::read_dir(&config.base_dir)?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.extension().is_some_and(|ext| ext == "log")
                    && p.file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with(&config.file_prefix))
            })
            .collect();
        files.sort();

        let index = EntryIndex::new();
        let mut max_id = 0u64;
        let mut count = 0usize;
        for file in &files {
            for entry in Self::read_entries(file)? {
                max_id = max_id.max(entry.id.0);
                index.insert(&entry);
                count += 1;
            }
        }

        let active = files.pop();
        let active_len = active
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map_or(0, |m| m.len());
        let segments = Segments {
            active,
            active_len,
            sealed: files,
        };

        debug!(
            dir = %config.base_dir.display(),
            files = segments.count(),
            entries = count,
            "Opened event log"
        );

        Ok(Self {
            config,
            segments: RwLock::new(segments),
            index,
            next_id: AtomicU64::new(max_id + 1),
            segment_seq: AtomicU64::new(0),
        })
    }

    /// Opens the event log in a directory with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the base directory cannot be created or read.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open(FileEventLogStoreConfig::new(base_dir))
    }

    /// Seals the active segment; the next append starts a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if segments beyond the cap cannot be removed.
    pub fn rotate(&self) -> Result<()> {
        let mut segments = self.segments.write();
        self.start_segment(&mut segments)
    }

    /// Number of segment files on disk.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.segments.read().count()
    }

    /// Combined size of all segments in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        let segments = self.segments.read();
        segments.active_len
            + segments
                .sealed
                .iter()
                .filter_map(|p| fs::metadata(p).ok())
                .map(|m| m.len())
                .sum::<u64>()
    }

    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &FileEventLogStoreConfig {
        &self.config
    }

    fn start_segment(&self, segments: &mut Segments) -> Result<()> {
        segments.sealed.extend(segments.active.take());
        segments.active = Some(self.config.base_dir.join(self.segment_name()));
        segments.active_len = 0;

        if let Some(max_files) = self.config.max_files {
            // the active segment counts against the cap
            let excess = (segments.sealed.len() + 1).saturating_sub(max_files);
            if excess > 0 {
                for expired in segments.sealed.drain(..excess.min(segments.sealed.len())) {
                    debug!(file = %expired.display(), "Removing expired event log segment");
                    fs::remove_file(&expired)?;
                }
                let oldest_kept = segments
                    .sealed
                    .first()
                    .and_then(|p| Self::first_id(p))
                    .unwrap_or(LogId(u64::MAX));
                self.index.prune_before(oldest_kept);
            }
        }

        Ok(())
    }

    fn segment_name(&self) -> String {
        let seq = self.segment_seq.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}_{}_s{seq:04}.log",
            self.config.file_prefix,
            Utc::now().format("%Y%m%d_%H%M%S_%3f"),
        )
    }

    fn first_id(path: &Path) -> Option<LogId> {
        BufReader::new(File::open(path).ok()?)
            .lines()
            .map_while(std::result::Result::ok)
            .find_map(|line| serde_json::from_str::<LogEntry>(&line).ok())
            .map(|entry| entry.id)
    }

    fn read_entries(path: &Path) -> Result<Vec<LogEntry>> {
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();

        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    file = %path.display(),
                    line = n + 1,
                    error = %e,
                    "Skipping unreadable event log line"
                ),
            }
        }
        Ok(entries)
    }
}

impl EventLogStore for FileEventLogStore {
    fn append(&self, mut entry: LogEntry) -> Result<LogId> {
        let id = LogId(self.next_id.fetch_add(1, Ordering::Relaxed));
        entry.id = id;

        let mut record = serde_json::to_vec(&entry)?;
        record.push(b'\n');
        let record_len = record.len() as u64;

        let mut segments = self.segments.write();
        let full = segments.active_len > 0
            && segments.active_len + record_len > self.config.max_file_size;
        if full || segments.active.is_none() {
            self.start_segment(&mut segments)?;
        }
        let Some(path) = segments.active.clone() else {
            return Err(StoreError::Write("no active segment".to_string()));
        };

        let mut writer = BufWriter::new(OpenOptions::new().create(true).append(true).open(&path)?);
        writer.write_all(&record)?;
        writer.flush()?;
        segments.active_len += record_len;
        drop(segments);

        self.index.insert(&entry);
        Ok(id)
    }

    fn latest(&self, resource: &ResourceKey) -> Result<Option<LogEntry>> {
        Ok(self.index.latest(resource))
    }

    fn all_for_correlation(&self, id: &CorrelationId) -> Result<Vec<LogEntry>> {
        Ok(self.index.correlated(id))
    }

    fn resources(&self, kind: ResourceKind) -> Result<Vec<ResourceKey>> {
        Ok(self.index.resources(kind))
    }

    fn query(&self, filter: &LogFilter, limit: usize) -> Result<Vec<LogEntry>> {
        let segments = self.segments.read();
        let mut results = Vec::new();

        for path in segments.newest_first() {
            if results.len() >= limit {
                break;
            }
            let mut matching: Vec<LogEntry> = Self::read_entries(path)?
                .into_iter()
                .filter(|e| e.matches(filter))
                .collect();
            let start = matching.len().saturating_sub(limit - results.len());
            results.extend(matching.drain(start..));
        }

        results.sort_by_key(|e| std::cmp::Reverse(e.order_key()));
        results.truncate(limit);
        Ok(results)
    }
}
