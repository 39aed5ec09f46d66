//! Per-file delivery tracking for the nadi shipper.
//!
//! The tracker is the sole authority on whether a source file should be
//! (re)attempted. It keeps one [`DeliveryRecord`] per file name and moves it
//! through `pending → sent` on success, or `pending → … → failed` once the
//! number of failed attempts exceeds the configured maximum.
//!
//! # Example
//!
//! ```
//! use nadi_tracker::{DeliverySet, DeliveryStore, FileStore};
//! use nadi_types::DeliveryStatus;
//!
//! let td = tempfile::tempdir().expect("tempdir");
//! let store = FileStore::new(td.path().join("tracker.json"));
//!
//! let mut set = DeliverySet::new();
//! set.record_failure("b.json", 2);
//! set.record_success("a.json");
//! store.save(&set).expect("save");
//!
//! let loaded = store.load().expect("load");
//! assert_eq!(loaded.status("a.json"), DeliveryStatus::Sent);
//! assert!(loaded.should_attempt("b.json"));
//! ```

use std::collections::BTreeMap;

use nadi_types::{DeliveryRecord, DeliveryStatus};
use serde::{Deserialize, Serialize};

pub mod store;

pub use store::{DeliveryStore, FileStore, TrackerError, load_or_empty, parse_snapshot};

/// Every file the shipper has seen, keyed by file name.
///
/// A file absent from the set is pending with zero tries. Records are never
/// removed, so the set doubles as delivery history once sources are deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliverySet {
    records: BTreeMap<String, DeliveryRecord>,
}

/// Number of records in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
}

impl DeliverySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stored record, if the file has been tracked before.
    pub fn get(&self, name: &str) -> Option<&DeliveryRecord> {
        self.records.get(name)
    }

    /// Record for a file, defaulting to pending with zero tries.
    pub fn record(&self, name: &str) -> DeliveryRecord {
        self.records.get(name).copied().unwrap_or_default()
    }

    pub fn status(&self, name: &str) -> DeliveryStatus {
        self.record(name).status
    }

    /// Insert or replace the record for a file.
    pub fn upsert(&mut self, name: &str, record: DeliveryRecord) {
        self.records.insert(name.to_string(), record);
    }

    /// Records in file name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeliveryRecord)> {
        self.records.iter().map(|(name, rec)| (name.as_str(), rec))
    }

    /// True iff the file is untracked or still pending.
    pub fn should_attempt(&self, name: &str) -> bool {
        !self.status(name).is_terminal()
    }

    /// Mark a file as delivered.
    ///
    /// Terminal records are returned unchanged.
    pub fn record_success(&mut self, name: &str) -> DeliveryRecord {
        let mut rec = self.record(name);
        if rec.status.is_terminal() {
            return rec;
        }
        rec.status = DeliveryStatus::Sent;
        self.upsert(name, rec);
        rec
    }

    /// Count a failed attempt; the file becomes failed once `tries > max_tries`.
    ///
    /// Terminal records are returned unchanged.
    pub fn record_failure(&mut self, name: &str, max_tries: u32) -> DeliveryRecord {
        let mut rec = self.record(name);
        if rec.status.is_terminal() {
            return rec;
        }

        rec.tries = rec.tries.saturating_add(1);
        if rec.tries > max_tries {
            rec.status = DeliveryStatus::Failed;
        }
        self.upsert(name, rec);
        rec
    }

    pub fn counts(&self) -> StatusCounts {
        self.records
            .values()
            .fold(StatusCounts::default(), |mut acc, rec| {
                match rec.status {
                    DeliveryStatus::Pending => acc.pending += 1,
                    DeliveryStatus::Sent => acc.sent += 1,
                    DeliveryStatus::Failed => acc.failed += 1,
                }
                acc
            })
    }
}
