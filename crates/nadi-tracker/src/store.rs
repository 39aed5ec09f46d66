//! Persistence for the delivery set.
//!
//! The whole [`DeliverySet`] is stored as a single JSON snapshot. Saves
//! never expose a partially written file: the snapshot goes to a sibling
//! `.tmp` file that is synced and then renamed over the previous one.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nadi_types::Reporter;
use thiserror::Error;

use crate::DeliverySet;

/// Errors reading a tracker snapshot.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The snapshot exists but could not be read.
    #[error("failed to read tracker file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The snapshot was read but is not a valid delivery set.
    #[error("tracker file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage backend for the delivery set.
pub trait DeliveryStore {
    /// Load the stored set; a missing snapshot is an empty set.
    fn load(&self) -> std::result::Result<DeliverySet, TrackerError>;

    /// Replace the stored set with `set`.
    fn save(&self, set: &DeliverySet) -> Result<()>;
}

/// Filesystem-based delivery store.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path to the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl DeliveryStore for FileStore {
    fn load(&self) -> std::result::Result<DeliverySet, TrackerError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DeliverySet::new()),
            Err(source) => {
                return Err(TrackerError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        parse_snapshot(&data).map_err(|source| TrackerError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, set: &DeliverySet) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create tracker dir {}", parent.display()))?;
        }

        atomic_write_json(&self.path, set)
    }
}

/// Parse snapshot bytes in either the current or the legacy layout.
pub fn parse_snapshot(data: &[u8]) -> std::result::Result<DeliverySet, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Load the delivery set, falling back to an empty set when the snapshot
/// cannot be used. Redelivering a file is preferred over halting shipment.
pub fn load_or_empty(store: &dyn DeliveryStore, reporter: &mut dyn Reporter) -> DeliverySet {
    match store.load() {
        Ok(set) => set,
        Err(e) => {
            reporter.warn(&format!("{e}; starting from an empty tracker"));
            DeliverySet::new()
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Best-effort fsync of the parent directory so the rename survives a crash.
/// Not every platform can open a directory for syncing, so errors are ignored.
fn fsync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent()
        && let Ok(dir) = fs::File::open(if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        })
    {
        let _ = dir.sync_all();
    }
}

fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = tmp_path(path);
    let data = serde_json::to_vec_pretty(value).context("failed to serialize tracker JSON")?;

    {
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("failed to create tmp file {}", tmp.display()))?;
        f.write_all(&data)
            .with_context(|| format!("failed to write tmp file {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path).with_context(|| {
        format!(
            "failed to rename tmp file {} to {}",
            tmp.display(),
            path.display()
        )
    })?;

    fsync_parent_dir(path);

    Ok(())
}
