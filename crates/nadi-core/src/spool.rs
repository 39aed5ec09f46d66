//! The watched storage directory.
//!
//! Listing, reading and deleting source files go through [`SourceFiles`] so
//! the shipment loop can run against something other than the local disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nadi_types::Reporter;

/// A source file eligible for shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub path: PathBuf,
}

/// Access to the documents waiting in the storage directory.
pub trait SourceFiles {
    /// Regular files in `dir` whose name ends with `suffix`, by file name.
    fn list(&self, dir: &Path, suffix: &str, reporter: &mut dyn Reporter) -> Result<Vec<Candidate>>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// The local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

impl SourceFiles for LocalFiles {
    fn list(&self, dir: &Path, suffix: &str, reporter: &mut dyn Reporter) -> Result<Vec<Candidate>> {
        list_candidates(dir, suffix, reporter)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// List regular files in `dir` whose name ends with `suffix`, by file name.
///
/// Names that are not valid UTF-8 cannot be tracked; they are reported and
/// left alone.
pub fn list_candidates(dir: &Path, suffix: &str, reporter: &mut dyn Reporter) -> Result<Vec<Candidate>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read storage directory {}", dir.display()))?;

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read storage directory {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            reporter.warn(&format!(
                "{}: file name is not valid UTF-8; skipping",
                path.display()
            ));
            continue;
        };
        if !name.ends_with(suffix) {
            continue;
        }
        out.push(Candidate { name, path });
    }

    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

/// Name of the tracker snapshot if it lives directly inside `storage`.
pub fn tracker_name_in(storage: &Path, tracker_file: &Path) -> Option<String> {
    let name = tracker_file.file_name()?.to_str()?.to_string();
    let parent = match tracker_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let same_dir = match (fs::canonicalize(parent), fs::canonicalize(storage)) {
        (Ok(a), Ok(b)) => a == b,
        _ => parent == storage,
    };
    same_dir.then_some(name)
}
