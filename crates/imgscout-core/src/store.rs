//! On-disk mapping of target -> optional image reference.
//!
//! The file is a single JSON object. A `null` value means the target was
//! attempted without success and stays eligible for the next run; a string
//! value means the target is resolved and is never fetched again.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::models::{Reference, StoreStats, Target};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultStore {
    entries: BTreeMap<Target, Option<Reference>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from disk.
    ///
    /// A missing file yields an empty store. A file that exists but does not
    /// parse is reported as [`AppError::StoreCorrupt`] so the caller never
    /// overwrites it blindly.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No prior result store");
                return Ok(Self::new());
            }
            Err(e) => return Err(AppError::IoError(e)),
        };

        let entries: BTreeMap<Target, Option<Reference>> =
            serde_json::from_str(&raw).map_err(|source| AppError::StoreCorrupt {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self { entries })
    }

    /// Load a prior store and keep only its resolved entries.
    ///
    /// Null entries are dropped so those targets are fetched again.
    pub fn resume(path: &Path) -> Result<Self, AppError> {
        let prior = Self::load(path)?;
        let entries = prior
            .resolved_subset()
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect();
        Ok(Self { entries })
    }

    /// Entries whose value is not null.
    pub fn resolved_subset(&self) -> BTreeMap<Target, Reference> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|r| (k.clone(), r.clone())))
            .collect()
    }

    pub fn is_resolved(&self, target: &str) -> bool {
        matches!(self.entries.get(target), Some(Some(_)))
    }

    /// Upsert a result. Entries are never removed.
    pub fn put(&mut self, target: impl Into<Target>, value: Option<Reference>) {
        self.entries.insert(target.into(), value);
    }

    /// `None` if never attempted, `Some(None)` if attempted without success.
    pub fn get(&self, target: &str) -> Option<Option<&str>> {
        self.entries.get(target).map(|v| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Target, &Option<Reference>)> {
        self.entries.iter()
    }

    /// Write the full mapping, nulls included, replacing the file at `path`.
    ///
    /// Writes a sibling temp file, syncs it, then renames it over the
    /// destination. An interrupted flush leaves the previous file intact.
    pub fn flush(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = temp_path_for(path);
        let written = self
            .write_synced(&temp_path)
            .and_then(|()| fs::rename(&temp_path, path).map_err(AppError::from));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        tracing::debug!(
            path = %path.display(),
            entries = self.entries.len(),
            "Result store flushed"
        );
        Ok(())
    }

    fn write_synced(&self, temp_path: &Path) -> Result<(), AppError> {
        let file = File::create(temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.entries)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Count resolved / failed / never-attempted targets of a catalog.
    pub fn stats(&self, targets: &HashSet<Target>) -> StoreStats {
        let mut stats = StoreStats::default();
        for target in targets {
            match self.entries.get(target) {
                Some(Some(_)) => stats.resolved += 1,
                Some(None) => stats.failed += 1,
                None => stats.unattempted += 1,
            }
        }
        stats
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "results.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
