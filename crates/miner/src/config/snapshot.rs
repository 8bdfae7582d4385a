//! Persisted snapshot of the root set and filters from the previous run.
//!
//! When the live tree no longer matches the stored snapshot, every root gets
//! a freshness check so the crawler can pick up what changed while the
//! service was down.

use std::fs;
use std::hash::Hasher;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{MinerError, Result};
use crate::tree::{DirectoryFlags, FilterPatterns, IndexingTree};

/// Snapshot format version. Bump when the layout changes.
pub const CONFIG_SNAPSHOT_VERSION: u32 = 1;
pub const CONFIG_SNAPSHOT_FILENAME: &str = "indexing-tree.snapshot";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRoot {
    pub path: PathBuf,
    pub flags: DirectoryFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub version: u32,
    pub fingerprint: u64,
    pub roots: Vec<SnapshotRoot>,
    pub filters: FilterPatterns,
}

impl ConfigSnapshot {
    /// Snapshot of the configured part of `tree`. Roots for which
    /// `on_demand` returns true belong to requesters and are left out.
    pub fn of<F>(tree: &IndexingTree, on_demand: F) -> Self
    where
        F: Fn(&Path) -> bool,
    {
        let roots: Vec<SnapshotRoot> = tree
            .list_roots()
            .into_iter()
            .filter(|root| !on_demand(&root.path))
            .map(|root| SnapshotRoot {
                path: root.path,
                flags: root.flags,
            })
            .collect();
        let filters = tree.filters().patterns().clone();
        let fingerprint = fingerprint(&roots, &filters);
        Self {
            version: CONFIG_SNAPSHOT_VERSION,
            fingerprint,
            roots,
            filters,
        }
    }
}

pub fn snapshot_path(state_dir: &Path) -> PathBuf {
    state_dir.join(CONFIG_SNAPSHOT_FILENAME)
}

pub fn save_config<F>(tree: &IndexingTree, state_dir: &Path, on_demand: F) -> Result<()>
where
    F: Fn(&Path) -> bool,
{
    let snapshot = ConfigSnapshot::of(tree, on_demand);
    fs::create_dir_all(state_dir).map_err(|error| {
        MinerError::Internal(format!(
            "failed to create state directory {}: {error}",
            state_dir.display()
        ))
    })?;

    let tmp = NamedTempFile::new_in(state_dir)?;
    {
        let mut output = BufWriter::new(tmp.as_file());
        postcard::to_io(&snapshot, &mut output).map_err(|error| {
            MinerError::Serialization(format!("failed to encode config snapshot: {error}"))
        })?;
        output.flush()?;
    }

    let path = snapshot_path(state_dir);
    tmp.persist(&path).map_err(|error| {
        MinerError::Internal(format!(
            "failed to finalize config snapshot {}: {}",
            path.display(),
            error.error
        ))
    })?;

    log::debug!(
        "wrote config snapshot path={} roots={} fingerprint={:016x}",
        path.display(),
        snapshot.roots.len(),
        snapshot.fingerprint
    );
    Ok(())
}

/// Reads the stored snapshot. Missing or outdated snapshots read as `None`.
pub fn load_config(state_dir: &Path) -> Result<Option<ConfigSnapshot>> {
    let path = snapshot_path(state_dir);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    match postcard::from_bytes::<ConfigSnapshot>(&bytes) {
        Ok(snapshot) if snapshot.version == CONFIG_SNAPSHOT_VERSION => Ok(Some(snapshot)),
        Ok(snapshot) => {
            log::info!(
                "discarding config snapshot with version={} expected={}",
                snapshot.version,
                CONFIG_SNAPSHOT_VERSION
            );
            Ok(None)
        }
        Err(error) => {
            log::warn!("discarding unreadable config snapshot {}: {error}", path.display());
            Ok(None)
        }
    }
}

/// Compares the live tree against the stored snapshot.
///
/// On mismatch every root is queued for a freshness check and the snapshot is
/// rewritten. Returns whether a mismatch was found.
pub fn check_config<F>(tree: &mut IndexingTree, state_dir: &Path, on_demand: F) -> Result<bool>
where
    F: Fn(&Path) -> bool,
{
    let current = ConfigSnapshot::of(tree, &on_demand);
    let stored = load_config(state_dir)?;
    if stored.as_ref().map(|s| s.fingerprint) == Some(current.fingerprint) {
        return Ok(false);
    }

    log::info!(
        "indexing configuration changed since last run roots={}, rechecking all roots",
        current.roots.len()
    );
    tree.update_all();
    save_config(tree, state_dir, on_demand)?;
    Ok(true)
}

fn fingerprint(roots: &[SnapshotRoot], filters: &FilterPatterns) -> u64 {
    let mut hasher = FnvHasher::default();
    for root in roots {
        hasher.write(root.path.to_string_lossy().as_bytes());
        hasher.write_u32(root.flags.bits());
        hasher.write_u8(0xff);
    }
    for list in [&filters.files, &filters.directories, &filters.parent_markers] {
        for pattern in list {
            hasher.write(pattern.as_bytes());
            hasher.write_u8(0xfe);
        }
        hasher.write_u8(0xfd);
    }
    hasher.write_u8(u8::from(filters.filter_hidden));
    hasher.finish()
}
