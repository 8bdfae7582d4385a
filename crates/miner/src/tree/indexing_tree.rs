#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use super::filter::IndexFilters;
use super::flags::DirectoryFlags;
use crate::error::normalize_path;
use crate::paths::{is_direct_child, is_strict_descendant};
use crate::types::FileInfo;

/// A top-level scope for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRoot {
    pub path: PathBuf,
    /// Opaque id of the owning volume, when the platform can supply one.
    pub root_id: Option<String>,
    pub flags: DirectoryFlags,
}

impl IndexedRoot {
    pub fn is_recursive(&self) -> bool {
        self.flags.is_recursive()
    }
}

/// Notification queued by a tree mutation, drained by the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    RootAdded {
        path: PathBuf,
        flags: DirectoryFlags,
    },
    /// Flags changed or a freshness check was requested for the root.
    RootUpdated { path: PathBuf },
    /// A covered non-root entry needs a freshness check.
    ChildUpdated { root: PathBuf, path: PathBuf },
    RootRemoved {
        path: PathBuf,
        flags: DirectoryFlags,
    },
    /// The root was folded into a new recursive ancestor; coverage continues.
    RootAbsorbed { path: PathBuf, into: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddRootOutcome {
    Added,
    FlagsUpdated { previous: DirectoryFlags },
    Unchanged,
    /// Rejected: a recursive ancestor already covers the path.
    Covered { ancestor: PathBuf },
}

impl AddRootOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added)
    }

    /// Whether a root now exists at the requested path.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Covered { .. })
    }
}

/// How the volume component of a file's identity can be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootIdLookup {
    /// No root covers the file.
    Uncovered,
    /// The owning root's id has been probed already.
    Known(Option<String>),
    /// The owning root at this path has not been probed yet.
    Unprobed(PathBuf),
}

#[derive(Debug, Clone)]
struct RootNode {
    root: IndexedRoot,
    id_probed: bool,
}

/// The set of indexed roots with their flags and the active filters.
#[derive(Debug, Default)]
pub struct IndexingTree {
    roots: BTreeMap<PathBuf, RootNode>,
    filters: IndexFilters,
    events: VecDeque<TreeEvent>,
}

impl IndexingTree {
    pub fn new(filters: IndexFilters) -> Self {
        Self {
            roots: BTreeMap::new(),
            filters,
            events: VecDeque::new(),
        }
    }

    pub fn add_root(&mut self, path: &Path, flags: DirectoryFlags) -> AddRootOutcome {
        let path = normalize_path(path);

        if let Some(node) = self.roots.get_mut(&path) {
            let previous = node.root.flags;
            if previous == flags {
                return AddRootOutcome::Unchanged;
            }
            node.root.flags = flags;
            log::debug!(
                "indexing tree root flags updated root={} flags={:?}",
                path.display(),
                flags
            );
            self.events.push_back(TreeEvent::RootUpdated { path: path.clone() });
            if flags.is_recursive() && !previous.is_recursive() {
                self.absorb_descendants(&path);
            }
            return AddRootOutcome::FlagsUpdated { previous };
        }

        if let Some(ancestor) = self.recursive_ancestor(&path) {
            log::debug!(
                "indexing tree rejected root={} covered_by={}",
                path.display(),
                ancestor.display()
            );
            return AddRootOutcome::Covered { ancestor };
        }

        log::debug!(
            "indexing tree root added root={} flags={:?}",
            path.display(),
            flags
        );
        self.roots.insert(
            path.clone(),
            RootNode {
                root: IndexedRoot {
                    path: path.clone(),
                    root_id: None,
                    flags,
                },
                id_probed: false,
            },
        );
        self.events.push_back(TreeEvent::RootAdded {
            path: path.clone(),
            flags,
        });
        if flags.is_recursive() {
            self.absorb_descendants(&path);
        }
        AddRootOutcome::Added
    }

    /// Removes the root at `path`. Returns the removed root, if there was one.
    pub fn remove_root(&mut self, path: &Path) -> Option<IndexedRoot> {
        let path = normalize_path(path);
        let node = self.roots.remove(&path)?;
        log::debug!("indexing tree root removed root={}", path.display());
        self.events.push_back(TreeEvent::RootRemoved {
            path,
            flags: node.root.flags,
        });
        Some(node.root)
    }

    /// Finds the root owning `file`: an exact match of any kind, else the
    /// nearest recursive ancestor.
    pub fn resolve_owner(&self, file: &Path) -> Option<&IndexedRoot> {
        if let Some(node) = self.roots.get(file) {
            return Some(&node.root);
        }
        let mut ancestor = file.to_path_buf();
        while ancestor.pop() {
            if let Some(node) = self.roots.get(&ancestor) {
                if node.root.is_recursive() {
                    return Some(&node.root);
                }
            }
        }
        None
    }

    pub fn owner_flags(&self, file: &Path) -> Option<DirectoryFlags> {
        self.resolve_owner(file).map(|root| root.flags)
    }

    pub fn is_root(&self, file: &Path) -> bool {
        self.roots.contains_key(file)
    }

    pub fn root(&self, path: &Path) -> Option<&IndexedRoot> {
        self.roots.get(path).map(|node| &node.root)
    }

    pub fn list_roots(&self) -> Vec<IndexedRoot> {
        self.roots.values().map(|node| node.root.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Requests a freshness check for `file`.
    ///
    /// Returns whether any notification was queued. With `recursive`, every
    /// root below `file` is also notified.
    pub fn notify_update(&mut self, file: &Path, recursive: bool) -> bool {
        let file = normalize_path(file);
        let mut emitted = false;

        if self.is_root(&file) {
            self.events.push_back(TreeEvent::RootUpdated { path: file.clone() });
            emitted = true;
        } else if let Some(root) = self.covering_root(&file) {
            let root = root.path.clone();
            self.events.push_back(TreeEvent::ChildUpdated {
                root,
                path: file.clone(),
            });
            emitted = true;
        }

        if recursive {
            let nested: Vec<PathBuf> = self
                .roots
                .range(file.clone()..)
                .map(|(path, _)| path)
                .take_while(|path| path.starts_with(&file))
                .filter(|path| is_strict_descendant(&file, path))
                .cloned()
                .collect();
            for path in nested {
                self.events.push_back(TreeEvent::RootUpdated { path });
                emitted = true;
            }
        }

        emitted
    }

    /// Requests a freshness check on every root.
    pub fn update_all(&mut self) {
        let paths: Vec<PathBuf> = self.roots.keys().cloned().collect();
        for path in paths {
            self.events.push_back(TreeEvent::RootUpdated { path });
        }
    }

    /// Which root id to use for `file`, or which root still needs probing.
    pub fn root_id_lookup(&self, file: &Path) -> RootIdLookup {
        let Some(owner) = self.resolve_owner(file) else {
            return RootIdLookup::Uncovered;
        };
        match self.roots.get(&owner.path) {
            Some(node) if node.id_probed => RootIdLookup::Known(node.root.root_id.clone()),
            _ => RootIdLookup::Unprobed(owner.path.clone()),
        }
    }

    /// Caches the probed volume id of a root. Later probes never overwrite it.
    pub fn record_root_id(&mut self, path: &Path, root_id: Option<String>) -> Option<String> {
        let node = self.roots.get_mut(path)?;
        if !node.id_probed {
            node.root.root_id = root_id;
            node.id_probed = true;
        }
        node.root.root_id.clone()
    }

    pub fn filters(&self) -> &IndexFilters {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: IndexFilters) {
        self.filters = filters;
    }

    /// Checks whether `file` is in scope and passes the filters.
    pub fn is_indexable(&self, file: &Path, info: &FileInfo) -> bool {
        if self.is_root(file) {
            return true;
        }
        if self.covering_root(file).is_none() {
            return false;
        }
        !self.filters.is_filtered(file, info.file_type, info.is_hidden)
    }

    /// Checks whether the contents of `dir` may be indexed at all.
    pub fn parent_is_indexable(&self, dir: &Path) -> bool {
        !self.filters.has_marker_child(dir)
    }

    pub fn take_events(&mut self) -> Vec<TreeEvent> {
        self.events.drain(..).collect()
    }

    /// Root covering `file` when `file` is not itself a root: the nearest
    /// recursive ancestor, or a non-recursive parent.
    fn covering_root(&self, file: &Path) -> Option<&IndexedRoot> {
        let mut ancestor = file.to_path_buf();
        while ancestor.pop() {
            if let Some(node) = self.roots.get(&ancestor) {
                if node.root.is_recursive() || is_direct_child(&ancestor, file) {
                    return Some(&node.root);
                }
            }
        }
        None
    }

    fn recursive_ancestor(&self, path: &Path) -> Option<PathBuf> {
        let mut ancestor = path.to_path_buf();
        while ancestor.pop() {
            if self
                .roots
                .get(&ancestor)
                .is_some_and(|node| node.root.is_recursive())
            {
                return Some(ancestor);
            }
        }
        None
    }

    fn absorb_descendants(&mut self, into: &Path) {
        let nested: Vec<PathBuf> = self
            .roots
            .range(into.to_path_buf()..)
            .map(|(path, _)| path)
            .take_while(|path| path.starts_with(into))
            .filter(|path| is_strict_descendant(into, path))
            .cloned()
            .collect();
        for path in nested {
            self.roots.remove(&path);
            log::debug!(
                "indexing tree root absorbed root={} into={}",
                path.display(),
                into.display()
            );
            self.events.push_back(TreeEvent::RootAbsorbed {
                path,
                into: into.to_path_buf(),
            });
        }
    }
}
