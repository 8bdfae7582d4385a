//! Path containment helpers shared by the reconciler and the indexing tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Checks if `candidate` is covered by a root.
///
/// A recursive root covers everything beneath it. A non-recursive root covers
/// itself and its direct children only.
pub fn path_in_scope(root: &Path, recursive: bool, candidate: &Path) -> bool {
    if recursive {
        candidate.starts_with(root)
    } else {
        candidate == root || is_direct_child(root, candidate)
    }
}

/// Checks if `candidate` sits directly inside `dir`.
pub fn is_direct_child(dir: &Path, candidate: &Path) -> bool {
    candidate.parent() == Some(dir)
}

/// Checks if `candidate` is a strict descendant of `ancestor`.
///
/// Comparison is component-wise, so `/foo/barista` is not under `/foo/bar`.
pub fn is_strict_descendant(ancestor: &Path, candidate: &Path) -> bool {
    candidate != ancestor && candidate.starts_with(ancestor)
}

/// Checks if the final component of `path` names a hidden entry.
pub fn has_hidden_basename(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// A path dropped by [`collapse_nested`] together with the entry covering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoveredPath {
    pub path: PathBuf,
    pub ancestor: PathBuf,
}

/// Removes every path that has a strict ancestor elsewhere in the list.
///
/// Input order of the survivors is preserved. Duplicates must already be
/// removed.
///
/// ```text
/// Input:  ["/a/b/c", "/a/b", "/x/y", "/a/b/.cfg"]
/// Output: ["/a/b", "/x/y"]
/// ```
pub fn collapse_nested(paths: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<CoveredPath>) {
    if paths.len() <= 1 {
        return (paths, Vec::new());
    }

    let selected: HashSet<PathBuf> = paths.iter().cloned().collect();
    let mut kept = Vec::with_capacity(paths.len());
    let mut covered = Vec::new();

    for path in paths {
        match selected_ancestor(&path, &selected) {
            Some(ancestor) => covered.push(CoveredPath { path, ancestor }),
            None => kept.push(path),
        }
    }

    (kept, covered)
}

/// Walks up the parent chain of `path`, returning the first strict ancestor
/// present in `selected`.
fn selected_ancestor(path: &Path, selected: &HashSet<PathBuf>) -> Option<PathBuf> {
    let mut ancestor = path.to_path_buf();
    while ancestor.pop() {
        if selected.contains(&ancestor) {
            return Some(ancestor);
        }
    }
    None
}
