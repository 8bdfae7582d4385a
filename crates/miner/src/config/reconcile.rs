//! Turns raw directory lists into the canonical single and recursive root sets.

use std::collections::HashSet;
use std::path::PathBuf;

use super::resolve::PathResolver;
use crate::paths::collapse_nested;

/// Why a configured entry did not make it into the canonical sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Unresolvable { raw: String, recursive: bool },
    Duplicate { path: PathBuf, recursive: bool },
    CoveredByAncestor { path: PathBuf, ancestor: PathBuf },
    ShadowedBySingle { path: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciledDirectories {
    pub single: Vec<PathBuf>,
    pub recursive: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReconciledDirectories {
    /// Every canonical path paired with whether it is recursive.
    pub fn roots(&self) -> impl Iterator<Item = (&PathBuf, bool)> {
        self.single
            .iter()
            .map(|path| (path, false))
            .chain(self.recursive.iter().map(|path| (path, true)))
    }
}

pub struct DirectorySetReconciler<'a> {
    resolver: &'a PathResolver,
}

impl<'a> DirectorySetReconciler<'a> {
    pub fn new(resolver: &'a PathResolver) -> Self {
        Self { resolver }
    }

    pub fn reconcile<S: AsRef<str>>(
        &self,
        raw_single: &[S],
        raw_recursive: &[S],
    ) -> ReconciledDirectories {
        let mut diagnostics = Vec::new();

        let single = self.resolve_all(raw_single, false, &mut diagnostics);
        let single = dedup_equal(single, false, &mut diagnostics);

        let recursive = self.resolve_all(raw_recursive, true, &mut diagnostics);
        let recursive = dedup_equal(recursive, true, &mut diagnostics);
        let recursive = collapse(recursive, &mut diagnostics);

        let single_set: HashSet<&PathBuf> = single.iter().collect();
        let mut shadowed = Vec::new();
        let recursive: Vec<PathBuf> = recursive
            .into_iter()
            .filter(|path| {
                if single_set.contains(path) {
                    shadowed.push(path.clone());
                    false
                } else {
                    true
                }
            })
            .collect();
        for path in shadowed {
            log::warn!(
                "directory {} configured as both single and recursive, indexing non-recursively",
                path.display()
            );
            diagnostics.push(Diagnostic::ShadowedBySingle { path });
        }

        let recursive = collapse(recursive, &mut diagnostics);

        ReconciledDirectories {
            single,
            recursive,
            diagnostics,
        }
    }

    fn resolve_all<S: AsRef<str>>(
        &self,
        raw: &[S],
        recursive: bool,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<PathBuf> {
        raw.iter()
            .filter_map(|entry| {
                let entry = entry.as_ref();
                let resolved = self.resolver.resolve_raw(entry);
                if resolved.is_none() {
                    log::warn!("ignoring unresolvable indexed directory entry '{entry}'");
                    diagnostics.push(Diagnostic::Unresolvable {
                        raw: entry.to_string(),
                        recursive,
                    });
                }
                resolved
            })
            .collect()
    }
}

fn dedup_equal(paths: Vec<PathBuf>, recursive: bool, diagnostics: &mut Vec<Diagnostic>) -> Vec<PathBuf> {
    let mut seen = HashSet::with_capacity(paths.len());
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        if seen.insert(path.clone()) {
            out.push(path);
        } else {
            log::warn!("dropping duplicate indexed directory {}", path.display());
            diagnostics.push(Diagnostic::Duplicate { path, recursive });
        }
    }
    out
}

fn collapse(paths: Vec<PathBuf>, diagnostics: &mut Vec<Diagnostic>) -> Vec<PathBuf> {
    let (kept, covered) = collapse_nested(paths);
    for entry in covered {
        log::warn!(
            "dropping recursive directory {} already covered by {}",
            entry.path.display(),
            entry.ancestor.display()
        );
        diagnostics.push(Diagnostic::CoveredByAncestor {
            path: entry.path,
            ancestor: entry.ancestor,
        });
    }
    kept
}
