//! Name-based filters applied to files and directories below indexed roots.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};

use crate::types::FileType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    File,
    Directory,
    ParentDirectory,
}

/// The raw pattern lists a filter set was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPatterns {
    pub files: Vec<String>,
    pub directories: Vec<String>,
    pub parent_markers: Vec<String>,
    pub filter_hidden: bool,
}

/// Compiled filters. Patterns match against the final path component only.
#[derive(Debug, Clone)]
pub struct IndexFilters {
    patterns: FilterPatterns,
    files: Gitignore,
    directories: Gitignore,
}

impl Default for IndexFilters {
    fn default() -> Self {
        Self {
            patterns: FilterPatterns::default(),
            files: Gitignore::empty(),
            directories: Gitignore::empty(),
        }
    }
}

impl IndexFilters {
    /// Compiles the given patterns. Invalid entries are logged and skipped.
    pub fn new(patterns: FilterPatterns) -> Self {
        let files = compile(&patterns.files, FilterKind::File);
        let directories = compile(&patterns.directories, FilterKind::Directory);
        let markers: Vec<String> = patterns
            .parent_markers
            .iter()
            .filter(|marker| {
                let valid = is_valid_marker(marker);
                if !valid {
                    log::warn!("ignoring invalid parent directory marker '{marker}', must be a plain file name");
                }
                valid
            })
            .cloned()
            .collect();

        Self {
            patterns: FilterPatterns {
                parent_markers: markers,
                ..patterns
            },
            files,
            directories,
        }
    }

    pub fn patterns(&self) -> &FilterPatterns {
        &self.patterns
    }

    pub fn filter_hidden(&self) -> bool {
        self.patterns.filter_hidden
    }

    pub fn set_filter_hidden(&mut self, filter_hidden: bool) {
        self.patterns.filter_hidden = filter_hidden;
    }

    /// Checks whether the basename of `path` matches a filter of `kind`.
    pub fn matches(&self, path: &Path, kind: FilterKind) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = Path::new(name);
        match kind {
            FilterKind::File => self.files.matched(name, false).is_ignore(),
            FilterKind::Directory => self.directories.matched(name, true).is_ignore(),
            FilterKind::ParentDirectory => self
                .patterns
                .parent_markers
                .iter()
                .any(|marker| name == Path::new(marker)),
        }
    }

    /// Checks file-name filters for an entry of the given type.
    pub fn is_filtered(&self, path: &Path, file_type: FileType, is_hidden: bool) -> bool {
        if self.patterns.filter_hidden && is_hidden {
            return true;
        }
        let kind = if file_type.is_dir() {
            FilterKind::Directory
        } else {
            FilterKind::File
        };
        self.matches(path, kind)
    }

    /// Checks whether `dir` contains any of the configured marker files.
    pub fn has_marker_child(&self, dir: &Path) -> bool {
        self.patterns
            .parent_markers
            .iter()
            .any(|marker| dir.join(marker).exists())
    }
}

fn compile(patterns: &[String], kind: FilterKind) -> Gitignore {
    let mut builder = GitignoreBuilder::new("/");
    for pattern in patterns {
        if Path::new(pattern).is_absolute() {
            log::warn!("ignoring absolute {kind:?} filter pattern '{pattern}', only basenames are matched");
            continue;
        }
        if let Err(error) = builder.add_line(None, pattern) {
            log::warn!("ignoring invalid {kind:?} filter pattern '{pattern}': {error}");
        }
    }
    builder.build().unwrap_or_else(|error| {
        log::warn!("failed to compile {kind:?} filters: {error}");
        Gitignore::empty()
    })
}

fn is_valid_marker(marker: &str) -> bool {
    !marker.is_empty()
        && !marker.contains('/')
        && !marker.contains(['*', '?', '[', ']'])
}
