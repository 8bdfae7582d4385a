//! Shared value types passed between the control-plane components.

use std::fmt;

use serde::{Deserialize, Serialize};

/// File type as reported by a metadata query. Symlinks are never followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
    Symlink,
    Other,
}

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
            Self::Other => "other",
        }
    }

    pub fn is_dir(self) -> bool {
        self == Self::Directory
    }
}

/// Result of a metadata query on one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub file_type: FileType,
    /// Filesystem-local file id (inode number on unix).
    pub inode: Option<u64>,
    /// Identifier of the filesystem the file lives on.
    pub filesystem_id: Option<String>,
    pub is_hidden: bool,
}

impl FileInfo {
    pub fn directory() -> Self {
        Self {
            file_type: FileType::Directory,
            inode: None,
            filesystem_id: None,
            is_hidden: false,
        }
    }

    pub fn file() -> Self {
        Self {
            file_type: FileType::File,
            ..Self::directory()
        }
    }
}

/// Identity of an external process asking for files to be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequesterId(String);

impl RequesterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
