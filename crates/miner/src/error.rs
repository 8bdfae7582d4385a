use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum MinerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, MinerError>;

/// Failure reported by the triple store for one whole batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("store update failed: {message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors surfaced to callers of the index-file interface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexRequestError {
    #[error("File '{0}' does not exist")]
    FileNotFound(PathBuf),

    #[error("Only directories can be processed: '{0}'")]
    DirectoriesOnly(PathBuf),

    #[error("File '{0}' is not eligible to be indexed")]
    NotEligible(PathBuf),

    #[error("Request for '{0}' was cancelled")]
    Cancelled(PathBuf),

    #[error("Indexing control plane is stopped")]
    Stopped,
}

/// Normalizes a path lexically: drops `.` components and trailing separators.
///
/// No filesystem access; symlinks are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}
