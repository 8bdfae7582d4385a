use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One pending graph mutation about one file.
#[derive(Debug, PartialEq, Eq)]
pub struct WriteTask {
    file: PathBuf,
    payload: String,
}

/// Shared handle to a task. The pool and an in-flight batch may both hold one.
pub type TaskHandle = Arc<WriteTask>;

impl WriteTask {
    pub fn new(file: impl Into<PathBuf>, payload: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            payload: payload.into(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Serialized update statement sent to the store.
    pub fn payload(&self) -> &str {
        &self.payload
    }
}
