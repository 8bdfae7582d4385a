use std::path::{Path, PathBuf};
use std::sync::Arc;

use fnv::FnvHashMap;

use super::task::TaskHandle;

/// Registry of outstanding tasks keyed by file.
///
/// A file holds more than one task only while an older task for it is part of
/// an in-flight batch.
#[derive(Debug)]
pub struct TaskPool {
    tasks: FnvHashMap<PathBuf, Vec<TaskHandle>>,
    len: usize,
    limit: usize,
}

impl TaskPool {
    pub fn new(limit: usize) -> Self {
        Self {
            tasks: FnvHashMap::default(),
            len: 0,
            limit,
        }
    }

    pub fn add(&mut self, task: TaskHandle) {
        self.tasks
            .entry(task.file().to_path_buf())
            .or_default()
            .push(task);
        self.len += 1;
    }

    /// Deregisters this exact task. Returns whether it was present.
    pub fn remove(&mut self, task: &TaskHandle) -> bool {
        let Some(entries) = self.tasks.get_mut(task.file()) else {
            return false;
        };
        let Some(index) = entries.iter().position(|entry| Arc::ptr_eq(entry, task)) else {
            return false;
        };
        entries.remove(index);
        if entries.is_empty() {
            self.tasks.remove(task.file());
        }
        self.len -= 1;
        true
    }

    pub fn find(&self, file: &Path) -> bool {
        self.tasks.contains_key(file)
    }

    pub fn tasks_for(&self, file: &Path) -> &[TaskHandle] {
        self.tasks.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Producers should wait for a flush before pushing more.
    pub fn limit_reached(&self) -> bool {
        self.len >= self.limit
    }
}
