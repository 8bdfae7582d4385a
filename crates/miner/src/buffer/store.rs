use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;

/// Backing triple store. A batch is accepted or rejected as a whole.
#[async_trait]
pub trait TripleStore: Send + Sync {
    async fn update_batch(&self, statements: Vec<String>) -> Result<(), StoreError>;
}

/// Store that keeps accepted batches in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: Mutex<Vec<Vec<String>>>,
    fail_next: Mutex<Option<StoreError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }

    /// Makes the next batch fail with `error`.
    pub fn fail_next(&self, error: StoreError) {
        *self.fail_next.lock() = Some(error);
    }
}

#[async_trait]
impl TripleStore for MemoryStore {
    async fn update_batch(&self, statements: Vec<String>) -> Result<(), StoreError> {
        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }
        self.batches.lock().push(statements);
        Ok(())
    }
}
