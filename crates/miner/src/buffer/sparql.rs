
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::pool::TaskPool;
use super::store::TripleStore;
use super::task::{TaskHandle, WriteTask};
use crate::error::StoreError;

/// Where a file's mutations currently stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Unknown,
    Queued,
    Flushing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Flushed,
    Failed(StoreError),
    /// Shutdown interrupted the batch write.
    Cancelled,
}

/// Delivered once per batch, whatever the outcome.
#[derive(Debug, Clone)]
pub struct FlushReport {
    pub batch_id: u64,
    pub reason: String,
    /// Every task of the batch in write order.
    pub tasks: Vec<TaskHandle>,
    pub outcome: FlushOutcome,
}

impl FlushReport {
    pub fn is_success(&self) -> bool {
        self.outcome == FlushOutcome::Flushed
    }
}

/// Posted by the batch writer back to the owner of the buffer.
#[derive(Debug)]
pub struct BatchCompletion {
    pub batch_id: u64,
    pub outcome: FlushOutcome,
}

pub type FlushCallback = Box<dyn FnOnce(&FlushReport) + Send>;

struct InFlightBatch {
    id: u64,
    reason: String,
    tasks: Vec<TaskHandle>,
    callback: Option<FlushCallback>,
    started: Instant,
}

/// Accumulates write tasks and flushes them as single-flight batches.
///
/// The batch write runs on a spawned task; its result comes back through the
/// completion channel and must be handed to [`SparqlBuffer::complete`] by the
/// owner, so all state changes happen on the owner's task.
pub struct SparqlBuffer {
    store: Arc<dyn TripleStore>,
    pool: TaskPool,
    pending: Vec<TaskHandle>,
    in_flight: Option<InFlightBatch>,
    next_batch_id: u64,
    completions: mpsc::UnboundedSender<BatchCompletion>,
    cancel: CancellationToken,
}

impl fmt::Debug for SparqlBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparqlBuffer")
            .field("pool", &self.pool.len())
            .field("pending", &self.pending.len())
            .field("in_flight", &self.in_flight.as_ref().map(|batch| batch.id))
            .finish()
    }
}

impl SparqlBuffer {
    pub fn new(
        store: Arc<dyn TripleStore>,
        limit: usize,
        completions: mpsc::UnboundedSender<BatchCompletion>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            pool: TaskPool::new(limit),
            pending: Vec::new(),
            in_flight: None,
            next_batch_id: 1,
            completions,
            cancel,
        }
    }

    pub fn push(&mut self, task: WriteTask) -> TaskHandle {
        let task = Arc::new(task);
        self.pool.add(task.clone());
        self.pending.push(task.clone());
        task
    }

    /// Starts writing every pending task as one batch.
    ///
    /// Returns false when a batch is already in flight or nothing is pending.
    pub fn flush(&mut self, reason: &str, callback: Option<FlushCallback>) -> bool {
        if let Some(batch) = &self.in_flight {
            log::debug!(
                "sparql buffer flush skipped reason={} in_flight_batch={}",
                reason,
                batch.id
            );
            return false;
        }
        if self.pending.is_empty() {
            return false;
        }

        let tasks = std::mem::take(&mut self.pending);
        let statements: Vec<String> = tasks.iter().map(|task| task.payload().to_string()).collect();
        let batch_id = self.next_batch_id;
        self.next_batch_id += 1;

        log::debug!(
            "sparql buffer flush started batch={} reason={} tasks={}",
            batch_id,
            reason,
            tasks.len()
        );

        self.in_flight = Some(InFlightBatch {
            id: batch_id,
            reason: reason.to_string(),
            tasks,
            callback,
            started: Instant::now(),
        });

        let store = self.store.clone();
        let completions = self.completions.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => FlushOutcome::Cancelled,
                result = store.update_batch(statements) => match result {
                    Ok(()) => FlushOutcome::Flushed,
                    Err(error) => FlushOutcome::Failed(error),
                },
            };
            let _ = completions.send(BatchCompletion { batch_id, outcome });
        });

        true
    }

    /// Finishes the in-flight batch: clears the flight, drops its tasks from
    /// the pool and runs the flush callback.
    pub fn complete(&mut self, completion: BatchCompletion) -> Option<FlushReport> {
        match &self.in_flight {
            Some(batch) if batch.id == completion.batch_id => {}
            _ => {
                log::warn!(
                    "sparql buffer ignoring completion for unknown batch={}",
                    completion.batch_id
                );
                return None;
            }
        }
        let batch = self.in_flight.take()?;

        for task in &batch.tasks {
            self.pool.remove(task);
        }

        match &completion.outcome {
            FlushOutcome::Flushed => log::debug!(
                "sparql buffer flush finished batch={} tasks={} elapsed_ms={}",
                batch.id,
                batch.tasks.len(),
                batch.started.elapsed().as_millis()
            ),
            FlushOutcome::Failed(error) => log::warn!(
                "sparql buffer flush failed batch={} tasks={}: {}",
                batch.id,
                batch.tasks.len(),
                error
            ),
            FlushOutcome::Cancelled => log::info!(
                "sparql buffer flush cancelled batch={} tasks={}",
                batch.id,
                batch.tasks.len()
            ),
        }

        let report = FlushReport {
            batch_id: batch.id,
            reason: batch.reason,
            tasks: batch.tasks,
            outcome: completion.outcome,
        };
        if let Some(callback) = batch.callback {
            callback(&report);
        }
        Some(report)
    }

    /// Reports the most advanced state among the file's tasks.
    pub fn state_of(&self, file: &Path) -> BufferState {
        if !self.pool.find(file) {
            return BufferState::Unknown;
        }
        let flushing = self
            .in_flight
            .as_ref()
            .is_some_and(|batch| batch.tasks.iter().any(|task| task.file() == file));
        if flushing {
            return BufferState::Flushing;
        }
        if self.pending.iter().any(|task| task.file() == file) {
            BufferState::Queued
        } else {
            BufferState::Flushing
        }
    }

    pub fn is_flushing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight_count(&self) -> usize {
        usize::from(self.in_flight.is_some())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    pub fn limit_reached(&self) -> bool {
        self.pool.limit_reached()
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.pool.set_limit(limit);
    }
}
