//! Buffered, single-flight batch writes to the triple store.

mod pool;
mod sparql;
mod store;
mod task;

pub use pool::TaskPool;
pub use sparql::{
    BatchCompletion, BufferState, FlushCallback, FlushOutcome, FlushReport, SparqlBuffer,
};
pub use store::{MemoryStore, TripleStore};
pub use task::{TaskHandle, WriteTask};
