//! In-memory set of indexed roots.

mod filter;
mod flags;
mod indexing_tree;

pub use filter::{FilterKind, FilterPatterns, IndexFilters};
pub use flags::DirectoryFlags;
pub use indexing_tree::{AddRootOutcome, IndexedRoot, IndexingTree, RootIdLookup, TreeEvent};
