//! Indexing control plane for a desktop metadata miner.
//!
//! This crate decides what gets indexed and when:
//! - Resolution of configured directory aliases and their reconciliation
//! - The indexing tree of roots, flags and filters
//! - On-demand indexing requests with per-requester watch ownership
//! - Content identifiers built from volume and inode ids
//! - A single-flight buffer batching writes to the triple store

pub mod attributes;
pub mod buffer;
pub mod config;
pub mod controller;
pub mod crawler;
pub mod error;
pub mod identity;
pub mod paths;
pub mod runtime;
pub mod tree;
pub mod types;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::error::{IndexRequestError, MinerError, Result, StoreError};
pub use crate::runtime::{spawn_miner, MinerHandle, MinerServices};
pub use crate::types::{FileInfo, FileType, RequesterId};
