//! Interface to the crawl side of the indexer.
//!
//! The crawler walks roots, watches for changes and produces write tasks. The
//! control plane only tells it what to look at.

use std::path::Path;

use crate::tree::TreeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPriority {
    Default,
    High,
}

pub trait Crawler: Send + Sync {
    /// Schedules a freshness check of one file.
    fn check_file(&self, file: &Path, priority: CrawlPriority);

    /// Reacts to a change of the root set.
    fn tree_changed(&self, event: &TreeEvent);
}

/// Crawler that only logs what it is asked to do.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCrawler;

impl Crawler for LoggingCrawler {
    fn check_file(&self, file: &Path, priority: CrawlPriority) {
        log::debug!("crawl check file={} priority={:?}", file.display(), priority);
    }

    fn tree_changed(&self, event: &TreeEvent) {
        log::debug!("crawl tree event {:?}", event);
    }
}
