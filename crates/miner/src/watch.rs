//! On-demand indexing requests and per-requester watch ownership.


use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::attributes::FileAttributes;
use crate::config::ReconciledDirectories;
use crate::crawler::{CrawlPriority, Crawler};
use crate::error::{normalize_path, IndexRequestError};
use crate::paths::{is_direct_child, path_in_scope};
use crate::tree::{DirectoryFlags, IndexingTree, TreeEvent};
use crate::types::{FileInfo, RequesterId};

const FILE_URI_SCHEME: &str = "file://";

/// Request kinds accepted by the on-demand indexing interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexRequest {
    /// Index a file or directory now.
    IndexFile { uri: String },
    /// Index a file or directory and keep it watched while `requester` lives.
    IndexFileForProcess { uri: String, requester: RequesterId },
    /// Index a directory, optionally watched on behalf of a requester.
    IndexDirectory {
        uri: String,
        requester: Option<RequesterId>,
    },
}

impl IndexRequest {
    pub fn uri(&self) -> &str {
        match self {
            Self::IndexFile { uri }
            | Self::IndexFileForProcess { uri, .. }
            | Self::IndexDirectory { uri, .. } => uri,
        }
    }

    pub fn requester(&self) -> Option<&RequesterId> {
        match self {
            Self::IndexFile { .. } => None,
            Self::IndexFileForProcess { requester, .. } => Some(requester),
            Self::IndexDirectory { requester, .. } => requester.as_ref(),
        }
    }

    fn requires_directory(&self) -> bool {
        matches!(self, Self::IndexDirectory { .. })
    }
}

/// Converts a `file://` URI or an absolute path into a normalized path.
pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    let raw = match uri.strip_prefix(FILE_URI_SCHEME) {
        Some(rest) => {
            // Only local URIs: empty authority or "localhost".
            let rest = rest.strip_prefix("localhost").unwrap_or(rest);
            urlencoding::decode(rest).ok()?.into_owned()
        }
        None if uri.contains("://") => return None,
        None => uri.to_string(),
    };
    let path = PathBuf::from(raw);
    path.is_absolute().then(|| normalize_path(&path))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// A plain file was handed to the crawler.
    FileCheckScheduled,
    /// An existing root already covers the target and was refreshed.
    Refreshed { root: PathBuf },
    /// A new requester-owned root was added at the target.
    RootAdded { root: PathBuf },
}

impl IndexOutcome {
    pub fn root(&self) -> Option<&Path> {
        match self {
            Self::FileCheckScheduled => None,
            Self::Refreshed { root } | Self::RootAdded { root } => Some(root),
        }
    }
}

/// A request whose target was found on disk, ready to be applied.
#[derive(Debug, Clone)]
pub struct ProbedRequest {
    pub request: IndexRequest,
    pub path: PathBuf,
    pub info: FileInfo,
}

/// Administrative restriction on which paths may be indexed on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibilityPolicy {
    single: Vec<PathBuf>,
    recursive: Vec<PathBuf>,
}

impl EligibilityPolicy {
    pub fn from_directories(directories: &ReconciledDirectories) -> Self {
        Self {
            single: directories.single.clone(),
            recursive: directories.recursive.clone(),
        }
    }

    pub fn is_eligible(&self, path: &Path) -> bool {
        self.recursive
            .iter()
            .any(|root| path_in_scope(root, true, path))
            || self
                .single
                .iter()
                .any(|root| path == root || is_direct_child(root, path))
    }
}

#[derive(Debug, Default)]
struct WatchEntry {
    /// Created by a request rather than by configuration.
    requester_owned: bool,
    requesters: HashMap<RequesterId, usize>,
}

impl WatchEntry {
    fn watch_count(&self) -> usize {
        self.requesters.values().sum()
    }
}

#[derive(Debug, Default)]
pub struct WatchArbiter {
    watches: BTreeMap<PathBuf, WatchEntry>,
    /// On-demand roots absorbed into a configured root, still watched.
    suspended: BTreeMap<PathBuf, WatchEntry>,
    eligibility: Option<EligibilityPolicy>,
}

impl WatchArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_eligibility(&mut self, policy: Option<EligibilityPolicy>) {
        self.eligibility = policy;
    }

    /// Checks that the target exists and reads its type. Never touches the tree.
    pub async fn probe(
        attributes: &dyn FileAttributes,
        request: IndexRequest,
        cancel: &CancellationToken,
    ) -> Result<ProbedRequest, IndexRequestError> {
        let uri = request.uri().to_string();
        let Some(path) = file_uri_to_path(&uri) else {
            log::debug!("index request with unusable uri '{uri}'");
            return Err(IndexRequestError::FileNotFound(PathBuf::from(uri)));
        };

        let info = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IndexRequestError::Cancelled(path)),
            result = attributes.query_info(&path) => result,
        };
        match info {
            Ok(info) => Ok(ProbedRequest {
                request,
                path,
                info,
            }),
            Err(error) => {
                log::debug!("index request target {} unavailable: {error}", path.display());
                Err(IndexRequestError::FileNotFound(path))
            }
        }
    }

    /// Applies a probed request to the tree.
    pub fn apply(
        &mut self,
        tree: &mut IndexingTree,
        crawler: &dyn Crawler,
        probed: ProbedRequest,
    ) -> Result<IndexOutcome, IndexRequestError> {
        let ProbedRequest {
            request,
            path,
            info,
        } = probed;

        if let Some(policy) = &self.eligibility {
            if !policy.is_eligible(&path) {
                return Err(IndexRequestError::NotEligible(path));
            }
        }

        if !info.file_type.is_dir() {
            if request.requires_directory() {
                return Err(IndexRequestError::DirectoriesOnly(path));
            }
            crawler.check_file(&path, CrawlPriority::High);
            return Ok(IndexOutcome::FileCheckScheduled);
        }

        let owner = tree.resolve_owner(&path).map(|root| root.path.clone());
        let outcome = match owner {
            Some(root) => {
                tree.notify_update(&path, true);
                IndexOutcome::Refreshed { root }
            }
            None => {
                let added = tree.add_root(&path, DirectoryFlags::on_demand());
                if !added.is_live() {
                    // resolve_owner found no recursive ancestor, so this cannot happen.
                    log::warn!("on-demand root {} rejected: {:?}", path.display(), added);
                    return Err(IndexRequestError::NotEligible(path));
                }
                self.watches.entry(path.clone()).or_default().requester_owned = true;
                log::info!("on-demand root added root={}", path.display());
                IndexOutcome::RootAdded { root: path }
            }
        };

        if let (Some(requester), Some(root)) = (request.requester(), outcome.root()) {
            let entry = self.watches.entry(root.to_path_buf()).or_default();
            *entry.requesters.entry(requester.clone()).or_default() += 1;
            log::debug!(
                "watch registered root={} requester={} count={}",
                root.display(),
                requester,
                entry.watch_count()
            );
        }

        Ok(outcome)
    }

    /// Probes and applies a request in one go.
    pub async fn handle(
        &mut self,
        tree: &mut IndexingTree,
        attributes: &dyn FileAttributes,
        crawler: &dyn Crawler,
        request: IndexRequest,
        cancel: &CancellationToken,
    ) -> Result<IndexOutcome, IndexRequestError> {
        let probed = Self::probe(attributes, request, cancel).await?;
        self.apply(tree, crawler, probed)
    }

    /// Drops every watch held by `requester`. Requester-owned roots left
    /// without watchers are removed from the tree and returned.
    pub fn release(&mut self, tree: &mut IndexingTree, requester: &RequesterId) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        let mut emptied = Vec::new();

        for (root, entry) in &mut self.watches {
            if entry.requesters.remove(requester).is_none() {
                continue;
            }
            if entry.requesters.is_empty() {
                emptied.push((root.clone(), entry.requester_owned));
            }
        }

        for (root, requester_owned) in emptied {
            self.watches.remove(&root);
            if requester_owned && tree.remove_root(&root).is_some() {
                log::info!("on-demand root released root={} requester={}", root.display(), requester);
                removed.push(root);
            }
        }

        self.suspended.retain(|_, entry| {
            entry.requesters.remove(requester);
            !entry.requesters.is_empty()
        });

        removed
    }

    /// Re-adds suspended on-demand roots that no longer have a covering root.
    pub fn restore_suspended(&mut self, tree: &mut IndexingTree) -> Vec<PathBuf> {
        let uncovered: Vec<PathBuf> = self
            .suspended
            .keys()
            .filter(|path| tree.resolve_owner(path).is_none())
            .cloned()
            .collect();

        let mut restored = Vec::new();
        for path in uncovered {
            if !tree.add_root(&path, DirectoryFlags::on_demand()).is_live() {
                continue;
            }
            if let Some(mut entry) = self.suspended.remove(&path) {
                entry.requester_owned = true;
                log::info!(
                    "on-demand root restored root={} watchers={}",
                    path.display(),
                    entry.watch_count()
                );
                self.watches.insert(path.clone(), entry);
                restored.push(path);
            }
        }
        restored
    }

    /// Keeps watch records in line with root removals made elsewhere.
    pub fn handle_tree_event(&mut self, event: &TreeEvent) {
        match event {
            TreeEvent::RootRemoved { path, .. } => {
                if self.watches.remove(path).is_some() {
                    log::debug!("dropped watches for removed root {}", path.display());
                }
            }
            TreeEvent::RootAbsorbed { path, into } => {
                let Some(absorbed) = self.watches.remove(path) else {
                    return;
                };
                match self.watches.get_mut(into) {
                    Some(target) if target.requester_owned => {
                        for (requester, count) in absorbed.requesters {
                            *target.requesters.entry(requester).or_default() += count;
                        }
                    }
                    _ if absorbed.requester_owned && !absorbed.requesters.is_empty() => {
                        log::debug!(
                            "suspended on-demand root {} absorbed into {}",
                            path.display(),
                            into.display()
                        );
                        self.suspended.insert(path.clone(), absorbed);
                    }
                    _ => log::debug!(
                        "dropped watches for {} absorbed into {}",
                        path.display(),
                        into.display()
                    ),
                }
            }
            TreeEvent::RootAdded { .. }
            | TreeEvent::RootUpdated { .. }
            | TreeEvent::ChildUpdated { .. } => {}
        }
    }

    /// Marks a root as configured. Its watchers can no longer remove it.
    pub fn mark_static(&mut self, root: &Path) {
        if let Some(entry) = self.watches.get_mut(root) {
            entry.requester_owned = false;
        }
    }

    pub fn watch_count(&self, root: &Path) -> usize {
        self.watches.get(root).map_or(0, WatchEntry::watch_count)
    }

    pub fn is_requester_owned(&self, root: &Path) -> bool {
        self.watches
            .get(root)
            .is_some_and(|entry| entry.requester_owned)
    }

    pub fn is_watched(&self, root: &Path) -> bool {
        self.watch_count(root) > 0
    }

    pub fn is_suspended(&self, root: &Path) -> bool {
        self.suspended.contains_key(root)
    }
}
