//! In-crate fakes for the external collaborators.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::attributes::FileAttributes;
use crate::crawler::{CrawlPriority, Crawler};
use crate::tree::TreeEvent;
use crate::types::{FileInfo, FileType};

#[derive(Default)]
pub(crate) struct FakeAttributes {
    files: Mutex<HashMap<PathBuf, FileInfo>>,
    volumes: Mutex<HashMap<PathBuf, String>>,
    delay: Mutex<Option<Duration>>,
    pub volume_probes: AtomicUsize,
}

impl FakeAttributes {
    pub fn add_dir(&self, path: &str, inode: u64) {
        self.insert(path, FileType::Directory, inode);
    }

    pub fn add_file(&self, path: &str, inode: u64) {
        self.insert(path, FileType::File, inode);
    }

    pub fn add_volume(&self, root: &str, id: &str) {
        self.volumes.lock().insert(PathBuf::from(root), id.to_string());
    }

    pub fn rename(&self, from: &str, to: &str) {
        let mut files = self.files.lock();
        if let Some(info) = files.remove(Path::new(from)) {
            files.insert(PathBuf::from(to), info);
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    fn insert(&self, path: &str, file_type: FileType, inode: u64) {
        self.files.lock().insert(
            PathBuf::from(path),
            FileInfo {
                file_type,
                inode: Some(inode),
                filesystem_id: Some("fs0".to_string()),
                is_hidden: crate::paths::has_hidden_basename(Path::new(path)),
            },
        );
    }
}

#[async_trait]
impl FileAttributes for FakeAttributes {
    async fn query_info(&self, path: &Path) -> io::Result<FileInfo> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    async fn volume_id(&self, dir: &Path) -> Option<String> {
        self.volume_probes.fetch_add(1, Ordering::SeqCst);
        self.volumes.lock().get(dir).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CrawlCall {
    Check(PathBuf, CrawlPriority),
    Tree(TreeEvent),
}

#[derive(Default)]
pub(crate) struct RecordingCrawler {
    calls: Mutex<Vec<CrawlCall>>,
}

impl RecordingCrawler {
    pub fn calls(&self) -> Vec<CrawlCall> {
        self.calls.lock().clone()
    }

    pub fn checked(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                CrawlCall::Check(path, _) => Some(path.clone()),
                CrawlCall::Tree(_) => None,
            })
            .collect()
    }
}

impl Crawler for RecordingCrawler {
    fn check_file(&self, file: &Path, priority: CrawlPriority) {
        self.calls
            .lock()
            .push(CrawlCall::Check(file.to_path_buf(), priority));
    }

    fn tree_changed(&self, event: &TreeEvent) {
        self.calls.lock().push(CrawlCall::Tree(event.clone()));
    }
}
