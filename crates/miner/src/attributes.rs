//! Filesystem metadata queries used for existence checks and identity.

use std::io;
use std::path::Path;

use async_trait::async_trait;

use crate::paths::has_hidden_basename;
use crate::types::{FileInfo, FileType};

#[cfg(target_os = "linux")]
const DISK_BY_UUID: &str = "/dev/disk/by-uuid";

#[async_trait]
pub trait FileAttributes: Send + Sync {
    /// Queries metadata for `path` without following symlinks.
    async fn query_info(&self, path: &Path) -> io::Result<FileInfo>;

    /// Returns an opaque volume id for the filesystem holding `dir`, if the
    /// platform can supply one.
    async fn volume_id(&self, dir: &Path) -> Option<String>;
}

/// Attributes read from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileAttributes;

#[async_trait]
impl FileAttributes for LocalFileAttributes {
    async fn query_info(&self, path: &Path) -> io::Result<FileInfo> {
        let metadata = tokio::fs::symlink_metadata(path).await?;
        let file_type = metadata.file_type();
        let file_type = if file_type.is_symlink() {
            FileType::Symlink
        } else if file_type.is_dir() {
            FileType::Directory
        } else if file_type.is_file() {
            FileType::File
        } else {
            FileType::Other
        };
        let is_hidden = has_hidden_basename(path);

        #[cfg(unix)]
        let (inode, filesystem_id) = {
            use std::os::unix::fs::MetadataExt;
            (Some(metadata.ino()), Some(format!("{:x}", metadata.dev())))
        };
        #[cfg(not(unix))]
        let (inode, filesystem_id) = (None, None);

        Ok(FileInfo {
            file_type,
            inode,
            filesystem_id,
            is_hidden,
        })
    }

    #[cfg(target_os = "linux")]
    async fn volume_id(&self, dir: &Path) -> Option<String> {
        use std::os::unix::fs::MetadataExt;

        let device = tokio::fs::metadata(dir).await.ok()?.dev();
        let mut entries = match tokio::fs::read_dir(DISK_BY_UUID).await {
            Ok(entries) => entries,
            Err(error) => {
                log::debug!("volume id lookup unavailable: {error}");
                return None;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            // Entries are symlinks to block devices; follow them.
            let Ok(metadata) = tokio::fs::metadata(entry.path()).await else {
                continue;
            };
            if metadata.rdev() == device {
                return entry.file_name().to_str().map(str::to_string);
            }
        }
        None
    }

    #[cfg(not(target_os = "linux"))]
    async fn volume_id(&self, _dir: &Path) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_info_reports_type_and_hidden() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join(".hidden.txt");
        std::fs::write(&file, b"x").expect("write");

        let attrs = LocalFileAttributes;
        let info = attrs.query_info(&file).await.expect("info");
        assert_eq!(info.file_type, FileType::File);
        assert!(info.is_hidden);

        let info = attrs.query_info(dir.path()).await.expect("info");
        assert_eq!(info.file_type, FileType::Directory);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn inode_survives_rename() {
        let dir = tempfile::tempdir().expect("tempdir");
        let before = dir.path().join("a.txt");
        let after = dir.path().join("b.txt");
        std::fs::write(&before, b"x").expect("write");

        let attrs = LocalFileAttributes;
        let first = attrs.query_info(&before).await.expect("info");
        std::fs::rename(&before, &after).expect("rename");
        let second = attrs.query_info(&after).await.expect("info");
        assert_eq!(first.inode, second.inode);
        assert_eq!(first.filesystem_id, second.filesystem_id);
    }

    #[tokio::test]
    async fn query_info_on_missing_path_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = LocalFileAttributes
            .query_info(&dir.path().join("missing"))
            .await
            .expect_err("missing");
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }
}
