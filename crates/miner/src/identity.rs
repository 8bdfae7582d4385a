//! Volume-relative content identifiers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::attributes::FileAttributes;
use crate::error::{MinerError, Result};
use crate::tree::{IndexingTree, RootIdLookup};
use crate::types::FileInfo;

const CONTENT_ID_PREFIX: &str = "urn:fileid:";

/// `urn:fileid:<volume-id>:<local-id>`. Both components are opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentIdentifier {
    volume_id: String,
    local_id: String,
}

impl ContentIdentifier {
    pub fn new(volume_id: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self {
            volume_id: volume_id.into(),
            local_id: local_id.into(),
        }
    }

    pub fn volume_id(&self) -> &str {
        &self.volume_id
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn is_degraded(&self) -> bool {
        self.volume_id.is_empty()
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CONTENT_ID_PREFIX}{}:{}", self.volume_id, self.local_id)
    }
}

/// Work left to do after the tree was consulted synchronously.
#[derive(Debug, Clone)]
pub struct IdentityPlan {
    pub file: PathBuf,
    pub lookup: RootIdLookup,
}

/// Outcome of the asynchronous half of an identification.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub identifier: ContentIdentifier,
    /// Root id probed on the way, to be cached in the tree.
    pub probed_root: Option<(PathBuf, Option<String>)>,
}

#[derive(Clone)]
pub struct IdentityResolver {
    attributes: Arc<dyn FileAttributes>,
}

impl IdentityResolver {
    pub fn new(attributes: Arc<dyn FileAttributes>) -> Self {
        Self { attributes }
    }

    /// Synchronous step: read what the tree knows about the file's owner.
    pub fn plan(tree: &IndexingTree, file: &Path) -> IdentityPlan {
        IdentityPlan {
            file: file.to_path_buf(),
            lookup: tree.root_id_lookup(file),
        }
    }

    /// Asynchronous step: query the file and, if needed, its root's volume.
    pub async fn resolve(&self, plan: IdentityPlan) -> Result<ResolvedIdentity> {
        let info = self
            .attributes
            .query_info(&plan.file)
            .await
            .map_err(|error| match error.kind() {
                std::io::ErrorKind::NotFound => MinerError::PathNotFound(plan.file.clone()),
                _ => MinerError::Io(error),
            })?;

        let (root_id, probed_root) = match plan.lookup {
            RootIdLookup::Uncovered => (None, None),
            RootIdLookup::Known(root_id) => (root_id, None),
            RootIdLookup::Unprobed(root) => {
                let root_id = self.attributes.volume_id(&root).await;
                (root_id.clone(), Some((root, root_id)))
            }
        };

        Ok(ResolvedIdentity {
            identifier: compose(root_id, &info),
            probed_root,
        })
    }

    /// Caches any probed root id in the tree and hands back the identifier.
    pub fn finish(tree: &mut IndexingTree, resolved: ResolvedIdentity) -> ContentIdentifier {
        if let Some((root, root_id)) = resolved.probed_root {
            tree.record_root_id(&root, root_id);
        }
        resolved.identifier
    }

    /// Identifies `file` end to end when the caller owns the tree.
    pub async fn identify(&self, tree: &mut IndexingTree, file: &Path) -> Result<ContentIdentifier> {
        let plan = Self::plan(tree, file);
        let resolved = self.resolve(plan).await?;
        Ok(Self::finish(tree, resolved))
    }
}

fn compose(root_id: Option<String>, info: &FileInfo) -> ContentIdentifier {
    let volume_id = root_id
        .or_else(|| info.filesystem_id.clone())
        .unwrap_or_default();
    let local_id = info.inode.map(|inode| inode.to_string()).unwrap_or_default();
    if volume_id.is_empty() {
        log::debug!("content identifier formed without volume id");
    }
    ContentIdentifier::new(volume_id, local_id)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::FakeAttributes;
    use crate::tree::DirectoryFlags;

    fn setup() -> (Arc<FakeAttributes>, IdentityResolver, IndexingTree) {
        let attrs = Arc::new(FakeAttributes::default());
        attrs.add_dir("/vol", 1);
        attrs.add_file("/vol/a.txt", 42);
        attrs.add_file("/loose.txt", 7);
        attrs.add_volume("/vol", "3f2a-uuid");
        let resolver = IdentityResolver::new(attrs.clone());
        let mut tree = IndexingTree::default();
        tree.add_root(Path::new("/vol"), DirectoryFlags::RECURSE);
        (attrs, resolver, tree)
    }

    #[tokio::test]
    async fn identifier_uses_root_volume_and_inode() {
        let (_, resolver, mut tree) = setup();
        let id = resolver.identify(&mut tree, Path::new("/vol/a.txt")).await.unwrap();
        assert_eq!(id.to_string(), "urn:fileid:3f2a-uuid:42");
        assert!(!id.is_degraded());
    }

    #[tokio::test]
    async fn identifier_is_stable_and_root_probed_once() {
        let (attrs, resolver, mut tree) = setup();
        let first = resolver.identify(&mut tree, Path::new("/vol/a.txt")).await.unwrap();
        let second = resolver.identify(&mut tree, Path::new("/vol/a.txt")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(attrs.volume_probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rename_within_volume_keeps_volume_id() {
        let (attrs, resolver, mut tree) = setup();
        let before = resolver.identify(&mut tree, Path::new("/vol/a.txt")).await.unwrap();
        attrs.rename("/vol/a.txt", "/vol/sub/b.txt");
        let after = resolver.identify(&mut tree, Path::new("/vol/sub/b.txt")).await.unwrap();
        assert_eq!(before.volume_id(), after.volume_id());
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn uncovered_file_falls_back_to_filesystem_id() {
        let (_, resolver, mut tree) = setup();
        let id = resolver.identify(&mut tree, Path::new("/loose.txt")).await.unwrap();
        assert_eq!(id.to_string(), "urn:fileid:fs0:7");
    }

    #[tokio::test]
    async fn missing_volume_information_degrades_instead_of_failing() {
        let attrs = Arc::new(FakeAttributes::default());
        attrs.add_dir("/r", 1);
        let resolver = IdentityResolver::new(attrs.clone());
        let mut tree = IndexingTree::default();
        tree.add_root(Path::new("/r"), DirectoryFlags::RECURSE);

        let plan = IdentityResolver::plan(&tree, Path::new("/r"));
        let mut resolved = resolver.resolve(plan).await.unwrap();
        assert_eq!(resolved.identifier.volume_id(), "fs0");

        resolved.identifier = compose(
            None,
            &FileInfo {
                filesystem_id: None,
                inode: Some(9),
                ..FileInfo::file()
            },
        );
        let id = IdentityResolver::finish(&mut tree, resolved);
        assert_eq!(id.to_string(), "urn:fileid::9");
        assert!(id.is_degraded());
        assert_eq!(tree.root_id_lookup(Path::new("/r")), RootIdLookup::Known(None));
    }

    #[tokio::test]
    async fn missing_file_is_path_not_found() {
        let (_, resolver, mut tree) = setup();
        let error = resolver
            .identify(&mut tree, Path::new("/vol/gone"))
            .await
            .unwrap_err();
        assert!(matches!(error, MinerError::PathNotFound(_)));
    }
}
