//! Applies configuration and volume changes to the indexing tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{
    ConfigChange, DirectorySetReconciler, MinerSettings, PathResolver, ReconciledDirectories,
    SettingsKey,
};
use crate::tree::{AddRootOutcome, DirectoryFlags, FilterPatterns, IndexFilters, IndexingTree};
use crate::watch::EligibilityPolicy;

const SYSTEM_LOCATIONS: [&str; 4] = ["/dev", "/lib", "/proc", "/sys"];

/// A mounted volume as reported by the volume monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub path: PathBuf,
    pub uuid: Option<String>,
    pub removable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeEvent {
    Mounted(MountPoint),
    Unmounted(PathBuf),
}

pub struct Controller {
    resolver: PathResolver,
    directories: ReconciledDirectories,
    mounts: BTreeMap<PathBuf, MountPoint>,
    system_locations: Vec<PathBuf>,
    index_removable_devices: bool,
    enable_monitors: bool,
}

impl Controller {
    pub fn new(resolver: PathResolver) -> Self {
        let mut system_locations: Vec<PathBuf> =
            SYSTEM_LOCATIONS.iter().map(PathBuf::from).collect();
        system_locations.push(std::env::temp_dir());
        Self {
            resolver,
            directories: ReconciledDirectories::default(),
            mounts: BTreeMap::new(),
            system_locations,
            index_removable_devices: false,
            enable_monitors: true,
        }
    }

    /// Replaces the locations that are never indexed.
    pub fn with_system_locations(mut self, locations: Vec<PathBuf>) -> Self {
        self.system_locations = locations;
        self
    }

    pub fn directories(&self) -> &ReconciledDirectories {
        &self.directories
    }

    pub fn mounts(&self) -> impl Iterator<Item = &MountPoint> {
        self.mounts.values()
    }

    /// Builds the initial root set from `settings`.
    pub fn initialize(&mut self, tree: &mut IndexingTree, settings: &MinerSettings) {
        self.index_removable_devices = settings.index_removable_devices;
        self.enable_monitors = settings.enable_monitors;
        tree.set_filters(filters_from(settings));

        self.directories = self.reconcile(settings);
        self.sync_roots(tree);
        if self.index_removable_devices {
            self.add_removable_mounts(tree);
        }

        log::info!(
            "indexing controller initialized single={} recursive={} roots={}",
            self.directories.single.len(),
            self.directories.recursive.len(),
            tree.len()
        );
    }

    /// Applies a settings change. Returns the roots removed from the tree.
    pub fn apply_settings(
        &mut self,
        tree: &mut IndexingTree,
        settings: &MinerSettings,
        change: &ConfigChange,
    ) -> Vec<PathBuf> {
        let mut removed = Vec::new();

        if change.touches_filters() {
            tree.set_filters(filters_from(settings));
            tree.update_all();
        }

        let monitors_changed = change.keys.contains(&SettingsKey::EnableMonitors);
        self.enable_monitors = settings.enable_monitors;

        if change.touches_directories() {
            let next = self.reconcile(settings);
            for (path, _) in self.directories.roots() {
                if next.roots().any(|(candidate, _)| candidate == path) {
                    continue;
                }
                if let Some(root) = tree.root(path) {
                    let flags = root.flags - DirectoryFlags::PRESERVE;
                    tree.add_root(path, flags);
                    if tree.remove_root(path).is_some() {
                        removed.push(path.clone());
                    }
                }
            }
            self.directories = next;
        }

        if change.touches_directories() || monitors_changed {
            self.sync_roots(tree);
        }

        if change.keys.contains(&SettingsKey::IndexRemovableDevices) {
            self.index_removable_devices = settings.index_removable_devices;
            if self.index_removable_devices {
                self.add_removable_mounts(tree);
            } else {
                removed.extend(self.remove_removable_mounts(tree));
            }
        }

        if !removed.is_empty() {
            log::info!("indexing controller removed roots={:?}", removed);
        }
        removed
    }

    /// Re-adds configured roots left uncovered by a removal elsewhere, such
    /// as the release of an on-demand root that had absorbed them.
    pub fn restore_configured_roots(&self, tree: &mut IndexingTree) {
        self.sync_roots(tree);
    }

    pub fn handle_volume_event(&mut self, tree: &mut IndexingTree, event: VolumeEvent) {
        match event {
            VolumeEvent::Mounted(mount) => {
                log::info!(
                    "volume mounted path={} removable={} uuid={:?}",
                    mount.path.display(),
                    mount.removable,
                    mount.uuid
                );
                let path = mount.path.clone();
                let removable = mount.removable;
                self.mounts.insert(path.clone(), mount);
                if removable {
                    if self.index_removable_devices {
                        self.add_indexed_directory(tree, &path, self.volume_flags());
                    }
                } else {
                    self.sync_roots_under(tree, &path);
                }
            }
            VolumeEvent::Unmounted(path) => {
                let Some(mount) = self.mounts.remove(&path) else {
                    return;
                };
                log::info!("volume unmounted path={}", path.display());
                if mount.removable {
                    tree.remove_root(&path);
                    return;
                }
                let inside: Vec<PathBuf> = tree
                    .list_roots()
                    .into_iter()
                    .map(|root| root.path)
                    .filter(|root| root.starts_with(&path))
                    .collect();
                for root in inside {
                    if let Some(flags) = tree.root(&root).map(|r| r.flags) {
                        tree.add_root(&root, flags | DirectoryFlags::PRESERVE);
                    }
                    tree.remove_root(&root);
                }
            }
        }
    }

    /// Policy for on-demand requests, when restricted to configured locations.
    pub fn eligibility_policy(&self, settings: &MinerSettings) -> Option<EligibilityPolicy> {
        settings
            .require_location_in_config
            .then(|| EligibilityPolicy::from_directories(&self.directories))
    }

    pub fn is_system_location(&self, path: &Path) -> bool {
        self.system_locations
            .iter()
            .any(|location| path.starts_with(location))
    }

    fn reconcile(&self, settings: &MinerSettings) -> ReconciledDirectories {
        DirectorySetReconciler::new(&self.resolver).reconcile(
            &settings.index_single_directories,
            &settings.index_recursive_directories,
        )
    }

    fn add_indexed_directory(
        &self,
        tree: &mut IndexingTree,
        path: &Path,
        flags: DirectoryFlags,
    ) -> Option<AddRootOutcome> {
        if self.is_system_location(path) {
            log::warn!("refusing to index system location {}", path.display());
            return None;
        }
        let outcome = tree.add_root(path, flags);
        if let AddRootOutcome::Covered { ancestor } = &outcome {
            log::debug!(
                "configured directory {} already covered by {}",
                path.display(),
                ancestor.display()
            );
        }
        Some(outcome)
    }

    fn sync_roots(&self, tree: &mut IndexingTree) {
        for (path, recursive) in self.directories.roots() {
            self.add_indexed_directory(tree, path, self.config_flags(path, recursive));
        }
    }

    fn sync_roots_under(&self, tree: &mut IndexingTree, mount: &Path) {
        for (path, recursive) in self.directories.roots() {
            if path.starts_with(mount) {
                self.add_indexed_directory(tree, path, self.config_flags(path, recursive));
            }
        }
    }

    fn config_flags(&self, path: &Path, recursive: bool) -> DirectoryFlags {
        let mut flags = DirectoryFlags::CHECK_MTIME;
        if recursive {
            flags |= DirectoryFlags::RECURSE;
        }
        if self.enable_monitors {
            flags |= DirectoryFlags::MONITOR;
        }
        let on_removable = self
            .mounts
            .values()
            .any(|mount| mount.removable && path.starts_with(&mount.path));
        if on_removable {
            flags |= DirectoryFlags::IS_VOLUME | DirectoryFlags::PRESERVE;
        }
        flags
    }

    fn volume_flags(&self) -> DirectoryFlags {
        let mut flags = DirectoryFlags::removable_volume();
        if self.enable_monitors {
            flags |= DirectoryFlags::MONITOR;
        }
        flags
    }

    fn add_removable_mounts(&self, tree: &mut IndexingTree) {
        let flags = self.volume_flags();
        for mount in self.mounts.values().filter(|mount| mount.removable) {
            self.add_indexed_directory(tree, &mount.path, flags);
        }
    }

    fn remove_removable_mounts(&self, tree: &mut IndexingTree) -> Vec<PathBuf> {
        self.mounts
            .values()
            .filter(|mount| mount.removable)
            .filter_map(|mount| tree.remove_root(&mount.path).map(|root| root.path))
            .collect()
    }
}

pub fn filters_from(settings: &MinerSettings) -> IndexFilters {
    IndexFilters::new(FilterPatterns {
        files: settings.ignored_files.clone(),
        directories: settings.ignored_directories.clone(),
        parent_markers: settings.ignored_directories_with_content.clone(),
        filter_hidden: settings.filter_hidden,
    })
}
