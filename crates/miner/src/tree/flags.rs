use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-root indexing behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DirectoryFlags: u32 {
        /// Coverage extends to all descendants.
        const RECURSE = 1 << 0;
        /// Changes below the root are monitored.
        const MONITOR = 1 << 1;
        /// Crawl ahead of other roots.
        const PRIORITY = 1 << 2;
        /// Compare modification times against the store on crawl.
        const CHECK_MTIME = 1 << 3;
        /// Root is the mount point of a removable volume.
        const IS_VOLUME = 1 << 4;
        /// Keep indexed data when the root goes away.
        const PRESERVE = 1 << 5;
    }
}

impl DirectoryFlags {
    /// Flags given to roots created by on-demand requests.
    pub fn on_demand() -> Self {
        Self::RECURSE | Self::PRIORITY | Self::CHECK_MTIME | Self::MONITOR
    }

    /// Flags given to mount points of removable volumes.
    pub fn removable_volume() -> Self {
        Self::RECURSE | Self::PRESERVE | Self::PRIORITY | Self::IS_VOLUME
    }

    pub fn is_recursive(self) -> bool {
        self.contains(Self::RECURSE)
    }
}
