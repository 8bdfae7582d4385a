use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MinerError, Result};

pub const MINER_SETTINGS_FILENAME: &str = "miner.json";

const DEFAULT_BUFFER_LIMIT: usize = 100;
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;
const ENV_LIST_SEPARATOR: char = ':';

fn default_single_directories() -> Vec<String> {
    vec!["$HOME".to_string()]
}

fn default_recursive_directories() -> Vec<String> {
    ["&DESKTOP", "&DOCUMENTS", "&DOWNLOAD", "&MUSIC", "&PICTURES", "&VIDEOS"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ignored_files() -> Vec<String> {
    [
        "*~", "*.o", "*.la", "*.lo", "*.loT", "*.in", "*.m4", "*.rej", "*.gmo", "*.orig", "*.pc",
        "*.omf", "*.aux", "*.tmp", "*.po", "*.vmdk", "*.vm*", "*.nvram", "*.part", "*.bak",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_ignored_directories() -> Vec<String> {
    ["po", "CVS", "core-dumps", "lost+found"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ignored_directories_with_content() -> Vec<String> {
    [".trackerignore", ".git", ".nomedia"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_buffer_limit() -> usize {
    DEFAULT_BUFFER_LIMIT
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

/// User-facing indexing configuration.
///
/// Directory lists hold raw entries (`&MUSIC`, `$HOME`, `~/src`, literal
/// paths); they are resolved and reconciled before reaching the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerSettings {
    #[serde(default = "default_single_directories")]
    pub index_single_directories: Vec<String>,
    #[serde(default = "default_recursive_directories")]
    pub index_recursive_directories: Vec<String>,
    #[serde(default = "default_ignored_files")]
    pub ignored_files: Vec<String>,
    #[serde(default = "default_ignored_directories")]
    pub ignored_directories: Vec<String>,
    #[serde(default = "default_ignored_directories_with_content")]
    pub ignored_directories_with_content: Vec<String>,
    #[serde(default = "default_true")]
    pub filter_hidden: bool,
    pub index_removable_devices: bool,
    #[serde(default = "default_true")]
    pub enable_monitors: bool,
    /// Reject on-demand requests outside the configured locations.
    pub require_location_in_config: bool,
    #[serde(default = "default_buffer_limit")]
    pub buffer_limit: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Where the configuration snapshot is persisted between runs.
    pub state_dir: Option<PathBuf>,
}

impl Default for MinerSettings {
    fn default() -> Self {
        Self {
            index_single_directories: default_single_directories(),
            index_recursive_directories: default_recursive_directories(),
            ignored_files: default_ignored_files(),
            ignored_directories: default_ignored_directories(),
            ignored_directories_with_content: default_ignored_directories_with_content(),
            filter_hidden: true,
            index_removable_devices: false,
            enable_monitors: true,
            require_location_in_config: false,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            state_dir: None,
        }
    }
}

/// Individually observable configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    SingleDirectories,
    RecursiveDirectories,
    IgnoredFiles,
    IgnoredDirectories,
    IgnoredDirectoriesWithContent,
    FilterHidden,
    IndexRemovableDevices,
    EnableMonitors,
    RequireLocationInConfig,
    BufferLimit,
    FlushInterval,
    StateDir,
}

impl SettingsKey {
    pub fn affects_directories(self) -> bool {
        matches!(self, Self::SingleDirectories | Self::RecursiveDirectories)
    }

    pub fn affects_filters(self) -> bool {
        matches!(
            self,
            Self::IgnoredFiles
                | Self::IgnoredDirectories
                | Self::IgnoredDirectoriesWithContent
                | Self::FilterHidden
        )
    }
}

impl MinerSettings {
    /// Loads settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                log::debug!("miner settings file {} missing, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(error) => return Err(error.into()),
        };
        serde_json::from_str(&data).map_err(|error| {
            MinerError::Config(format!("failed to parse {}: {error}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|error| MinerError::Serialization(error.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }

    /// Loads settings from `path` and applies `MINER_*` environment overrides.
    pub fn from_file_and_env(path: &Path) -> Result<Self> {
        let mut settings = Self::load(path)?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Applies overrides read through `lookup`. Lists are `:`-separated.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let list = |key: &str| {
            lookup(key).map(|value| {
                value
                    .split(ENV_LIST_SEPARATOR)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
        };
        let flag = |key: &str| lookup(key).and_then(|value| parse_bool(&value));

        if let Some(value) = list("MINER_INDEX_SINGLE_DIRECTORIES") {
            self.index_single_directories = value;
        }
        if let Some(value) = list("MINER_INDEX_RECURSIVE_DIRECTORIES") {
            self.index_recursive_directories = value;
        }
        if let Some(value) = list("MINER_IGNORED_FILES") {
            self.ignored_files = value;
        }
        if let Some(value) = list("MINER_IGNORED_DIRECTORIES") {
            self.ignored_directories = value;
        }
        if let Some(value) = list("MINER_IGNORED_DIRECTORIES_WITH_CONTENT") {
            self.ignored_directories_with_content = value;
        }
        if let Some(value) = flag("MINER_FILTER_HIDDEN") {
            self.filter_hidden = value;
        }
        if let Some(value) = flag("MINER_INDEX_REMOVABLE_DEVICES") {
            self.index_removable_devices = value;
        }
        if let Some(value) = flag("MINER_ENABLE_MONITORS") {
            self.enable_monitors = value;
        }
        if let Some(value) = flag("MINER_REQUIRE_LOCATION_IN_CONFIG") {
            self.require_location_in_config = value;
        }
        if let Some(value) = lookup("MINER_BUFFER_LIMIT").and_then(|v| v.parse().ok()) {
            self.buffer_limit = value;
        }
        if let Some(value) = lookup("MINER_FLUSH_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.flush_interval_ms = value;
        }
        if let Some(value) = lookup("MINER_STATE_DIR").filter(|v| !v.is_empty()) {
            self.state_dir = Some(PathBuf::from(value));
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    /// Keys whose values differ between `self` and `other`.
    pub fn changed_keys(&self, other: &Self) -> Vec<SettingsKey> {
        let mut keys = Vec::new();
        let mut check = |changed: bool, key: SettingsKey| {
            if changed {
                keys.push(key);
            }
        };
        check(
            self.index_single_directories != other.index_single_directories,
            SettingsKey::SingleDirectories,
        );
        check(
            self.index_recursive_directories != other.index_recursive_directories,
            SettingsKey::RecursiveDirectories,
        );
        check(self.ignored_files != other.ignored_files, SettingsKey::IgnoredFiles);
        check(
            self.ignored_directories != other.ignored_directories,
            SettingsKey::IgnoredDirectories,
        );
        check(
            self.ignored_directories_with_content != other.ignored_directories_with_content,
            SettingsKey::IgnoredDirectoriesWithContent,
        );
        check(self.filter_hidden != other.filter_hidden, SettingsKey::FilterHidden);
        check(
            self.index_removable_devices != other.index_removable_devices,
            SettingsKey::IndexRemovableDevices,
        );
        check(self.enable_monitors != other.enable_monitors, SettingsKey::EnableMonitors);
        check(
            self.require_location_in_config != other.require_location_in_config,
            SettingsKey::RequireLocationInConfig,
        );
        check(self.buffer_limit != other.buffer_limit, SettingsKey::BufferLimit);
        check(self.flush_interval_ms != other.flush_interval_ms, SettingsKey::FlushInterval);
        check(self.state_dir != other.state_dir, SettingsKey::StateDir);
        keys
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
