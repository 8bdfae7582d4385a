use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::settings::{MinerSettings, SettingsKey};

/// Discrete notification that some settings keys changed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub keys: Vec<SettingsKey>,
}

impl ConfigChange {
    pub fn touches_directories(&self) -> bool {
        self.keys.iter().any(|key| key.affects_directories())
    }

    pub fn touches_filters(&self) -> bool {
        self.keys.iter().any(|key| key.affects_filters())
    }
}

/// Owner of the live settings. Subscribers read a fresh snapshot after each change.
pub struct ConfigService {
    settings: RwLock<MinerSettings>,
    changes: broadcast::Sender<ConfigChange>,
}

impl ConfigService {
    pub fn new(settings: MinerSettings) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            settings: RwLock::new(settings),
            changes,
        }
    }

    pub fn snapshot(&self) -> MinerSettings {
        self.settings.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.changes.subscribe()
    }

    /// Replaces the settings. Returns the change that was published, if any.
    pub fn update(&self, settings: MinerSettings) -> Option<ConfigChange> {
        let keys = {
            let mut current = self.settings.write();
            let keys = current.changed_keys(&settings);
            if keys.is_empty() {
                return None;
            }
            *current = settings;
            keys
        };
        log::info!("miner settings changed keys={:?}", keys);
        let change = ConfigChange { keys };
        let _ = self.changes.send(change.clone());
        Some(change)
    }

    pub fn modify(&self, edit: impl FnOnce(&mut MinerSettings)) -> Option<ConfigChange> {
        let mut settings = self.snapshot();
        edit(&mut settings);
        self.update(settings)
    }
}
