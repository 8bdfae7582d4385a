//! Configuration: settings, path resolution and directory-set reconciliation.

pub mod reconcile;
pub mod resolve;
pub mod service;
pub mod settings;
pub mod snapshot;

pub use reconcile::{Diagnostic, DirectorySetReconciler, ReconciledDirectories};
pub use resolve::{ConfiguredPath, Environment, PathResolver, SystemEnvironment, UserDirKind};
pub use service::{ConfigChange, ConfigService};
pub use settings::{MinerSettings, SettingsKey};
