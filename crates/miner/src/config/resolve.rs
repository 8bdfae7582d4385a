//! Resolution of configured directory entries to absolute paths.
//!
//! Entries come in four shapes:
//! - `&NAME`: a well-known user directory (`&DESKTOP`, `&MUSIC`, ...)
//! - `$VAR` or `${VAR}`, optionally followed by `/rest`
//! - `~` or `~/rest`
//! - a literal absolute path

use std::env;
use std::path::{Path, PathBuf};

use crate::error::normalize_path;

/// Well-known user directory kinds addressable by alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserDirKind {
    Desktop,
    Documents,
    Download,
    Music,
    Pictures,
    PublicShare,
    Templates,
    Videos,
}

impl UserDirKind {
    pub fn from_alias(name: &str) -> Option<Self> {
        match name {
            "DESKTOP" => Some(Self::Desktop),
            "DOCUMENTS" => Some(Self::Documents),
            "DOWNLOAD" => Some(Self::Download),
            "MUSIC" => Some(Self::Music),
            "PICTURES" => Some(Self::Pictures),
            "PUBLIC_SHARE" => Some(Self::PublicShare),
            "TEMPLATES" => Some(Self::Templates),
            "VIDEOS" => Some(Self::Videos),
            _ => None,
        }
    }

    pub fn alias(self) -> &'static str {
        match self {
            Self::Desktop => "&DESKTOP",
            Self::Documents => "&DOCUMENTS",
            Self::Download => "&DOWNLOAD",
            Self::Music => "&MUSIC",
            Self::Pictures => "&PICTURES",
            Self::PublicShare => "&PUBLIC_SHARE",
            Self::Templates => "&TEMPLATES",
            Self::Videos => "&VIDEOS",
        }
    }
}

/// A raw configuration entry, classified but not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfiguredPath {
    Literal(PathBuf),
    /// Alias naming a user directory. `None` kind means the name is unknown.
    Alias {
        raw: String,
        kind: Option<UserDirKind>,
    },
    EnvVar {
        name: String,
        rest: Option<PathBuf>,
    },
    Home {
        rest: Option<PathBuf>,
    },
}

impl ConfiguredPath {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(name) = trimmed.strip_prefix('&') {
            return Self::Alias {
                raw: trimmed.to_string(),
                kind: UserDirKind::from_alias(name),
            };
        }
        if let Some(reference) = trimmed.strip_prefix('$') {
            let (name, rest) = match reference.strip_prefix('{') {
                Some(braced) => match braced.split_once('}') {
                    Some((name, rest)) => (name, rest),
                    None => (braced, ""),
                },
                None => match reference.find('/') {
                    Some(index) => reference.split_at(index),
                    None => (reference, ""),
                },
            };
            return Self::EnvVar {
                name: name.to_string(),
                rest: split_rest(rest),
            };
        }
        if trimmed == "~" {
            return Self::Home { rest: None };
        }
        if let Some(rest) = trimmed.strip_prefix("~/") {
            return Self::Home {
                rest: split_rest(rest),
            };
        }
        Self::Literal(PathBuf::from(trimmed))
    }
}

fn split_rest(rest: &str) -> Option<PathBuf> {
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        None
    } else {
        Some(PathBuf::from(rest))
    }
}

/// Platform lookups needed to resolve configured entries.
pub trait Environment: Send + Sync {
    fn user_dir(&self, kind: UserDirKind) -> Option<PathBuf>;
    fn home_dir(&self) -> Option<PathBuf>;
    fn var(&self, name: &str) -> Option<String>;
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Reads XDG user directories through `dirs` and variables from the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn user_dir(&self, kind: UserDirKind) -> Option<PathBuf> {
        match kind {
            UserDirKind::Desktop => dirs::desktop_dir(),
            UserDirKind::Documents => dirs::document_dir(),
            UserDirKind::Download => dirs::download_dir(),
            UserDirKind::Music => dirs::audio_dir(),
            UserDirKind::Pictures => dirs::picture_dir(),
            UserDirKind::PublicShare => dirs::public_dir(),
            UserDirKind::Templates => dirs::template_dir(),
            UserDirKind::Videos => dirs::video_dir(),
        }
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok().filter(|value| !value.is_empty())
    }
}

pub struct PathResolver {
    env: Box<dyn Environment>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(SystemEnvironment)
    }
}

impl PathResolver {
    pub fn new(env: impl Environment + 'static) -> Self {
        Self { env: Box::new(env) }
    }

    /// Resolves one raw entry, or `None` when it cannot name an absolute path.
    pub fn resolve_raw(&self, raw: &str) -> Option<PathBuf> {
        self.resolve(&ConfiguredPath::parse(raw))
    }

    pub fn resolve(&self, entry: &ConfiguredPath) -> Option<PathBuf> {
        let resolved = match entry {
            ConfiguredPath::Literal(path) => Some(path.clone()),
            ConfiguredPath::Alias { kind, .. } => kind.and_then(|kind| self.env.user_dir(kind)),
            ConfiguredPath::EnvVar { name, rest } => {
                let value = PathBuf::from(self.env.var(name)?);
                let path = join_rest(value, rest.as_deref());
                // Variable references only count when they name something real.
                self.env.exists(&path).then_some(path)
            }
            ConfiguredPath::Home { rest } => {
                self.env.home_dir().map(|home| join_rest(home, rest.as_deref()))
            }
        }?;

        if !resolved.is_absolute() {
            return None;
        }
        Some(normalize_path(&resolved))
    }
}

fn join_rest(base: PathBuf, rest: Option<&Path>) -> PathBuf {
    match rest {
        Some(rest) => base.join(rest),
        None => base,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;

    /// Deterministic environment for resolver and reconciler tests.
    #[derive(Default, Clone)]
    pub(crate) struct FakeEnvironment {
        pub dirs: HashMap<UserDirKind, PathBuf>,
        pub vars: HashMap<String, String>,
        pub home: Option<PathBuf>,
        pub existing: HashSet<PathBuf>,
    }

    impl Environment for FakeEnvironment {
        fn user_dir(&self, kind: UserDirKind) -> Option<PathBuf> {
            self.dirs.get(&kind).cloned()
        }

        fn home_dir(&self) -> Option<PathBuf> {
            self.home.clone()
        }

        fn var(&self, name: &str) -> Option<String> {
            self.vars.get(name).cloned()
        }

        fn exists(&self, path: &Path) -> bool {
            self.existing.contains(path)
        }
    }

    pub(crate) fn fake_env() -> FakeEnvironment {
        let mut env = FakeEnvironment {
            home: Some(PathBuf::from("/home/u")),
            ..Default::default()
        };
        env.dirs.insert(UserDirKind::Music, PathBuf::from("/home/u/Music"));
        env.dirs.insert(UserDirKind::Documents, PathBuf::from("/home/u/Documents"));
        env.vars.insert("HOME".into(), "/home/u".into());
        env.existing.insert(PathBuf::from("/home/u"));
        env.existing.insert(PathBuf::from("/home/u/src"));
        env
    }

    #[test]
    fn parse_classifies_entries() {
        assert_eq!(
            ConfiguredPath::parse("&MUSIC"),
            ConfiguredPath::Alias {
                raw: "&MUSIC".into(),
                kind: Some(UserDirKind::Music)
            }
        );
        assert_eq!(
            ConfiguredPath::parse("${HOME}/src"),
            ConfiguredPath::EnvVar {
                name: "HOME".into(),
                rest: Some(PathBuf::from("src"))
            }
        );
        assert_eq!(
            ConfiguredPath::parse("$HOME"),
            ConfiguredPath::EnvVar {
                name: "HOME".into(),
                rest: None
            }
        );
        assert_eq!(
            ConfiguredPath::parse("~/notes"),
            ConfiguredPath::Home {
                rest: Some(PathBuf::from("notes"))
            }
        );
        assert_eq!(
            ConfiguredPath::parse("/srv/data"),
            ConfiguredPath::Literal(PathBuf::from("/srv/data"))
        );
    }

    #[test]
    fn literal_passes_through() {
        let resolver = PathResolver::new(fake_env());
        assert_eq!(resolver.resolve_raw("/srv/data/"), Some(PathBuf::from("/srv/data")));
        assert_eq!(resolver.resolve_raw("relative/dir"), None);
    }

    #[test]
    fn aliases_use_platform_dirs() {
        let resolver = PathResolver::new(fake_env());
        assert_eq!(resolver.resolve_raw("&MUSIC"), Some(PathBuf::from("/home/u/Music")));
        assert_eq!(resolver.resolve_raw("&VIDEOS"), None);
        assert_eq!(resolver.resolve_raw("&NOT_A_DIR"), None);
    }

    #[test]
    fn env_reference_requires_existing_target() {
        let resolver = PathResolver::new(fake_env());
        assert_eq!(resolver.resolve_raw("$HOME"), Some(PathBuf::from("/home/u")));
        assert_eq!(resolver.resolve_raw("$HOME/src"), Some(PathBuf::from("/home/u/src")));
        assert_eq!(resolver.resolve_raw("$HOME/gone"), None);
        assert_eq!(resolver.resolve_raw("$UNSET"), None);
    }

    #[test]
    fn tilde_expands_to_home() {
        let resolver = PathResolver::new(fake_env());
        assert_eq!(resolver.resolve_raw("~"), Some(PathBuf::from("/home/u")));
        assert_eq!(resolver.resolve_raw("~/notes"), Some(PathBuf::from("/home/u/notes")));
    }
}
