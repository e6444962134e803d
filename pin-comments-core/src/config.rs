//! Option resolution.
//!
//! Precedence, highest first: options supplied by the host (CLI flags, config
//! file), values persisted in the local cache by a previous setup, built-in
//! defaults. [`resolve`] is evaluated once at startup.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cache::{LocalCache, DEFAULT_PREFIX};
use crate::error::{CacheError, ConfigError};
use crate::remote::DEFAULT_TABLE;
use crate::types::{BackendConfig, ButtonCorner, Mode};

/// Options supplied by the host. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Backend base URL. Together with `token` this skips setup.
    pub url: Option<String>,
    pub token: Option<String>,
    /// Remote table name.
    pub table: Option<String>,
    /// Namespace prefix for local cache keys.
    pub prefix: Option<String>,
    /// Corner of the floating comment button.
    pub position: Option<ButtonCorner>,
    /// Location of the local cache file.
    pub db_path: Option<PathBuf>,
}

impl Options {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads a TOML config file. A missing file yields `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io { path: path.display().to_string(), source })
            }
        };
        Self::from_toml_str(&raw).map(Some)
    }

    /// Field-wise merge: values set on `self` win over `fallback`.
    pub fn or(self, fallback: Options) -> Options {
        Options {
            url: self.url.or(fallback.url),
            token: self.token.or(fallback.token),
            table: self.table.or(fallback.table),
            prefix: self.prefix.or(fallback.prefix),
            position: self.position.or(fallback.position),
            db_path: self.db_path.or(fallback.db_path),
        }
    }

    /// Cache namespace. Needed before the cache can be opened, so it never
    /// comes from the cache itself.
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }

    /// Explicit backend config, when both URL and token are non-blank.
    fn backend(&self) -> Option<BackendConfig> {
        let url = self.url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let token = self.token.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(BackendConfig::new(url, token))
    }
}

/// Setup choices a previous run left in the local cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Persisted {
    pub backend: Option<BackendConfig>,
    pub mode: Option<Mode>,
}

impl Persisted {
    pub async fn load(cache: &LocalCache) -> Result<Self, CacheError> {
        Ok(Self {
            backend: cache.load_backend_config().await?,
            mode: cache.load_mode().await?,
        })
    }
}

/// Effective settings for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Backend to sync with; `None` means local-only mode.
    pub backend: Option<BackendConfig>,
    pub mode: Mode,
    /// Storage has been chosen, so setup does not need to run.
    pub setup_complete: bool,
    pub table: String,
    pub prefix: String,
    pub position: ButtonCorner,
}

/// Resolves the session settings from host options and persisted state.
///
/// Explicit credentials always mean remote mode. Otherwise a persisted
/// `mode=local` wins over a persisted backend config; a persisted config on
/// its own means remote mode. With neither, setup is still pending.
pub fn resolve(explicit: &Options, persisted: &Persisted) -> Resolved {
    let (backend, setup_complete) = match explicit.backend() {
        Some(config) => (Some(config), true),
        None => match (&persisted.mode, &persisted.backend) {
            (Some(Mode::Local), _) => (None, true),
            (_, Some(config)) => (Some(config.clone()), true),
            (Some(Mode::Remote), None) | (None, None) => (None, false),
        },
    };
    let mode = if backend.is_some() { Mode::Remote } else { Mode::Local };

    Resolved {
        backend,
        mode,
        setup_complete,
        table: explicit
            .table
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TABLE.to_owned()),
        prefix: explicit.prefix().to_owned(),
        position: explicit.position.unwrap_or_default(),
    }
}
