//! Application configuration.
//!
//! Resolution order for every field: environment override, then the JSON
//! file named by `JUSTWRITE_CONFIG`, then built-in defaults.
//!
//! Example `config.json`:
//! ```json
//! { "root": "~/jw", "autosave_delay_ms": 300 }
//! ```

use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "JUSTWRITE_CONFIG";
pub const ROOT_ENV: &str = "JUSTWRITE_ROOT";
pub const STATE_DB_ENV: &str = "JUSTWRITE_STATE_DB";
pub const LOG_DIR_ENV: &str = "JUSTWRITE_LOG_DIR";

const APP_DIR_NAME: &str = "justwrite";
const STATE_DB_FILE_NAME: &str = "gui_state.sqlite3";
const DEFAULT_ROOT: &str = "~/jw";
const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 300;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    /// The platform reports no home or config directory and no explicit
    /// path was given.
    NoHomeDir,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::NoHomeDir => {
                write!(f, "no home directory found and no explicit path was given")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::NoHomeDir => None,
        }
    }
}

/// On-disk config file shape; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Directory holding notebooks.
    pub root: Option<String>,
    pub state_db: Option<String>,
    pub log_dir: Option<String>,
    pub autosave_delay_ms: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Platform base directories used for `~` expansion and default paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseDirs {
    pub home: Option<PathBuf>,
    /// Per-user config directory (`$XDG_CONFIG_HOME`, `~/Library/Application
    /// Support`, `%APPDATA%`).
    pub config: Option<PathBuf>,
}

impl BaseDirs {
    pub fn detect() -> Self {
        Self {
            home: dirs::home_dir(),
            config: dirs::config_dir(),
        }
    }

    /// Unix-style layout rooted at `home`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            config: Some(home.join(".config")),
            home: Some(home),
        }
    }

    fn state_dir(&self) -> Result<PathBuf, ConfigError> {
        self.config
            .as_ref()
            .map(|config| config.join(APP_DIR_NAME))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Expands a leading `~` against the home directory.
    fn expand(&self, path: &str) -> Result<PathBuf, ConfigError> {
        let rest = match path.strip_prefix('~') {
            Some("") => "",
            Some(rest) if rest.starts_with(['/', '\\']) => &rest[1..],
            _ => return Ok(PathBuf::from(path)),
        };
        let home = self.home.as_ref().ok_or(ConfigError::NoHomeDir)?;
        Ok(if rest.is_empty() {
            home.clone()
        } else {
            home.join(rest)
        })
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub root: PathBuf,
    pub state_db: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub autosave_delay_ms: u64,
}

impl AppConfig {
    /// Resolves configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve_with(|key| std::env::var(key).ok(), &BaseDirs::detect())
    }

    /// Resolves configuration using `env` for variable lookups and `base`
    /// for platform directories.
    pub fn resolve_with(
        env: impl Fn(&str) -> Option<String>,
        base: &BaseDirs,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let file = match lookup(CONFIG_ENV) {
            Some(path) => ConfigFile::load(&base.expand(&path)?)?,
            None => ConfigFile::default(),
        };

        let root = lookup(ROOT_ENV)
            .or(file.root)
            .unwrap_or_else(|| DEFAULT_ROOT.to_string());
        let state_db = match lookup(STATE_DB_ENV).or(file.state_db) {
            Some(path) => base.expand(&path)?,
            None => base.state_dir()?.join(STATE_DB_FILE_NAME),
        };
        let log_dir = lookup(LOG_DIR_ENV)
            .or(file.log_dir)
            .map(|path| base.expand(&path))
            .transpose()?;

        Ok(Self {
            root: base.expand(&root)?,
            state_db,
            log_dir,
            autosave_delay_ms: file.autosave_delay_ms.unwrap_or(DEFAULT_AUTOSAVE_DELAY_MS),
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            autosave_delay: Duration::from_millis(self.autosave_delay_ms),
        }
    }
}
