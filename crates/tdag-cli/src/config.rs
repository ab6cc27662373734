//! Configuration resolution for `td`.
//!
//! Everything here happens before the core is touched: the result is a
//! resolved data path, actor name, lock timeout and output preference, from
//! which `main` builds one [`Store`].
//!
//! Sources, highest precedence first:
//!
//! | setting      | flag     | environment      | `config.toml`     | default                                   |
//! |--------------|----------|------------------|-------------------|-------------------------------------------|
//! | home         |          | `TDAG_HOME`      |                   | `~/.tdag`                                 |
//! | profile      |          | `TDAG_PROFILE`   | `profile`         | none                                      |
//! | data path    | `--data` | `TDAG_DATA_PATH` | `data_path`       | `<home>/<profile>/tasks.yaml` or `<home>/tasks.yaml` |
//! | actor        | `--user` | `TDAG_USER`, `USER` | `user`         | `anonymous`                               |
//! | lock timeout |          |                  | `lock_timeout_ms` | 5000 ms                                   |
//! | output       | `--format`, `--json` | `FORMAT` | `output`      | pretty on a TTY, text otherwise           |
//!
//! `USER` sits below the config file's `user` key.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tdag_core::lock::DEFAULT_LOCK_TIMEOUT;
use tdag_core::store::{self, Store};

pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_DATA_FILE: &str = "tasks.yaml";
pub const DEFAULT_ACTOR: &str = "anonymous";

/// Problems resolving configuration. Reported with code `E1001`.
#[derive(Debug)]
pub enum ConfigError {
    NoHomeDirectory,
    Unreadable { path: PathBuf, source: io::Error },
    Invalid { path: PathBuf, reason: String },
    InvalidProfile { profile: String },
    UnsupportedBackend { path: PathBuf },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHomeDirectory => {
                write!(f, "cannot locate a home directory; set TDAG_HOME")
            }
            Self::Unreadable { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            Self::Invalid { path, reason } => {
                write!(f, "invalid config {}: {reason}", path.display())
            }
            Self::InvalidProfile { profile } => {
                write!(f, "invalid profile name '{profile}': must be a single path segment")
            }
            Self::UnsupportedBackend { path } => write!(
                f,
                "unsupported data file {}: use .yaml, .yml, .db, .sqlite or .sqlite3",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Contents of `<home>/config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub profile: Option<String>,
    pub user: Option<String>,
    /// Relative paths are taken relative to the home directory.
    pub data_path: Option<PathBuf>,
    pub lock_timeout_ms: Option<u64>,
    pub output: Option<String>,
}

impl FileConfig {
    /// Read the config file if it exists. A missing file is an empty config.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Unreadable`] or [`ConfigError::Invalid`].
    pub fn load(home: &Path) -> Result<Self, ConfigError> {
        let path = home.join(CONFIG_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Unreadable { path, source }),
        };
        toml::from_str(&raw).map_err(|err| ConfigError::Invalid {
            path,
            reason: err.message().to_string(),
        })
    }
}

/// Environment variables `td` reads, captured once.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    pub home: Option<PathBuf>,
    pub profile: Option<String>,
    pub data_path: Option<PathBuf>,
    pub user: Option<String>,
    pub login: Option<String>,
}

impl EnvVars {
    pub fn from_process() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            home: var("TDAG_HOME").map(PathBuf::from),
            profile: var("TDAG_PROFILE"),
            data_path: var("TDAG_DATA_PATH").map(PathBuf::from),
            user: var("TDAG_USER"),
            login: var("USER"),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides<'a> {
    pub data: Option<&'a Path>,
    pub user: Option<&'a str>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub home: PathBuf,
    pub data_path: PathBuf,
    pub actor: String,
    pub lock_timeout: Duration,
    /// Output preference from `config.toml`, applied below flags and `FORMAT`.
    pub output: Option<String>,
}

impl Settings {
    /// Resolve settings from the process environment and the config file.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`].
    pub fn load(overrides: Overrides<'_>) -> Result<Self, ConfigError> {
        let env = EnvVars::from_process();
        let home = home_dir(&env)?;
        let file = FileConfig::load(&home)?;
        resolve(overrides, &env, &file, home)
    }

    /// Open the backend matching the data file's extension.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnsupportedBackend`] for unknown extensions.
    pub fn open_store(&self) -> Result<Box<dyn Store>, ConfigError> {
        store::open_by_extension(&self.data_path, self.lock_timeout).ok_or_else(|| {
            ConfigError::UnsupportedBackend {
                path: self.data_path.clone(),
            }
        })
    }
}

fn home_dir(env: &EnvVars) -> Result<PathBuf, ConfigError> {
    if let Some(home) = &env.home {
        return Ok(home.clone());
    }
    dirs::home_dir()
        .map(|home| home.join(".tdag"))
        .ok_or(ConfigError::NoHomeDirectory)
}

fn resolve(
    overrides: Overrides<'_>,
    env: &EnvVars,
    file: &FileConfig,
    home: PathBuf,
) -> Result<Settings, ConfigError> {
    let profile = env
        .profile
        .clone()
        .or_else(|| file.profile.clone())
        .filter(|p| !p.trim().is_empty());
    if let Some(profile) = &profile {
        if !is_single_segment(profile) {
            return Err(ConfigError::InvalidProfile {
                profile: profile.clone(),
            });
        }
    }

    let data_path = if let Some(path) = overrides.data {
        path.to_path_buf()
    } else if let Some(path) = &env.data_path {
        path.clone()
    } else if let Some(path) = &file.data_path {
        home.join(path)
    } else if let Some(profile) = &profile {
        home.join(profile).join(DEFAULT_DATA_FILE)
    } else {
        home.join(DEFAULT_DATA_FILE)
    };

    let actor = overrides
        .user
        .map(str::to_string)
        .or_else(|| env.user.clone())
        .or_else(|| file.user.clone())
        .or_else(|| env.login.clone())
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ACTOR.to_string());

    let lock_timeout = file
        .lock_timeout_ms
        .map_or(DEFAULT_LOCK_TIMEOUT, Duration::from_millis);

    Ok(Settings {
        home,
        data_path,
        actor,
        lock_timeout,
        output: file.output.clone(),
    })
}

fn is_single_segment(name: &str) -> bool {
    name != "." && name != ".." && !name.contains(['/', '\\'])
}
