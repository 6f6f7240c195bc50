//! Store runtime configuration.
//!
//! # Responsibility
//! - Carry logging and backing-store settings from a JSON document.
//! - Supply defaults when a key is absent.
//!
//! # Invariants
//! - `backing_timeout_ms` is never zero after validation.
//! - `log_dir`, when set, is absolute.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default wait budget for one backing-store call.
pub const DEFAULT_BACKING_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Settings shared by the store, its backends and the logging bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub backing_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            backing_timeout_ms: DEFAULT_BACKING_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&document)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backing_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "backing_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn backing_timeout(&self) -> Duration {
        Duration::from_millis(self.backing_timeout_ms)
    }
}
