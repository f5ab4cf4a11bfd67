//! Store configuration.
//!
//! Values come from `Default`, then environment variables. The CLI layers
//! its own flags on top.

use crate::db::DbResult;
use crate::driver::sqlite::SqliteSession;
use crate::logging::{default_log_level, normalize_level};
use crate::repo::record_repo::DEFAULT_STREAM_CAPACITY;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "DLAYER_DB_PATH";
pub const ENV_DB_NAME: &str = "DLAYER_DB_NAME";
pub const ENV_STREAM_CAPACITY: &str = "DLAYER_STREAM_CAPACITY";
pub const ENV_LOG_LEVEL: &str = "DLAYER_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "DLAYER_LOG_DIR";

const DEFAULT_DB_NAME: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// SQLite file; `None` keeps the store in memory.
    pub db_path: Option<PathBuf>,
    /// Logical database inside the store.
    pub db_name: String,
    pub stream_capacity: usize,
    pub log_level: String,
    /// Absolute directory for log files; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            db_name: DEFAULT_DB_NAME.to_string(),
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`; empty values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = get(ENV_DB_PATH) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(name) = get(ENV_DB_NAME) {
            config.db_name = name;
        }
        if let Some(raw) = get(ENV_STREAM_CAPACITY) {
            config.stream_capacity = parse_capacity(&raw)?;
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            config.log_level = normalize_level(&level)
                .map_err(|reason| ConfigError::invalid(ENV_LOG_LEVEL, &level, reason))?
                .to_string();
        }
        if let Some(dir) = get(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Opens the configured SQLite store.
    pub fn open_session(&self) -> DbResult<SqliteSession> {
        match &self.db_path {
            Some(path) => SqliteSession::open(path),
            None => SqliteSession::open_in_memory(),
        }
    }
}

/// Rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} `{}`: {}", self.key, self.value, self.reason)
    }
}

impl Error for ConfigError {}

pub fn parse_capacity(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::invalid(
            ENV_STREAM_CAPACITY,
            raw,
            "must be at least 1",
        )),
        Ok(capacity) => Ok(capacity),
        Err(err) => Err(ConfigError::invalid(ENV_STREAM_CAPACITY, raw, err.to_string())),
    }
}
