//! Application configuration management
//!
//! This module handles loading configuration from environment variables.
//! Every storage path is derived from a single application directory so a
//! whole installation can be relocated (or created in a scratch directory for
//! tests) by changing one value.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    paths, DEFAULT_APPDIR, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_LOCK_POLL_MAX_MS,
    DEFAULT_LOCK_POLL_MIN_MS, DEFAULT_LOCK_TIMEOUT_SECS,
};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub lock: LockConfig,
    pub accounts: AccountConfig,
}

/// File storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Application directory everything else lives under
    pub appdir: PathBuf,
    pub pw_file: PathBuf,
    pub init_pw_file: PathBuf,
    pub pw_lock: PathBuf,
    pub state_file: PathBuf,
    pub init_state_file: PathBuf,
    pub state_lock: PathBuf,
    /// Root of the per-user slot trees
    pub users_dir: PathBuf,
    /// Destination of collected submit files
    pub staged_dir: PathBuf,
    /// Quarantine for stray submit files
    pub unexpected_dir: PathBuf,
}

/// Lock acquisition configuration
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Give up waiting for a lock after this long
    pub timeout: Duration,
    /// Lower bound of the jittered poll interval
    pub poll_min: Duration,
    /// Upper bound of the jittered poll interval
    pub poll_max: Duration,
}

/// Account policy configuration
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Seconds a user has to change a password after a forced change is set
    pub grace_period_secs: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let appdir = env::var("SUBMIT_APPDIR").unwrap_or_else(|_| DEFAULT_APPDIR.to_string());

        Ok(Self {
            storage: StorageConfig::from_appdir(appdir),
            lock: LockConfig::from_env()?,
            accounts: AccountConfig::from_env()?,
        })
    }

    /// Build a configuration rooted at an explicit application directory
    pub fn with_appdir(appdir: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig::from_appdir(appdir),
            lock: LockConfig::default(),
            accounts: AccountConfig::default(),
        }
    }

    /// Replace the application directory, keeping the other settings
    pub fn relocate(mut self, appdir: impl Into<PathBuf>) -> Self {
        self.storage = StorageConfig::from_appdir(appdir);
        self
    }
}

impl StorageConfig {
    /// Derive every storage path from the application directory
    pub fn from_appdir(appdir: impl Into<PathBuf>) -> Self {
        let appdir = appdir.into();
        let at = |rel: &str| appdir.join(rel);

        Self {
            pw_file: at(paths::PW_FILE),
            init_pw_file: at(paths::INIT_PW_FILE),
            pw_lock: at(paths::PW_LOCK),
            state_file: at(paths::STATE_FILE),
            init_state_file: at(paths::INIT_STATE_FILE),
            state_lock: at(paths::STATE_LOCK),
            users_dir: at(paths::USERS_DIR),
            staged_dir: at(paths::STAGED_DIR),
            unexpected_dir: at(paths::UNEXPECTED_DIR),
            appdir,
        }
    }

    /// Directory holding the slots of one user
    pub fn user_dir(&self, username: &str) -> PathBuf {
        self.users_dir.join(username)
    }

    /// Directory of one slot
    pub fn slot_dir(&self, username: &str, slot_num: u32) -> PathBuf {
        self.user_dir(username).join(slot_num.to_string())
    }

    /// Application directory
    pub fn appdir(&self) -> &Path {
        &self.appdir
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
            poll_min: Duration::from_millis(DEFAULT_LOCK_POLL_MIN_MS),
            poll_max: Duration::from_millis(DEFAULT_LOCK_POLL_MAX_MS),
        }
    }
}

impl LockConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = parse_var("LOCK_TIMEOUT_SECS", DEFAULT_LOCK_TIMEOUT_SECS)?;
        let poll_min_ms = parse_var("LOCK_POLL_MIN_MS", DEFAULT_LOCK_POLL_MIN_MS)?;
        let poll_max_ms = parse_var("LOCK_POLL_MAX_MS", DEFAULT_LOCK_POLL_MAX_MS)?;

        if poll_min_ms > poll_max_ms {
            return Err(ConfigError::InvalidValue("LOCK_POLL_MIN_MS".to_string()));
        }

        Ok(Self {
            timeout: Duration::from_secs(timeout_secs),
            poll_min: Duration::from_millis(poll_min_ms),
            poll_max: Duration::from_millis(poll_max_ms),
        })
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
        }
    }
}

impl AccountConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            grace_period_secs: parse_var("PASSWORD_GRACE_SECS", DEFAULT_GRACE_PERIOD_SECS)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}
