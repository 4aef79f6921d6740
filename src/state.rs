//! Application state management
//!
//! This module contains the shared context passed to every store and service
//! operation. It replaces process-wide globals: the lock bookkeeping lives in
//! the state, so two states behave like two independent processes.

use std::sync::Arc;

use crate::config::{Config, StorageConfig};
use crate::db::lock::LockManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Inner state (wrapped in Arc for cheap cloning)
struct AppStateInner {
    /// Application configuration
    config: Config,

    /// Lock bookkeeping for this context
    locks: LockManager,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config) -> Self {
        let locks = LockManager::new(config.lock.clone());
        Self {
            inner: Arc::new(AppStateInner { config, locks }),
        }
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get a reference to the storage paths
    pub fn storage(&self) -> &StorageConfig {
        &self.inner.config.storage
    }

    /// Get a reference to the lock manager
    pub fn locks(&self) -> &LockManager {
        &self.inner.locks
    }
}
