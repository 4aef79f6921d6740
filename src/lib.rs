//! Submit Portal - File-backed Contest Submission Store
//!
//! This library provides the storage core of a contest submission portal:
//! user accounts, the contest open/close window, per-user upload slots and
//! the staging of collected submit files. Everything lives in JSON files
//! under one application directory, guarded by advisory file locks so that
//! independent processes can share the tree safely.
//!
//! # Architecture
//!
//! The application follows a layered architecture:
//! - **CLI**: clap command surface (thin layer)
//! - **Services**: staging pipeline, login policy, account management
//! - **Repositories**: locked access to the password, contest and slot files
//! - **Models**: typed schemas of the on-disk records
//!
//! Repositories expose two tiers: public functions that take the lock they
//! need, and crate-private `*_locked` cores that require a
//! [`db::LockGuard`] as proof that the caller already holds it.

pub mod cli;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
