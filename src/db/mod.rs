//! Storage module
//!
//! This module holds the file locking primitive, the JSON record codec and
//! the repositories built on top of them.

pub mod codec;
pub mod lock;
pub mod repositories;

pub use lock::{LockGuard, LockManager};

use std::fs;
use std::path::Path;

use crate::constants::DIR_MODE;
use crate::error::{AppResult, IoContext};

/// `mkdir -p` that gives newly created directories the group-shared mode
pub(crate) fn ensure_dir(path: &Path) -> AppResult<()> {
    if path.is_dir() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    match fs::create_dir(path) {
        Ok(()) => {}
        // lost a race with another process
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => return Ok(()),
        Err(e) => return Err(crate::error::AppError::io(format!("mkdir {}", path.display()), e)),
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(DIR_MODE))
            .io_context(|| format!("chmod {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = DIR_MODE;

    tracing::debug!(path = %path.display(), "created directory");
    Ok(())
}
