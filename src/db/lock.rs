//! Advisory file locks
//!
//! Every record on disk is guarded by a companion lock file. Locks are
//! `flock` based, so they serialize independent processes as well as
//! independent [`LockManager`]s within one process (each manager opens its own
//! file description).
//!
//! A manager holds at most one lock at a time. Acquiring a new lock while an
//! older one is still held force-releases the older one and logs a warning;
//! this keeps a critical section that leaked its guard from wedging the whole
//! installation.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use fs2::FileExt;
use rand::Rng;

use crate::config::LockConfig;
use crate::constants::LOCK_FILE_MODE;
use crate::error::{AppError, AppResult, IoContext};

/// One held lock file
#[derive(Debug)]
struct HeldLock {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl HeldLock {
    /// Unlock and close. Returns false if it was already released.
    fn release(&self) -> bool {
        let Some(file) = lock_ignoring_poison(&self.file).take() else {
            return false;
        };
        if let Err(e) = FileExt::unlock(&file) {
            tracing::error!(path = %self.path.display(), error = %e, "failed to unlock");
        }
        true
    }

    fn is_held(&self) -> bool {
        lock_ignoring_poison(&self.file).is_some()
    }
}

/// Proof that a lock is held; releases it when dropped
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    held: Arc<HeldLock>,
}

impl LockGuard {
    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.held.path
    }

    /// False once the lock was force-released by a later acquire
    pub fn is_held(&self) -> bool {
        self.held.is_held()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.held.release() {
            tracing::debug!(path = %self.held.path.display(), "lock released");
        }
    }
}

/// Hands out file locks for one execution context
#[derive(Debug)]
pub struct LockManager {
    config: LockConfig,
    current: Mutex<Option<Arc<HeldLock>>>,
    stale_releases: AtomicU64,
}

impl LockManager {
    /// Create a lock manager
    pub fn new(config: LockConfig) -> Self {
        Self {
            config,
            current: Mutex::new(None),
            stale_releases: AtomicU64::new(0),
        }
    }

    /// Acquire an exclusive lock on `path`, creating the lock file if needed.
    ///
    /// Polls at a jittered interval until the configured timeout elapses, then
    /// fails with [`AppError::LockTimeout`].
    pub fn acquire(&self, path: &Path) -> AppResult<LockGuard> {
        self.release_stale();

        let file = open_lock_file(path)?;
        let started = Instant::now();

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    let elapsed = started.elapsed();
                    if elapsed >= self.config.timeout {
                        tracing::warn!(
                            path = %path.display(),
                            timeout_ms = self.config.timeout.as_millis() as u64,
                            "timed out waiting for lock"
                        );
                        return Err(AppError::LockTimeout {
                            path: path.to_path_buf(),
                            secs: self.config.timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(self.poll_interval().min(self.config.timeout - elapsed));
                }
                Err(e) => return Err(AppError::io(format!("lock {}", path.display()), e)),
            }
        }

        let held = Arc::new(HeldLock {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
        });
        *lock_ignoring_poison(&self.current) = Some(Arc::clone(&held));

        tracing::debug!(path = %path.display(), "lock acquired");
        Ok(LockGuard { held })
    }

    /// Number of locks this manager had to force open
    pub fn stale_releases(&self) -> u64 {
        self.stale_releases.load(Ordering::Relaxed)
    }

    fn release_stale(&self) {
        let previous = lock_ignoring_poison(&self.current).take();
        if let Some(previous) = previous {
            if previous.release() {
                self.stale_releases.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    path = %previous.path.display(),
                    "forced release of stale lock"
                );
            }
        }
    }

    fn poll_interval(&self) -> Duration {
        let min = self.config.poll_min.as_millis() as u64;
        let max = self.config.poll_max.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

fn open_lock_file(path: &Path) -> AppResult<File> {
    let existed = path.exists();

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .io_context(|| format!("open lock file {}", path.display()))?;

    #[cfg(unix)]
    if !existed {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(LOCK_FILE_MODE))
            .io_context(|| format!("chmod lock file {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = (existed, LOCK_FILE_MODE);

    Ok(file)
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
