//! Staging service
//!
//! Moves a verified submit file out of its slot into the shared staging
//! directory. Whatever happens, the slot directory is swept afterwards: any
//! file that looks like a submit file and was not staged ends up in the
//! quarantine directory, so no loose submit file survives a stage call.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::constants::STAGED_SLOT_STATUS;
use crate::db::ensure_dir;
use crate::db::lock::LockGuard;
use crate::db::repositories::{SlotRepository, UserRepository};
use crate::error::{AppError, AppResult, IoContext};
use crate::state::AppState;
use crate::utils::validation::{check_user_slot, ANY_SUBMIT_FILE};

/// Result of staging one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The submit file now lives at `staged_path`
    Staged {
        sha256: String,
        staged_path: PathBuf,
        unexpected: usize,
    },
    /// Nothing was staged; `reason` says why
    Rejected { reason: String, unexpected: usize },
}

impl StageOutcome {
    /// Number of stray files moved into quarantine
    pub fn unexpected_count(&self) -> usize {
        match self {
            Self::Staged { unexpected, .. } | Self::Rejected { unexpected, .. } => *unexpected,
        }
    }

    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Staged { .. })
    }

    /// `(sha256, staged_path, unexpected)`, with `(None, ".", n)` on rejection
    pub fn as_triple(&self) -> (Option<&str>, &Path, usize) {
        match self {
            Self::Staged {
                sha256,
                staged_path,
                unexpected,
            } => (Some(sha256.as_str()), staged_path.as_path(), *unexpected),
            Self::Rejected { unexpected, .. } => (None, Path::new("."), *unexpected),
        }
    }
}

/// Staging service
pub struct StagingService;

impl StagingService {
    /// Stage the submit file of one slot.
    ///
    /// Errors only come from checks made before the slot lock is taken;
    /// once it is held every failure is reported as [`StageOutcome::Rejected`]
    /// after the slot has been swept.
    pub fn stage(state: &AppState, username: &str, slot_num: u32) -> AppResult<StageOutcome> {
        check_user_slot(username, slot_num)?;
        if UserRepository::find_by_username(state, username)?.is_none() {
            return Err(AppError::NotFound(format!("no such user: {username}")));
        }

        let guard = SlotRepository::lock_slot(state, username, slot_num)?;
        let outcome = Self::stage_locked(state, &guard, username, slot_num);
        drop(guard);

        if let StageOutcome::Rejected { reason, unexpected } = &outcome {
            tracing::warn!(username, slot = slot_num, unexpected, %reason, "submit file not staged");
        }
        Ok(outcome)
    }

    fn stage_locked(
        state: &AppState,
        guard: &LockGuard,
        username: &str,
        slot_num: u32,
    ) -> StageOutcome {
        let slot_dir = SlotRepository::slot_dir(state, username, slot_num);

        let mut slot = match SlotRepository::load_locked(state, guard, username, slot_num) {
            Ok(slot) => slot,
            Err(e) => return Self::reject(state, guard, &slot_dir, e.to_string()),
        };

        match SlotRepository::verify_locked(state, guard, username, slot_num, &slot, true, true) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                return Self::reject(state, guard, &slot_dir, reason.to_string());
            }
            Err(e) => return Self::reject(state, guard, &slot_dir, e.to_string()),
        }

        // verify_locked only passes with a filename and hash present
        let (Some(filename), Some(sha256)) = (slot.filename.clone(), slot.sha256.clone()) else {
            return Self::reject(state, guard, &slot_dir, "slot record is empty".to_string());
        };

        let staged_dir = &state.storage().staged_dir;
        if let Err(e) = ensure_dir(staged_dir) {
            return Self::reject(state, guard, &slot_dir, e.to_string());
        }
        let source = slot_dir.join(&filename);
        let staged_path = staged_dir.join(&filename);

        if let Err(e) = fs::rename(&source, &staged_path) {
            tracing::error!(
                from = %source.display(),
                to = %staged_path.display(),
                error = %e,
                "failed to move submit file into staging"
            );
            return Self::reject(
                state,
                guard,
                &slot_dir,
                format!("cannot move {} into staging: {e}", source.display()),
            );
        }

        // The file is already staged; a stale record must not undo that
        slot.collected = true;
        slot.status = STAGED_SLOT_STATUS.to_string();
        if let Err(e) = SlotRepository::store_locked(state, guard, username, slot_num, &slot) {
            tracing::error!(
                username,
                slot = slot_num,
                error = %e,
                "submit file staged but slot record not updated"
            );
        }

        let unexpected = Self::quarantine_locked(state, guard, &slot_dir);
        tracing::info!(
            username,
            slot = slot_num,
            path = %staged_path.display(),
            "submit file staged"
        );

        StageOutcome::Staged {
            sha256,
            staged_path,
            unexpected,
        }
    }

    fn reject(
        state: &AppState,
        guard: &LockGuard,
        slot_dir: &Path,
        reason: String,
    ) -> StageOutcome {
        let unexpected = Self::quarantine_locked(state, guard, slot_dir);
        StageOutcome::Rejected { reason, unexpected }
    }

    /// Move every submit-like file of `slot_dir` into the quarantine
    /// directory, returning how many were moved.
    ///
    /// A file that cannot be moved is logged and left behind.
    pub(crate) fn quarantine_locked(
        state: &AppState,
        _guard: &LockGuard,
        slot_dir: &Path,
    ) -> usize {
        let unexpected_dir = &state.storage().unexpected_dir;
        let mut moved = 0;

        for entry in WalkDir::new(slot_dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Error reading directory entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if !ANY_SUBMIT_FILE.is_match(name) {
                continue;
            }

            let dest = free_name(unexpected_dir, name);
            let result = ensure_dir(unexpected_dir).and_then(|()| move_file(entry.path(), &dest));
            if let Err(e) = result {
                tracing::error!(
                    path = %entry.path().display(),
                    error = %e,
                    "failed to quarantine unexpected submit file"
                );
                continue;
            }
            tracing::warn!(
                from = %entry.path().display(),
                to = %dest.display(),
                "moved unexpected submit file into quarantine"
            );
            moved += 1;
        }

        moved
    }
}

/// `dir/name`, or `dir/name.N` for the first free N
fn free_name(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    (1u32..)
        .map(|n| dir.join(format!("{name}.{n}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Rename, falling back to copy and remove across filesystems
fn move_file(from: &Path, to: &Path) -> AppResult<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).io_context(|| format!("copy {} to {}", from.display(), to.display()))?;
    fs::remove_file(from).io_context(|| format!("remove {}", from.display()))
}
