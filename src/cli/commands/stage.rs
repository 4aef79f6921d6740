use std::path::Path;

use crate::services::{StageOutcome, StagingService};
use crate::state::AppState;
use crate::utils::validation::{validate_slot_num, validate_username};

/// Exit status and the single stdout line of a stage run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageExit {
    code: u8,
    line: String,
}

impl StageExit {
    fn failed(code: u8, unexpected: usize) -> Self {
        Self {
            code,
            line: format!("exit.{code} . {unexpected}"),
        }
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    /// `<sha256> <staged_path> <count>` or `exit.<code> . <count>`
    pub fn line(&self) -> &str {
        &self.line
    }
}

/// Stage the slot at `slot_path` and print the outcome on stdout
pub fn cmd_stage(state: &AppState, slot_path: &Path) -> StageExit {
    let exit = stage_slot_path(state, slot_path);
    println!("{}", exit.line());
    exit
}

/// Failure line for a run that never got as far as staging
pub fn stage_startup_failure() -> StageExit {
    StageExit::failed(3, 0)
}

fn stage_slot_path(state: &AppState, slot_path: &Path) -> StageExit {
    let resolved = if slot_path.is_absolute() {
        slot_path.to_path_buf()
    } else {
        state.storage().appdir().join(slot_path)
    };
    tracing::debug!(slot_path = %resolved.display(), "staging slot");

    if !resolved.is_dir() {
        eprintln!("slot_path is not a directory: {}", slot_path.display());
        return StageExit::failed(4, 0);
    }

    let slot_str = resolved
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if slot_str.is_empty() || !slot_str.bytes().all(|b| b.is_ascii_digit()) {
        eprintln!(
            "last component of slot_path: {} is not an integer: {slot_str}",
            slot_path.display()
        );
        return StageExit::failed(5, 0);
    }
    let Some(slot_num) = slot_str
        .parse::<u32>()
        .ok()
        .filter(|n| validate_slot_num(*n).is_ok())
    else {
        eprintln!("invalid slot number: {slot_str}");
        return StageExit::failed(6, 0);
    };

    let username = resolved
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if let Err(msg) = validate_username(username) {
        eprintln!("{msg}: {username:?}");
        return StageExit::failed(7, 0);
    }

    match StagingService::stage(state, username, slot_num) {
        Ok(StageOutcome::Staged {
            sha256,
            staged_path,
            unexpected,
        }) => {
            if unexpected > 0 {
                tracing::warn!(unexpected, "moved files into the unexpected directory");
            }
            StageExit {
                code: 0,
                line: format!("{sha256} {} {unexpected}", staged_path.display()),
            }
        }
        Ok(StageOutcome::Rejected { reason, unexpected }) => {
            eprintln!("stage failed: {reason}");
            StageExit::failed(8, unexpected)
        }
        Err(e) => {
            eprintln!("stage failed: {e}");
            StageExit::failed(8, 0)
        }
    }
}
