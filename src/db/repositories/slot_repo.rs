//! Slot repository
//!
//! Every user owns slots `0..=MAX_SUBMIT_SLOT`, each a directory under
//! `users/<username>/<slot>/` holding `slot.json`, a `lock` file and at most
//! one submit file. Each slot is locked on its own; no operation here ever
//! holds two slot locks at once.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::SubsecRound;

use crate::constants::{MAX_SUBMIT_SLOT, SLOT_FILE_NAME, SLOT_LOCK_NAME, UPLOADED_SLOT_STATUS};
use crate::db::codec::{is_missing_or_empty, read_json, write_json};
use crate::db::ensure_dir;
use crate::db::lock::LockGuard;
use crate::db::repositories::UserRepository;
use crate::error::{AppError, AppResult, IoContext};
use crate::models::{SlotRecord, SlotValidationError, SubmitFilename, UserRecord};
use crate::state::AppState;
use crate::utils::crypto::sha256_file;
use crate::utils::time::now_utc;
use crate::utils::validation::{check_user_slot, check_username};

/// Repository for per-user slot records
pub struct SlotRepository;

impl SlotRepository {
    /// Directory of one slot
    pub fn slot_dir(state: &AppState, username: &str, slot_num: u32) -> PathBuf {
        state.storage().slot_dir(username, slot_num)
    }

    /// Path a submit file named `filename` has inside its slot
    pub fn submit_path(state: &AppState, username: &str, slot_num: u32, filename: &str) -> PathBuf {
        Self::slot_dir(state, username, slot_num).join(filename)
    }

    /// Whether the slot already has a record on disk
    pub fn is_slot_setup(state: &AppState, username: &str, slot_num: u32) -> AppResult<bool> {
        check_user_slot(username, slot_num)?;
        let slot_file = Self::slot_dir(state, username, slot_num).join(SLOT_FILE_NAME);
        Ok(!is_missing_or_empty(&slot_file))
    }

    /// Create the slot tree of a user, seeding empty records where none exist.
    ///
    /// Returns every slot record in slot order.
    pub fn initialize_all(state: &AppState, username: &str) -> AppResult<Vec<SlotRecord>> {
        check_username(username)?;
        require_user(state, username)?;
        ensure_dir(&state.storage().user_dir(username))?;

        (0..=MAX_SUBMIT_SLOT)
            .map(|slot_num| {
                let guard = Self::lock_slot(state, username, slot_num)?;
                Self::load_locked(state, &guard, username, slot_num)
            })
            .collect()
    }

    /// Read and validate one slot record
    pub fn read_slot(state: &AppState, username: &str, slot_num: u32) -> AppResult<SlotRecord> {
        check_user_slot(username, slot_num)?;
        let guard = Self::lock_slot(state, username, slot_num)?;
        Self::load_locked(state, &guard, username, slot_num)
    }

    /// Record a newly uploaded submit file.
    ///
    /// `artifact` must be named `submit.<username>-<slot>.<timestamp>.txz`.
    /// It is moved into the slot directory if it is not already there, and
    /// any previous submit file of the slot is removed.
    pub fn update_on_upload(
        state: &AppState,
        username: &str,
        slot_num: u32,
        artifact: &Path,
    ) -> AppResult<SlotRecord> {
        check_user_slot(username, slot_num)?;
        let filename = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                AppError::InvalidInput(format!("bad submit path: {}", artifact.display()))
            })?
            .to_string();
        SubmitFilename::check(&filename, username, slot_num)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        require_user(state, username)?;

        let length = fs::metadata(artifact)
            .io_context(|| format!("stat {}", artifact.display()))?
            .len();
        // hash outside the lock
        let sha256 = sha256_file(artifact)?;

        let guard = Self::lock_slot(state, username, slot_num)?;
        let mut slot = Self::load_locked(state, &guard, username, slot_num)?;
        let dest = Self::submit_path(state, username, slot_num, &filename);

        if artifact != dest.as_path() {
            fs::rename(artifact, &dest).io_context(|| {
                format!("move {} to {}", artifact.display(), dest.display())
            })?;
        }

        if let Some(previous) = slot.filename.as_deref().filter(|p| *p != filename) {
            let previous = Self::submit_path(state, username, slot_num, previous);
            if previous.exists() {
                fs::remove_file(&previous)
                    .io_context(|| format!("remove {}", previous.display()))?;
                tracing::info!(path = %previous.display(), "removed previous submit file");
            }
        }

        slot.filename = Some(filename);
        slot.length = Some(length);
        slot.date = Some(now_utc().trunc_subsecs(6));
        slot.sha256 = Some(sha256);
        slot.collected = false;
        slot.status = UPLOADED_SLOT_STATUS.to_string();

        Self::store_locked(state, &guard, username, slot_num, &slot)?;
        tracing::info!(username, slot = slot_num, length, "submit file recorded");
        Ok(slot)
    }

    /// Set the status text, optionally marking the submit file collected
    pub fn patch_status(
        state: &AppState,
        username: &str,
        slot_num: u32,
        status: &str,
        set_collected: bool,
    ) -> AppResult<SlotRecord> {
        check_user_slot(username, slot_num)?;
        require_user(state, username)?;

        let guard = Self::lock_slot(state, username, slot_num)?;
        let mut slot = Self::load_locked(state, &guard, username, slot_num)?;
        Self::apply_status(&mut slot, status, set_collected)?;
        Self::store_locked(state, &guard, username, slot_num, &slot)?;
        Ok(slot)
    }

    /// Like [`SlotRepository::patch_status`], but only while the slot still
    /// holds `expected_filename`.
    ///
    /// A slot that moved on to a newer upload is left alone and `None` is
    /// returned.
    pub fn patch_status_if_submit(
        state: &AppState,
        username: &str,
        slot_num: u32,
        expected_filename: &str,
        status: &str,
        set_collected: bool,
    ) -> AppResult<Option<SlotRecord>> {
        check_user_slot(username, slot_num)?;
        require_user(state, username)?;

        let guard = Self::lock_slot(state, username, slot_num)?;
        let mut slot = Self::load_locked(state, &guard, username, slot_num)?;
        if slot.filename.as_deref() != Some(expected_filename) {
            tracing::debug!(
                username,
                slot = slot_num,
                expected = expected_filename,
                "slot holds a different submit file, status not changed"
            );
            return Ok(None);
        }

        Self::apply_status(&mut slot, status, set_collected)?;
        Self::store_locked(state, &guard, username, slot_num, &slot)?;
        Ok(Some(slot))
    }

    fn apply_status(slot: &mut SlotRecord, status: &str, set_collected: bool) -> AppResult<()> {
        if set_collected && slot.is_empty() {
            return Err(AppError::InvalidInput(
                "cannot mark an empty slot as collected".to_string(),
            ));
        }
        slot.status = status.to_string();
        if set_collected {
            slot.collected = true;
        }
        Ok(())
    }

    /// Create the slot directory and lock it
    pub(crate) fn lock_slot(state: &AppState, username: &str, slot_num: u32) -> AppResult<LockGuard> {
        let dir = Self::slot_dir(state, username, slot_num);
        ensure_dir(&dir)?;
        state.locks().acquire(&dir.join(SLOT_LOCK_NAME))
    }

    /// Read the slot record, seeding an empty one if the file is missing or
    /// empty. A present but invalid record is an error.
    pub(crate) fn load_locked(
        state: &AppState,
        guard: &LockGuard,
        username: &str,
        slot_num: u32,
    ) -> AppResult<SlotRecord> {
        let path = Self::slot_dir(state, username, slot_num).join(SLOT_FILE_NAME);

        if is_missing_or_empty(&path) {
            let slot = SlotRecord::empty(slot_num);
            Self::store_locked(state, guard, username, slot_num, &slot)?;
            tracing::info!(username, slot = slot_num, "initialized empty slot");
            return Ok(slot);
        }

        let slot: SlotRecord = read_json(&path)?;
        slot.validate(username, slot_num)
            .map_err(|e| AppError::corrupt(&path, e.to_string()))?;
        Ok(slot)
    }

    pub(crate) fn store_locked(
        state: &AppState,
        _guard: &LockGuard,
        username: &str,
        slot_num: u32,
        slot: &SlotRecord,
    ) -> AppResult<()> {
        let path = Self::slot_dir(state, username, slot_num).join(SLOT_FILE_NAME);
        write_json(&path, slot)
    }

    /// Compare a record with the slot directory.
    ///
    /// The outer error is an I/O failure; the inner one names the first
    /// disagreement found.
    pub(crate) fn verify_locked(
        state: &AppState,
        _guard: &LockGuard,
        username: &str,
        slot_num: u32,
        slot: &SlotRecord,
        submit_required: bool,
        check_hash: bool,
    ) -> AppResult<Result<(), SlotValidationError>> {
        use SlotValidationError as E;

        let Some(filename) = slot.filename.as_deref() else {
            return Ok(if submit_required {
                Err(E::NoSubmitFile)
            } else {
                Ok(())
            });
        };

        let path = Self::submit_path(state, username, slot_num, filename);
        if !path.is_file() {
            return Ok(if submit_required {
                Err(E::SubmitMissing)
            } else if !slot.collected {
                Err(E::GoneNotCollected)
            } else {
                Ok(())
            });
        }

        if check_hash && slot.sha256.as_deref() != Some(sha256_file(&path)?.as_str()) {
            return Ok(Err(E::CorruptedContents));
        }
        if slot.collected {
            return Ok(Err(E::CollectedButPresent));
        }

        let found = fs::metadata(&path)
            .io_context(|| format!("stat {}", path.display()))?
            .len();
        let expected = slot.length.unwrap_or_default();
        if found != expected {
            return Ok(Err(E::WrongLength { expected, found }));
        }
        Ok(Ok(()))
    }
}

fn require_user(state: &AppState, username: &str) -> AppResult<UserRecord> {
    UserRepository::find_by_username(state, username)?
        .ok_or_else(|| AppError::NotFound(format!("no such user: {username}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EMPTY_SLOT_STATUS;
    use crate::testing::{test_app, TestApp};
    use crate::utils::crypto::hash_string;

    const FILENAME: &str = "submit.alice-3.1700000000123456.txz";

    fn upload(app: &TestApp, name: &str, contents: &str) -> SlotRecord {
        let incoming = app.dir.path().join(name);
        fs::write(&incoming, contents).unwrap();
        SlotRepository::update_on_upload(&app.state, "alice", 3, &incoming).unwrap()
    }

    #[test]
    fn test_initialize_all_creates_every_slot() {
        let app = test_app();
        app.add_user("alice");

        let slots = SlotRepository::initialize_all(&app.state, "alice").unwrap();
        assert_eq!(slots.len(), 10);
        for (n, slot) in slots.iter().enumerate() {
            assert_eq!(slot, &SlotRecord::empty(n as u32));
            assert!(SlotRepository::is_slot_setup(&app.state, "alice", n as u32).unwrap());
            assert!(SlotRepository::slot_dir(&app.state, "alice", n as u32)
                .join(SLOT_LOCK_NAME)
                .exists());
        }

        // second run reads what is there
        assert_eq!(SlotRepository::initialize_all(&app.state, "alice").unwrap(), slots);
        assert_eq!(app.state.locks().stale_releases(), 0);
    }

    #[test]
    fn test_unknown_user() {
        let app = test_app();
        let err = SlotRepository::initialize_all(&app.state, "ghost").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(!app.state.storage().user_dir("ghost").exists());
    }

    #[test]
    fn test_out_of_range_slot() {
        let app = test_app();
        app.add_user("alice");
        assert!(matches!(
            SlotRepository::read_slot(&app.state, "alice", 10),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_slot_record_is_not_reseeded() {
        let app = test_app();
        app.add_user("alice");
        SlotRepository::initialize_all(&app.state, "alice").unwrap();

        let path = SlotRepository::slot_dir(&app.state, "alice", 2).join(SLOT_FILE_NAME);
        write_json(&path, &SlotRecord::empty(7)).unwrap();

        let err = SlotRepository::initialize_all(&app.state, "alice").unwrap_err();
        assert!(matches!(err, AppError::Corrupt { .. }));
        assert!(err.to_string().contains("wrong slot number"));
    }

    #[test]
    fn test_upload_records_file() {
        let app = test_app();
        app.add_user("alice");
        SlotRepository::initialize_all(&app.state, "alice").unwrap();

        let slot = upload(&app, FILENAME, "0123456789");
        assert_eq!(slot.filename.as_deref(), Some(FILENAME));
        assert_eq!(slot.length, Some(10));
        assert_eq!(slot.sha256, Some(hash_string("0123456789")));
        assert!(!slot.collected);
        assert_eq!(slot.status, UPLOADED_SLOT_STATUS);

        let stored = SlotRepository::submit_path(&app.state, "alice", 3, FILENAME);
        assert!(stored.is_file());
        assert!(!app.dir.path().join(FILENAME).exists());

        // what was written reads back identically and still validates
        let back = SlotRepository::read_slot(&app.state, "alice", 3).unwrap();
        assert_eq!(back, slot);
        assert_eq!(back.validate("alice", 3), Ok(()));
    }

    #[test]
    fn test_new_upload_replaces_previous_file() {
        let app = test_app();
        app.add_user("alice");

        upload(&app, FILENAME, "first");
        let newer = "submit.alice-3.1700000001000000.txz";
        let slot = upload(&app, newer, "second!");

        assert_eq!(slot.filename.as_deref(), Some(newer));
        assert_eq!(slot.length, Some(7));
        assert!(!SlotRepository::submit_path(&app.state, "alice", 3, FILENAME).exists());
        assert!(SlotRepository::submit_path(&app.state, "alice", 3, newer).exists());
    }

    #[test]
    fn test_upload_rejects_foreign_filename() {
        let app = test_app();
        app.add_user("alice");
        let incoming = app.dir.path().join("submit.bob-3.1700000000123456.txz");
        fs::write(&incoming, "x").unwrap();

        let err = SlotRepository::update_on_upload(&app.state, "alice", 3, &incoming).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(incoming.exists());
    }

    #[test]
    fn test_patch_status() {
        let app = test_app();
        app.add_user("alice");
        upload(&app, FILENAME, "0123456789");

        let slot = SlotRepository::patch_status(&app.state, "alice", 3, "judged", false).unwrap();
        assert_eq!(slot.status, "judged");
        assert!(!slot.collected);

        let slot = SlotRepository::patch_status(&app.state, "alice", 3, "taken", true).unwrap();
        assert!(slot.collected);
        assert_eq!(SlotRepository::read_slot(&app.state, "alice", 3).unwrap(), slot);
    }

    #[test]
    fn test_collected_requires_filename() {
        let app = test_app();
        app.add_user("alice");

        let err = SlotRepository::patch_status(&app.state, "alice", 0, "x", true).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(
            SlotRepository::read_slot(&app.state, "alice", 0).unwrap().status,
            EMPTY_SLOT_STATUS
        );
    }

    #[test]
    fn test_patch_if_submit_drops_stale_patch() {
        let app = test_app();
        app.add_user("alice");
        upload(&app, FILENAME, "0123456789");
        let newer = "submit.alice-3.1700000002000000.txz";
        upload(&app, newer, "abc");

        let stale = SlotRepository::patch_status_if_submit(
            &app.state, "alice", 3, FILENAME, "old news", true,
        )
        .unwrap();
        assert!(stale.is_none());
        let slot = SlotRepository::read_slot(&app.state, "alice", 3).unwrap();
        assert_eq!(slot.status, UPLOADED_SLOT_STATUS);
        assert!(!slot.collected);

        let fresh = SlotRepository::patch_status_if_submit(
            &app.state, "alice", 3, newer, "checked", false,
        )
        .unwrap();
        assert_eq!(fresh.map(|s| s.status), Some("checked".to_string()));
    }

    #[test]
    fn test_verify_against_directory() {
        let app = test_app();
        app.add_user("alice");
        let slot = upload(&app, FILENAME, "0123456789");
        let path = SlotRepository::submit_path(&app.state, "alice", 3, FILENAME);

        let verify = |slot: &SlotRecord, required, hash| {
            let guard = SlotRepository::lock_slot(&app.state, "alice", 3).unwrap();
            SlotRepository::verify_locked(&app.state, &guard, "alice", 3, slot, required, hash)
                .unwrap()
        };

        assert_eq!(verify(&slot, true, true), Ok(()));

        fs::write(&path, "0123456780").unwrap();
        assert_eq!(verify(&slot, true, true), Err(SlotValidationError::CorruptedContents));

        fs::write(&path, "01234").unwrap();
        assert!(matches!(
            verify(&slot, true, false),
            Err(SlotValidationError::WrongLength { expected: 10, found: 5 })
        ));

        fs::remove_file(&path).unwrap();
        assert_eq!(verify(&slot, true, false), Err(SlotValidationError::SubmitMissing));
        assert_eq!(verify(&slot, false, false), Err(SlotValidationError::GoneNotCollected));

        let collected = SlotRecord {
            collected: true,
            ..slot.clone()
        };
        assert_eq!(verify(&collected, false, false), Ok(()));

        let empty = SlotRecord::empty(3);
        assert_eq!(verify(&empty, true, true), Err(SlotValidationError::NoSubmitFile));
        assert_eq!(verify(&empty, false, true), Ok(()));
    }

    #[test]
    fn test_slot_lock_held_by_other_process() {
        let app = test_app();
        app.add_user("alice");
        let other = app.other_process();
        let _held = SlotRepository::lock_slot(&other, "alice", 3).unwrap();

        let err = SlotRepository::read_slot(&app.state, "alice", 3).unwrap_err();
        assert!(err.is_retryable());
        // other slots are independent
        assert!(SlotRepository::read_slot(&app.state, "alice", 4).is_ok());
    }
}
