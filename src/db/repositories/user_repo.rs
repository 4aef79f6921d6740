//! User repository
//!
//! The password file is one JSON array of user records guarded by a single
//! lock file. Unrelated elements are carried through rewrites untouched, so a
//! damaged record only affects lookups of that one user.

use std::path::Path;

use serde_json::Value;

use crate::db::codec::{read_json, seed_from_template, write_json};
use crate::db::lock::LockGuard;
use crate::error::{AppError, AppResult, IoContext};
use crate::models::UserRecord;
use crate::state::AppState;
use crate::utils::validation::check_username;

/// Repository for password file operations
pub struct UserRepository;

impl UserRepository {
    /// Find user by username
    pub fn find_by_username(state: &AppState, username: &str) -> AppResult<Option<UserRecord>> {
        check_username(username)?;
        let guard = Self::lock(state)?;
        let users = Self::load_locked(state, &guard)?;

        users
            .iter()
            .find(|v| username_of(v) == Some(username))
            .map(|v| Self::parse_record(state, v))
            .transpose()
    }

    /// Find user by e-mail address
    pub fn find_by_email(state: &AppState, email: &str) -> AppResult<Option<UserRecord>> {
        Ok(Self::list(state)?
            .into_iter()
            .find(|u| u.email.as_deref() == Some(email)))
    }

    /// All valid user records; damaged elements are logged and skipped
    pub fn list(state: &AppState) -> AppResult<Vec<UserRecord>> {
        let guard = Self::lock(state)?;
        let users = Self::load_locked(state, &guard)?;

        Ok(users
            .iter()
            .filter_map(|v| match Self::parse_record(state, v) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping invalid password entry");
                    None
                }
            })
            .collect())
    }

    /// Insert or replace the record with `user.username`.
    ///
    /// Returns true when a new record was appended.
    pub fn upsert(state: &AppState, user: &UserRecord) -> AppResult<bool> {
        check_username(&user.username)?;
        user.validate().map_err(AppError::Validation)?;

        let guard = Self::lock(state)?;
        let mut users = Self::load_locked(state, &guard)?;
        let value = serde_json::to_value(user)?;

        let created = match users
            .iter_mut()
            .find(|v| username_of(v) == Some(user.username.as_str()))
        {
            Some(existing) => {
                *existing = value;
                false
            }
            None => {
                users.push(value);
                true
            }
        };

        Self::store_locked(state, &guard, &users)?;
        if created {
            tracing::info!(username = %user.username, "user added");
        } else {
            tracing::info!(username = %user.username, "user updated");
        }
        Ok(created)
    }

    /// Remove a user, returning the removed record
    pub fn delete(state: &AppState, username: &str) -> AppResult<Option<UserRecord>> {
        check_username(username)?;
        let guard = Self::lock(state)?;
        let mut users = Self::load_locked(state, &guard)?;

        let Some(pos) = users.iter().position(|v| username_of(v) == Some(username)) else {
            return Ok(None);
        };
        let removed = Self::parse_record(state, &users[pos])?;
        users.retain(|v| username_of(v) != Some(username));

        Self::store_locked(state, &guard, &users)?;
        tracing::info!(username, "user deleted");
        Ok(Some(removed))
    }

    /// Copy the password file to `dest` while no writer can touch it
    pub fn export_copy(state: &AppState, dest: &Path) -> AppResult<()> {
        let pw_file = &state.storage().pw_file;
        let guard = Self::lock(state)?;
        Self::load_locked(state, &guard)?;

        std::fs::copy(pw_file, dest)
            .io_context(|| format!("copy {} to {}", pw_file.display(), dest.display()))?;
        tracing::info!(dest = %dest.display(), "password file exported");
        Ok(())
    }

    fn lock(state: &AppState) -> AppResult<LockGuard> {
        state.locks().acquire(&state.storage().pw_lock)
    }

    /// Seed if needed and read the raw array
    pub(crate) fn load_locked(state: &AppState, _guard: &LockGuard) -> AppResult<Vec<Value>> {
        let storage = state.storage();
        seed_from_template(&storage.pw_file, &storage.init_pw_file)?;
        read_json(&storage.pw_file)
    }

    pub(crate) fn store_locked(
        state: &AppState,
        _guard: &LockGuard,
        users: &[Value],
    ) -> AppResult<()> {
        write_json(&state.storage().pw_file, users)
    }

    fn parse_record(state: &AppState, value: &Value) -> AppResult<UserRecord> {
        let pw_file = &state.storage().pw_file;
        let user: UserRecord = serde_json::from_value(value.clone())
            .map_err(|e| AppError::corrupt(pw_file, e.to_string()))?;
        user.validate().map_err(|reason| AppError::corrupt(pw_file, reason))?;
        Ok(user)
    }
}

fn username_of(value: &Value) -> Option<&str> {
    value.get("username").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_app;

    #[test]
    fn test_lookup_on_fresh_install_seeds_file() {
        let app = test_app();
        let pw_file = app.state.storage().pw_file.clone();
        assert!(!pw_file.exists());

        assert!(UserRepository::find_by_username(&app.state, "alice").unwrap().is_none());
        assert!(pw_file.exists());
        assert!(UserRepository::list(&app.state).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_then_lookup() {
        let app = test_app();
        let user = app.add_user("alice");

        let found = UserRepository::find_by_username(&app.state, "alice").unwrap();
        assert_eq!(found, Some(user));
        assert!(UserRepository::find_by_username(&app.state, "bob").unwrap().is_none());
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let app = test_app();
        let mut user = UserRecord::new("alice", "$argon2id$h1");
        user.email = Some("alice@example.com".to_string());

        assert!(UserRepository::upsert(&app.state, &user).unwrap());
        let first = std::fs::read_to_string(&app.state.storage().pw_file).unwrap();
        assert!(!UserRepository::upsert(&app.state, &user).unwrap());
        let second = std::fs::read_to_string(&app.state.storage().pw_file).unwrap();

        assert_eq!(first, second);
        assert_eq!(UserRepository::list(&app.state).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_replaces_fields() {
        let app = test_app();
        app.add_user("alice");
        app.add_user("bob");

        let mut changed = UserRecord::new("alice", "$argon2id$other");
        changed.login_disabled = true;
        assert!(!UserRepository::upsert(&app.state, &changed).unwrap());

        let users = UserRepository::list(&app.state).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0], changed);
        assert_eq!(users[1].username, "bob");
    }

    #[test]
    fn test_firewall_rejects_bad_username_before_io() {
        let app = test_app();
        let err = UserRepository::find_by_username(&app.state, "../etc/passwd").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(!app.state.storage().pw_file.exists());

        let bad = UserRecord::new("no spaces allowed", "h");
        assert!(UserRepository::upsert(&app.state, &bad).is_err());
    }

    #[test]
    fn test_delete() {
        let app = test_app();
        let alice = app.add_user("alice");
        app.add_user("bob");

        assert_eq!(UserRepository::delete(&app.state, "alice").unwrap(), Some(alice));
        assert!(UserRepository::delete(&app.state, "alice").unwrap().is_none());

        let users = UserRepository::list(&app.state).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "bob");
    }

    #[test]
    fn test_find_by_email() {
        let app = test_app();
        let mut user = UserRecord::new("alice", "h");
        user.email = Some("a@example.com".to_string());
        UserRepository::upsert(&app.state, &user).unwrap();

        let found = UserRepository::find_by_email(&app.state, "a@example.com").unwrap();
        assert_eq!(found.map(|u| u.username), Some("alice".to_string()));
        assert!(UserRepository::find_by_email(&app.state, "b@example.com")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_damaged_entry_only_affects_its_user() {
        let app = test_app();
        let storage = app.state.storage();
        let good = serde_json::to_value(UserRecord::new("bob", "h")).unwrap();
        let bad = serde_json::json!({"username": "alice", "pwhash": 7});
        write_json(&storage.pw_file, &serde_json::json!([bad, good])).unwrap();

        let err = UserRepository::find_by_username(&app.state, "alice").unwrap_err();
        assert!(matches!(err, AppError::Corrupt { .. }));
        assert!(UserRepository::find_by_username(&app.state, "bob").unwrap().is_some());
        assert_eq!(UserRepository::list(&app.state).unwrap().len(), 1);

        // rewrites keep the damaged entry as it was
        app.add_user("carol");
        let raw: Vec<Value> = read_json(&storage.pw_file).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[0]["pwhash"], 7);
    }

    #[test]
    fn test_invalid_present_file_is_not_reseeded() {
        let app = test_app();
        std::fs::write(&app.state.storage().pw_file, "{not json").unwrap();

        let err = UserRepository::list(&app.state).unwrap_err();
        assert!(matches!(err, AppError::Corrupt { .. }));
        assert_eq!(
            std::fs::read_to_string(&app.state.storage().pw_file).unwrap(),
            "{not json"
        );
    }

    #[test]
    fn test_export_copy() {
        let app = test_app();
        app.add_user("alice");
        let dest = app.dir.path().join("backup.json");

        UserRepository::export_copy(&app.state, &dest).unwrap();
        assert_eq!(
            std::fs::read(&dest).unwrap(),
            std::fs::read(&app.state.storage().pw_file).unwrap()
        );
    }

    #[test]
    fn test_lock_timeout_when_other_process_holds_lock() {
        let app = test_app();
        let other = app.other_process();
        let _held = other.locks().acquire(&other.storage().pw_lock).unwrap();

        let err = UserRepository::find_by_username(&app.state, "alice").unwrap_err();
        assert!(err.is_retryable());
    }
}
