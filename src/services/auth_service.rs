//! Authentication service
//!
//! Password hashing and the login policy applied to user records.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};

use crate::{
    constants::{MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH},
    db::repositories::UserRepository,
    error::{AppError, AppResult},
    models::UserRecord,
    state::AppState,
    utils::{crypto::generate_secure_token, time::now_utc},
};

/// Authentication service
pub struct AuthService;

impl AuthService {
    /// Hash password using Argon2
    pub fn hash_password(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        Ok(hash)
    }

    /// Verify password against hash
    pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Validation(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Random password that satisfies [`AuthService::is_proper_password`]
    pub fn generate_password() -> String {
        (0..4)
            .map(|_| generate_secure_token(5))
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Password length rules
    pub fn is_proper_password(password: &str) -> Result<(), String> {
        let len = password.chars().count();
        if len < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            ));
        }
        if len > MAX_PASSWORD_LENGTH {
            return Err(format!(
                "password must be at most {MAX_PASSWORD_LENGTH} characters"
            ));
        }
        Ok(())
    }

    /// Whether the account may log in at `now`.
    ///
    /// Disabled accounts are refused, and so are accounts whose forced
    /// password change deadline has passed.
    pub fn user_allowed_to_login(user: &UserRecord, now: DateTime<Utc>) -> bool {
        Self::login_refusal(user, now).is_none()
    }

    /// Why the account may not log in at `now`, if it may not
    pub fn login_refusal(user: &UserRecord, now: DateTime<Utc>) -> Option<&'static str> {
        if user.login_disabled {
            return Some("account disabled");
        }
        if Self::password_change_overdue(user, now) {
            return Some("password change deadline passed");
        }
        None
    }

    /// Forced password change whose deadline lies before `now`
    pub fn password_change_overdue(user: &UserRecord, now: DateTime<Utc>) -> bool {
        user.force_password_change
            && user
                .password_change_deadline
                .is_some_and(|deadline| now > deadline)
    }

    /// Whether the user has to pick a new password before doing anything else
    pub fn must_change_password(user: &UserRecord) -> bool {
        user.force_password_change
    }

    /// Look up `username` and check `password`.
    ///
    /// Returns the record when the user exists, may log in and the password
    /// matches.
    pub fn verify_user_password(
        state: &AppState,
        username: &str,
        password: &str,
    ) -> AppResult<Option<UserRecord>> {
        let Some(user) = UserRepository::find_by_username(state, username)? else {
            return Ok(None);
        };
        if let Some(reason) = Self::login_refusal(&user, now_utc()) {
            tracing::info!(username, reason, "login refused");
            return Ok(None);
        }
        if !Self::verify_password(password, &user.password_hash)? {
            return Ok(None);
        }
        Ok(Some(user))
    }

    /// Replace a user's password after checking the old one.
    ///
    /// Clears any pending forced change.
    pub fn update_password(
        state: &AppState,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<UserRecord> {
        let mut user = UserRepository::find_by_username(state, username)?
            .ok_or_else(|| AppError::NotFound(format!("no such user: {username}")))?;

        if !Self::verify_password(old_password, &user.password_hash)? {
            return Err(AppError::Validation("old password is incorrect".to_string()));
        }
        if old_password == new_password {
            return Err(AppError::Validation(
                "new password must differ from the old one".to_string(),
            ));
        }
        Self::is_proper_password(new_password).map_err(AppError::Validation)?;

        user.password_hash = Self::hash_password(new_password)?;
        user.clear_forced_change();
        UserRepository::upsert(state, &user)?;

        tracing::info!(username, "password changed");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_app;
    use chrono::Duration;

    #[test]
    fn test_hash_and_verify() {
        let hash = AuthService::hash_password("correct horse battery").unwrap();
        assert!(AuthService::verify_password("correct horse battery", &hash).unwrap());
        assert!(!AuthService::verify_password("wrong horse battery", &hash).unwrap());
        assert!(AuthService::verify_password("x", "not a phc string").is_err());
    }

    #[test]
    fn test_generated_password_is_proper() {
        let pw = AuthService::generate_password();
        assert_eq!(pw.len(), 23);
        assert!(AuthService::is_proper_password(&pw).is_ok());
        assert_ne!(pw, AuthService::generate_password());
    }

    #[test]
    fn test_password_length_rules() {
        assert!(AuthService::is_proper_password("short").is_err());
        assert!(AuthService::is_proper_password(&"x".repeat(15)).is_ok());
        assert!(AuthService::is_proper_password(&"x".repeat(40)).is_ok());
        assert!(AuthService::is_proper_password(&"x".repeat(41)).is_err());
    }

    #[test]
    fn test_login_policy() {
        let now = Utc::now();
        let mut user = UserRecord::new("alice", "h");
        assert!(AuthService::user_allowed_to_login(&user, now));

        user.force_change_by(now + Duration::days(1));
        assert!(AuthService::user_allowed_to_login(&user, now));
        assert!(AuthService::must_change_password(&user));
        assert!(!AuthService::user_allowed_to_login(&user, now + Duration::days(2)));
        assert_eq!(
            AuthService::login_refusal(&user, now + Duration::days(2)),
            Some("password change deadline passed")
        );

        user.login_disabled = true;
        assert_eq!(
            AuthService::login_refusal(&user, now + Duration::days(2)),
            Some("account disabled")
        );

        user.clear_forced_change();
        assert!(!AuthService::user_allowed_to_login(&user, now));
        assert_eq!(AuthService::login_refusal(&user, now), Some("account disabled"));
    }

    #[test]
    fn test_verify_user_password_and_update() {
        let app = test_app();
        let old = "an old but long password";
        let new = "a brand new long password";
        let mut user = UserRecord::new("alice", AuthService::hash_password(old).unwrap());
        user.force_change_by(Utc::now() + Duration::days(1));
        UserRepository::upsert(&app.state, &user).unwrap();

        assert!(AuthService::verify_user_password(&app.state, "alice", old).unwrap().is_some());
        assert!(AuthService::verify_user_password(&app.state, "alice", new).unwrap().is_none());
        assert!(AuthService::verify_user_password(&app.state, "bob", old).unwrap().is_none());

        assert!(matches!(
            AuthService::update_password(&app.state, "alice", "nope", new),
            Err(AppError::Validation(_))
        ));
        assert!(AuthService::update_password(&app.state, "alice", old, "short").is_err());

        let updated = AuthService::update_password(&app.state, "alice", old, new).unwrap();
        assert!(!updated.force_password_change);
        assert!(updated.password_change_deadline.is_none());
        assert!(AuthService::verify_user_password(&app.state, "alice", new).unwrap().is_some());
    }

    #[test]
    fn test_disabled_user_cannot_log_in() {
        let app = test_app();
        let pw = "a perfectly fine password";
        let mut user = UserRecord::new("alice", AuthService::hash_password(pw).unwrap());
        user.login_disabled = true;
        UserRepository::upsert(&app.state, &user).unwrap();

        assert!(AuthService::verify_user_password(&app.state, "alice", pw).unwrap().is_none());
    }
}
