//! User service
//!
//! Account management flows used by the command line tools. E-mail
//! uniqueness is checked here, before records reach the repository.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    constants::UUID_USERNAME_ATTEMPTS,
    db::repositories::UserRepository,
    error::{AppError, AppResult},
    models::UserRecord,
    services::AuthService,
    state::AppState,
    utils::{time::now_utc, validation::validate_email},
};

/// Account settings; `None` leaves a field as it is on update
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    /// Plain text password, hashed before it is stored
    pub password: Option<String>,
    pub ignore_contest_window: Option<bool>,
    pub force_password_change: Option<bool>,
    /// Overrides the configured grace period of a forced change
    pub grace_period_secs: Option<i64>,
    pub login_disabled: Option<bool>,
    /// `Some(None)` clears the address
    pub email: Option<Option<String>>,
}

/// Newly created account
#[derive(Debug, Clone)]
pub struct CreatedUser {
    pub user: UserRecord,
    /// Set when the password was generated
    pub generated_password: Option<String>,
}

/// User service for business logic
pub struct UserService;

impl UserService {
    /// Get user by username
    pub fn get_user(state: &AppState, username: &str) -> AppResult<UserRecord> {
        UserRepository::find_by_username(state, username)?
            .ok_or_else(|| AppError::NotFound(format!("no such user: {username}")))
    }

    /// Create a new account; a password is generated if none is given
    pub fn add_user(
        state: &AppState,
        username: &str,
        changes: AccountChanges,
    ) -> AppResult<CreatedUser> {
        if UserRepository::find_by_username(state, username)?.is_some() {
            return Err(AppError::AlreadyExists(format!("user already exists: {username}")));
        }
        Self::create(state, username, changes)
    }

    /// Create an account named by a random UUID
    pub fn add_uuid_user(state: &AppState, changes: AccountChanges) -> AppResult<CreatedUser> {
        for _ in 0..UUID_USERNAME_ATTEMPTS {
            let username = Uuid::new_v4().to_string();
            if UserRepository::find_by_username(state, &username)?.is_none() {
                return Self::create(state, &username, changes);
            }
            tracing::warn!(%username, "random username already taken");
        }
        Err(AppError::AlreadyExists(
            "could not find an unused UUID username".to_string(),
        ))
    }

    /// Change an existing account, keeping every unspecified field
    pub fn update_user(
        state: &AppState,
        username: &str,
        changes: AccountChanges,
    ) -> AppResult<UserRecord> {
        let mut user = Self::get_user(state, username)?;
        Self::apply(state, &mut user, changes)?;
        UserRepository::upsert(state, &user)?;
        Ok(user)
    }

    /// Set or clear the e-mail address of an account
    pub fn set_email(
        state: &AppState,
        username: &str,
        email: Option<&str>,
    ) -> AppResult<UserRecord> {
        Self::update_user(
            state,
            username,
            AccountChanges {
                email: Some(email.map(str::to_string)),
                ..Default::default()
            },
        )
    }

    /// Look an account up by username, or by e-mail address when
    /// `by_username` is false
    pub fn find_account(state: &AppState, key: &str, by_username: bool) -> AppResult<UserRecord> {
        if by_username {
            return Self::get_user(state, key);
        }
        UserRepository::find_by_email(state, key)?.ok_or_else(|| {
            AppError::NotFound(format!("registered email address not found: {key}"))
        })
    }

    /// Whether the account still logs in but missed its password change deadline
    pub fn is_expired(user: &UserRecord, now: DateTime<Utc>) -> bool {
        !user.login_disabled && AuthService::password_change_overdue(user, now)
    }

    /// Every account for which [`UserService::is_expired`] holds at `now`
    pub fn expired_users(state: &AppState, now: DateTime<Utc>) -> AppResult<Vec<UserRecord>> {
        Ok(UserRepository::list(state)?
            .into_iter()
            .filter(|user| Self::is_expired(user, now))
            .collect())
    }

    /// Remove an account
    pub fn delete_user(state: &AppState, username: &str) -> AppResult<UserRecord> {
        UserRepository::delete(state, username)?
            .ok_or_else(|| AppError::NotFound(format!("no such user: {username}")))
    }

    fn create(state: &AppState, username: &str, changes: AccountChanges) -> AppResult<CreatedUser> {
        let mut changes = changes;
        let generated_password = match changes.password {
            Some(_) => None,
            None => {
                let pw = AuthService::generate_password();
                changes.password = Some(pw.clone());
                Some(pw)
            }
        };

        let mut user = UserRecord::new(username, String::new());
        Self::apply(state, &mut user, changes)?;
        UserRepository::upsert(state, &user)?;

        Ok(CreatedUser {
            user,
            generated_password,
        })
    }

    fn apply(state: &AppState, user: &mut UserRecord, changes: AccountChanges) -> AppResult<()> {
        if let Some(email) = changes.email {
            if let Some(address) = email.as_deref() {
                validate_email(address)
                    .map_err(|msg| AppError::Validation(format!("{msg}: {address}")))?;
                if let Some(owner) = UserRepository::find_by_email(state, address)? {
                    if owner.username != user.username {
                        return Err(AppError::AlreadyExists(format!(
                            "email already in use: {address}"
                        )));
                    }
                }
            }
            user.email = email;
        }

        if let Some(password) = changes.password {
            AuthService::is_proper_password(&password).map_err(AppError::Validation)?;
            user.password_hash = AuthService::hash_password(&password)?;
        }
        if let Some(ignore) = changes.ignore_contest_window {
            user.ignore_contest_window = ignore;
        }
        if let Some(disabled) = changes.login_disabled {
            user.login_disabled = disabled;
        }
        match changes.force_password_change {
            Some(true) => {
                let grace = changes
                    .grace_period_secs
                    .unwrap_or(state.config().accounts.grace_period_secs);
                user.force_change_by(now_utc() + Duration::seconds(grace));
            }
            Some(false) => user.clear_forced_change(),
            None => {}
        }
        Ok(())
    }
}
