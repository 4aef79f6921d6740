//! Input validation utilities
//!
//! Firewall checks applied to caller supplied values before any file is
//! touched.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{MAX_SUBMIT_SLOT, MAX_USERNAME_LENGTH, MIN_USERNAME_LENGTH, POSIX_SAFE_RE};
use crate::error::{AppError, AppResult};

static POSIX_SAFE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(POSIX_SAFE_RE).unwrap_or_else(|e| panic!("invalid POSIX_SAFE_RE: {e}"))
});

/// Matches any submit file, regardless of owner or slot
pub static ANY_SUBMIT_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^submit\..*\.txz$").unwrap_or_else(|e| panic!("invalid submit glob: {e}"))
});

/// Validate username format
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.len() < MIN_USERNAME_LENGTH {
        return Err("username is empty");
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err("username is too long");
    }
    if !POSIX_SAFE.is_match(username) {
        return Err("username is not POSIX safe");
    }
    Ok(())
}

/// Validate a slot number
pub fn validate_slot_num(slot_num: u32) -> Result<(), &'static str> {
    if slot_num > MAX_SUBMIT_SLOT {
        return Err("slot number is out of range");
    }
    Ok(())
}

/// Username firewall as an [`AppError`]
pub fn check_username(username: &str) -> AppResult<()> {
    validate_username(username)
        .map_err(|msg| AppError::InvalidInput(format!("{msg}: {username:?}")))
}

/// Username and slot number firewall as an [`AppError`]
pub fn check_user_slot(username: &str, slot_num: u32) -> AppResult<()> {
    check_username(username)?;
    validate_slot_num(slot_num).map_err(|msg| AppError::InvalidInput(format!("{msg}: {slot_num}")))
}

/// Basic e-mail shape check
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format");
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err("Invalid email format");
    }
    if !domain.contains('.') {
        return Err("Invalid email domain");
    }
    Ok(())
}
