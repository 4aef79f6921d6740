//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, usec};
use crate::constants::{NO_COMMENT_VALUE, PASSWORD_VERSION_VALUE};
use crate::utils::validation::validate_username;

/// One element of the password file array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub no_comment: String,
    #[serde(rename = "iocccpasswd_format_version")]
    pub format_version: String,
    pub username: String,
    #[serde(rename = "pwhash")]
    pub password_hash: String,
    /// Ignore the contest open and close dates
    #[serde(rename = "ignore_date")]
    pub ignore_contest_window: bool,
    #[serde(rename = "force_pw_change")]
    pub force_password_change: bool,
    #[serde(rename = "pw_change_by", with = "usec::option")]
    pub password_change_deadline: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub email: Option<String>,
    #[serde(rename = "disable_login")]
    pub login_disabled: bool,
}

impl UserRecord {
    /// New record with every flag cleared
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            no_comment: NO_COMMENT_VALUE.to_string(),
            format_version: PASSWORD_VERSION_VALUE.to_string(),
            username: username.into(),
            password_hash: password_hash.into(),
            ignore_contest_window: false,
            force_password_change: false,
            password_change_deadline: None,
            email: None,
            login_disabled: false,
        }
    }

    /// Check the fixed tags and the username
    pub fn validate(&self) -> Result<(), String> {
        if self.no_comment != NO_COMMENT_VALUE {
            return Err("invalid password no_comment".to_string());
        }
        if self.format_version != PASSWORD_VERSION_VALUE {
            return Err(format!(
                "invalid iocccpasswd_format_version: {:?}",
                self.format_version
            ));
        }
        validate_username(&self.username).map_err(|msg| format!("{msg}: {:?}", self.username))?;
        if self.password_hash.is_empty() {
            return Err("empty password hash".to_string());
        }
        Ok(())
    }

    /// Require a password change by `deadline`
    pub fn force_change_by(&mut self, deadline: DateTime<Utc>) {
        self.force_password_change = true;
        self.password_change_deadline = Some(deadline);
    }

    /// Drop any pending forced password change
    pub fn clear_forced_change(&mut self) {
        self.force_password_change = false;
        self.password_change_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "no_comment": NO_COMMENT_VALUE,
            "iocccpasswd_format_version": PASSWORD_VERSION_VALUE,
            "username": "alice",
            "pwhash": "$argon2id$v=19$m=19456,t=2,p=1$abc$def",
            "ignore_date": false,
            "force_pw_change": true,
            "pw_change_by": "2025-03-01 00:00:00.000000 UTC",
            "email": null,
            "disable_login": false
        })
    }

    #[test]
    fn test_parse_on_disk_layout() {
        let user: UserRecord = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.force_password_change);
        assert!(user.password_change_deadline.is_some());
        assert!(user.email.is_none());
        assert!(user.validate().is_ok());

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back, sample_json());
    }

    #[test]
    fn test_missing_nullable_key_is_rejected() {
        let mut doc = sample_json();
        doc.as_object_mut().unwrap().remove("email");
        assert!(serde_json::from_value::<UserRecord>(doc).is_err());

        let mut doc = sample_json();
        doc.as_object_mut().unwrap().remove("pw_change_by");
        assert!(serde_json::from_value::<UserRecord>(doc).is_err());
    }

    #[test]
    fn test_validate_rejects_wrong_version() {
        let mut user = UserRecord::new("bob", "hash");
        assert!(user.validate().is_ok());

        user.format_version = "0.1".to_string();
        assert!(user.validate().is_err());

        let mut user = UserRecord::new("bad name", "hash");
        assert!(user.validate().is_err());
        user.username = "good".to_string();
        user.no_comment = "chatty".to_string();
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_forced_change_flags_travel_together() {
        let mut user = UserRecord::new("carol", "hash");
        user.force_change_by(Utc::now());
        assert!(user.force_password_change && user.password_change_deadline.is_some());
        user.clear_forced_change();
        assert!(!user.force_password_change && user.password_change_deadline.is_none());
    }
}
