//! Contest model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::usec;
use crate::constants::{NO_COMMENT_VALUE, STATE_VERSION_VALUE};

/// Contest open and close dates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestState {
    pub no_comment: String,
    #[serde(rename = "state_JSON_format_version")]
    pub format_version: String,
    #[serde(with = "usec")]
    pub open_date: DateTime<Utc>,
    #[serde(with = "usec")]
    pub close_date: DateTime<Utc>,
}

impl ContestState {
    pub fn new(open_date: DateTime<Utc>, close_date: DateTime<Utc>) -> Self {
        Self {
            no_comment: NO_COMMENT_VALUE.to_string(),
            format_version: STATE_VERSION_VALUE.to_string(),
            open_date,
            close_date,
        }
    }

    /// Check the fixed tags
    pub fn validate(&self) -> Result<(), String> {
        if self.no_comment != NO_COMMENT_VALUE {
            return Err("invalid state no_comment".to_string());
        }
        if self.format_version != STATE_VERSION_VALUE {
            return Err(format!(
                "invalid state_JSON_format_version: {:?}",
                self.format_version
            ));
        }
        Ok(())
    }
}

/// Where a moment falls relative to the contest window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContestWindow {
    BeforeOpen,
    Open,
    Closed,
    /// The dates could not be determined
    Unknown,
}

impl ContestWindow {
    /// Classify `now` against `[open, close)`.
    ///
    /// `ignore_window` forces [`ContestWindow::Open`]; missing dates give
    /// [`ContestWindow::Unknown`].
    pub fn evaluate(
        ignore_window: bool,
        dates: Option<(DateTime<Utc>, DateTime<Utc>)>,
        now: DateTime<Utc>,
    ) -> Self {
        if ignore_window {
            return Self::Open;
        }
        match dates {
            None => Self::Unknown,
            Some((open, _)) if now < open => Self::BeforeOpen,
            Some((_, close)) if now >= close => Self::Closed,
            Some(_) => Self::Open,
        }
    }

    /// `(before_open, is_open, after_close)`; all false when unknown
    pub fn flags(self) -> (bool, bool, bool) {
        match self {
            Self::BeforeOpen => (true, false, false),
            Self::Open => (false, true, false),
            Self::Closed => (false, false, true),
            Self::Unknown => (false, false, false),
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl std::fmt::Display for ContestWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BeforeOpen => write!(f, "not yet open"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
