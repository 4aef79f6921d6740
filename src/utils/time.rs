//! Time utilities

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use crate::constants::{DATETIME_FRACTION_RE, DATETIME_PARSE_FORMAT, DATETIME_USEC_FORMAT};

static FRACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DATETIME_FRACTION_RE).unwrap_or_else(|e| panic!("invalid DATETIME_FRACTION_RE: {e}"))
});

/// Get current UTC time
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS.ffffff UTC`
pub fn format_usec(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_USEC_FORMAT).to_string()
}

/// Parse a timestamp written by [`format_usec`].
///
/// The fractional seconds are required and limited to microseconds, so
/// every accepted value formats back unchanged in precision.
pub fn parse_usec(s: &str) -> Option<DateTime<Utc>> {
    if !FRACTION.is_match(s) {
        return None;
    }
    NaiveDateTime::parse_from_str(s, DATETIME_PARSE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
