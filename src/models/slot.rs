//! Slot model
//!
//! A slot is one upload bay of a user. Its record describes the submit file
//! currently held (if any). The record is either empty (`filename` and all
//! of `length`, `date`, `SHA256` null) or fully populated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, usec};
use crate::constants::{
    EMPTY_SLOT_STATUS, NO_COMMENT_VALUE, SHA256_HEXLEN, SLOT_VERSION_VALUE,
};

/// Contents of `slot.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub no_comment: String,
    #[serde(rename = "slot_JSON_format_version")]
    pub format_version: String,
    #[serde(rename = "slot")]
    pub slot_num: u32,
    #[serde(deserialize_with = "nullable")]
    pub filename: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub length: Option<u64>,
    #[serde(with = "usec::option")]
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "SHA256", deserialize_with = "nullable")]
    pub sha256: Option<String>,
    pub collected: bool,
    pub status: String,
}

/// First failing rule of a slot record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotValidationError {
    #[error("invalid slot no_comment")]
    NoComment,
    #[error("invalid slot_JSON_format_version")]
    FormatVersion,
    #[error("wrong slot number: {found} != {expected}")]
    WrongSlot { expected: u32, found: u32 },
    #[error("slot filename does not begin with submit.")]
    FilenamePrefix,
    #[error("slot filename does not begin with submit.{username}-{slot_num}.")]
    FilenameOwner { username: String, slot_num: u32 },
    #[error("slot filename does not end with .txz")]
    FilenameSuffix,
    #[error("invalid slot filename timestamp")]
    FilenameTimestamp,
    #[error("slot length is missing")]
    MissingLength,
    #[error("have length w/o filename")]
    LengthWithoutFilename,
    #[error("slot date is missing")]
    MissingDate,
    #[error("have date w/o filename")]
    DateWithoutFilename,
    #[error("slot SHA256 length is wrong")]
    Sha256Length,
    #[error("have SHA256 w/o filename")]
    Sha256WithoutFilename,
    #[error("submit file was collected w/o filename")]
    CollectedWithoutFilename,

    // Disagreements between the record and the slot directory
    #[error("submit file corrupted contents")]
    CorruptedContents,
    #[error("submit file collected but still exists")]
    CollectedButPresent,
    #[error("submit file length is wrong: {found} != {expected}")]
    WrongLength { expected: u64, found: u64 },
    #[error("submit file is missing")]
    SubmitMissing,
    #[error("submit file is gone but not collected")]
    GoneNotCollected,
    #[error("submit file is expected to exist but does not")]
    NoSubmitFile,
}

impl SlotRecord {
    /// Record of a freshly initialized slot
    pub fn empty(slot_num: u32) -> Self {
        Self {
            no_comment: NO_COMMENT_VALUE.to_string(),
            format_version: SLOT_VERSION_VALUE.to_string(),
            slot_num,
            filename: None,
            length: None,
            date: None,
            sha256: None,
            collected: false,
            status: EMPTY_SLOT_STATUS.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filename.is_none()
    }

    /// Check the record on its own, without looking at the slot directory
    pub fn validate(&self, username: &str, slot_num: u32) -> Result<(), SlotValidationError> {
        use SlotValidationError as E;

        if self.no_comment != NO_COMMENT_VALUE {
            return Err(E::NoComment);
        }
        if self.format_version != SLOT_VERSION_VALUE {
            return Err(E::FormatVersion);
        }
        if self.slot_num != slot_num {
            return Err(E::WrongSlot {
                expected: slot_num,
                found: self.slot_num,
            });
        }

        match &self.filename {
            Some(filename) => {
                SubmitFilename::check(filename, username, slot_num)?;
                if self.length.is_none() {
                    return Err(E::MissingLength);
                }
                if self.date.is_none() {
                    return Err(E::MissingDate);
                }
                match &self.sha256 {
                    Some(hash) if is_sha256_hex(hash) => {}
                    _ => return Err(E::Sha256Length),
                }
            }
            None => {
                if self.length.is_some() {
                    return Err(E::LengthWithoutFilename);
                }
                if self.date.is_some() {
                    return Err(E::DateWithoutFilename);
                }
                if self.sha256.is_some() {
                    return Err(E::Sha256WithoutFilename);
                }
                if self.collected {
                    return Err(E::CollectedWithoutFilename);
                }
            }
        }
        Ok(())
    }
}

fn is_sha256_hex(hash: &str) -> bool {
    hash.len() == SHA256_HEXLEN && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Parsed `submit.<username>-<slot>.<timestamp>.txz`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitFilename {
    pub username: String,
    pub slot_num: u32,
    /// At least ten digits, no leading zero
    pub timestamp: String,
}

impl SubmitFilename {
    /// Split a submit filename into its parts
    pub fn parse(filename: &str) -> Option<Self> {
        let stem = filename.strip_prefix("submit.")?.strip_suffix(".txz")?;
        let (owner, timestamp) = stem.rsplit_once('.')?;
        let (username, slot) = owner.rsplit_once('-')?;
        if username.is_empty()
            || slot.is_empty()
            || !slot.bytes().all(|b| b.is_ascii_digit())
            || !is_submit_timestamp(timestamp)
        {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            slot_num: slot.parse().ok()?,
            timestamp: timestamp.to_string(),
        })
    }

    /// Check `filename` belongs to `username` and `slot_num`
    pub fn check(filename: &str, username: &str, slot_num: u32) -> Result<(), SlotValidationError> {
        use SlotValidationError as E;

        let rest = filename.strip_prefix("submit.").ok_or(E::FilenamePrefix)?;
        let rest = rest
            .strip_prefix(&format!("{username}-{slot_num}."))
            .ok_or_else(|| E::FilenameOwner {
                username: username.to_string(),
                slot_num,
            })?;
        let timestamp = rest.strip_suffix(".txz").ok_or(E::FilenameSuffix)?;
        if !is_submit_timestamp(timestamp) {
            return Err(E::FilenameTimestamp);
        }
        Ok(())
    }
}

impl std::fmt::Display for SubmitFilename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "submit.{}-{}.{}.txz",
            self.username, self.slot_num, self.timestamp
        )
    }
}

fn is_submit_timestamp(ts: &str) -> bool {
    ts.len() >= 10
        && ts.bytes().all(|b| b.is_ascii_digit())
        && !ts.starts_with('0')
}
