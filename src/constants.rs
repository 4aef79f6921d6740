//! Application-wide constants
//!
//! This module contains all constant values used throughout the application.
//! Constants are grouped by their purpose for better organization.

// =============================================================================
// RECORD FORMAT TAGS
// =============================================================================

/// Mandatory comment carried by every JSON record
pub const NO_COMMENT_VALUE: &str =
    "mandatory comment: because comments were removed from the original JSON spec";

/// Format version of a user record in the password file
pub const PASSWORD_VERSION_VALUE: &str = "1.3 2025-02-12";

/// Format version of the contest state file
pub const STATE_VERSION_VALUE: &str = "1.2 2025-01-26";

/// Format version of a slot file
pub const SLOT_VERSION_VALUE: &str = "1.2 2025-01-26";

/// Status of a freshly initialized slot
pub const EMPTY_SLOT_STATUS: &str = "slot is empty";

/// Status written after a successful upload
pub const UPLOADED_SLOT_STATUS: &str = "file successfully uploaded into slot.";

/// Status written after a successful move into the staging area
pub const STAGED_SLOT_STATUS: &str = "successfully moved submit file into the staging area";

// =============================================================================
// USERS
// =============================================================================

/// Username minimum length
pub const MIN_USERNAME_LENGTH: usize = 1;

/// Username maximum length (a UUID is 36 characters)
pub const MAX_USERNAME_LENGTH: usize = 40;

/// POSIX portable filename pattern usernames must match
pub const POSIX_SAFE_RE: &str = r"^[0-9A-Za-z][0-9A-Za-z._+-]*$";

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 15;

/// Maximum password length
pub const MAX_PASSWORD_LENGTH: usize = 40;

/// Default grace period in seconds to change a password when a change is forced
pub const DEFAULT_GRACE_PERIOD_SECS: i64 = 14 * 24 * 3600;

/// Attempts made to find an unused random UUID username
pub const UUID_USERNAME_ATTEMPTS: usize = 10;

// =============================================================================
// SLOTS
// =============================================================================

/// Highest slot number; slots run from 0 to MAX_SUBMIT_SLOT inclusive
pub const MAX_SUBMIT_SLOT: u32 = 9;

/// Length of a SHA-256 digest in hex characters
pub const SHA256_HEXLEN: usize = 64;

/// Read buffer used when hashing a submit file (about 20 memory pages)
pub const SHA256_BUFSIZE: usize = 20 * 4096;

/// Name of the JSON document inside a slot directory
pub const SLOT_FILE_NAME: &str = "slot.json";

/// Name of the lock file inside a slot directory
pub const SLOT_LOCK_NAME: &str = "lock";

/// Mode of user and slot directories
pub const DIR_MODE: u32 = 0o2770;

/// Mode of lock files
pub const LOCK_FILE_MODE: u32 = 0o664;

/// Mode of JSON documents
pub const RECORD_FILE_MODE: u32 = 0o644;

// =============================================================================
// LOCKING DEFAULTS
// =============================================================================

/// Default lock acquisition timeout in seconds
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 13;

/// Default lower bound of the jittered lock poll interval in milliseconds
pub const DEFAULT_LOCK_POLL_MIN_MS: u64 = 800;

/// Default upper bound of the jittered lock poll interval in milliseconds
pub const DEFAULT_LOCK_POLL_MAX_MS: u64 = 1200;

// =============================================================================
// TIMESTAMPS
// =============================================================================

/// Timestamp layout written to every record, microsecond precision
pub const DATETIME_USEC_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f UTC";

/// Accepted layout when parsing
pub const DATETIME_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f UTC";

/// Seconds must carry a fraction of one to six digits
pub const DATETIME_FRACTION_RE: &str = r":\d{2}\.\d{1,6} UTC$";

// =============================================================================
// STORAGE LAYOUT
// =============================================================================

/// Default application directory
pub const DEFAULT_APPDIR: &str = "/var/submit-portal";

/// Storage paths relative to the application directory
pub mod paths {
    pub const PW_FILE: &str = "etc/passwd.json";
    pub const INIT_PW_FILE: &str = "etc/init.passwd.json";
    pub const PW_LOCK: &str = "etc/passwd.lock";
    pub const STATE_FILE: &str = "etc/state.json";
    pub const INIT_STATE_FILE: &str = "etc/init.state.json";
    pub const STATE_LOCK: &str = "etc/state.lock";
    pub const USERS_DIR: &str = "users";
    pub const STAGED_DIR: &str = "staged";
    pub const UNEXPECTED_DIR: &str = "unexpected";
}
