//! Utility functions

pub mod crypto;
pub mod time;
pub mod validation;

pub use crypto::{generate_secure_token, hash_string, sha256_file};
pub use time::{format_usec, now_utc, parse_usec};
pub use validation::{check_user_slot, check_username, validate_email, validate_username};
