//! Domain models
//!
//! Typed schemas for the three on-disk record kinds. Every key of a record is
//! mandatory, including the nullable ones: a missing key fails
//! deserialization instead of silently defaulting to `None`.

pub mod contest;
pub mod slot;
pub mod user;

pub use contest::*;
pub use slot::*;
pub use user::*;

use serde::{Deserialize, Deserializer};

/// Require the key to be present while allowing `null`
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

/// Timestamps in the record layout `YYYY-MM-DD HH:MM:SS.ffffff UTC`
pub(crate) mod usec {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::utils::time::{format_usec, parse_usec};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_usec(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_usec(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw:?}")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        use crate::utils::time::parse_usec;

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => super::serialize(dt, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => parse_usec(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw:?}"))),
                None => Ok(None),
            }
        }
    }
}
