//! Provider timestamp parsing.
//!
//! Providers mix RFC 3339 (`2024-03-02T09:21:45-05:00`, `...Z`) with
//! ISO-8601 offsets lacking the colon (`2024-03-02T14:21:45+0000`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `deserialize_with` helper for required timestamp fields.
pub fn deserialize<'de, D>(d: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp `{raw}`")))
}
