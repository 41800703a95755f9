//! Timestamp helpers for Stratus.
//!
//! All timestamps are stored as UTC text in `"%Y-%m-%d %H:%M:%S"` format so
//! that Rust-side values compare correctly against SQLite's
//! `datetime('now')` in WHERE clauses.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Storage format for timestamps, matching SQLite's `datetime('now')`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time as a storage string.
pub fn now_string() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// A storage string for `now + duration`.
pub fn from_now(duration: Duration) -> String {
    (Utc::now() + duration).format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a storage string back into a UTC datetime.
pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
