//! Time utilities: millisecond timestamps and RFC 3339 rendering.

use chrono::Utc;

/// Get the current Unix timestamp in UTC (milliseconds).
pub fn now_utc_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a Unix timestamp (milliseconds, UTC) to RFC 3339 format.
///
/// Out-of-range timestamps fall back to the Unix epoch rather than
/// panicking; they can only come from internal state, never from clients.
pub fn timestamp_to_rfc3339(timestamp_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_millis)
        .unwrap_or_default()
        .to_rfc3339()
}
