//! Millisecond / nanosecond ↔ [`DateTime<Utc>`] conversions.

use chrono::{DateTime, TimeZone, Utc};

const NANOS_PER_MILLI: i64 = 1_000_000;

/// Milliseconds since the Unix epoch.
pub fn unix_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    unix_millis(Utc::now())
}

/// Instant `millis` milliseconds after the Unix epoch (saturating).
pub fn from_unix_millis(millis: i64) -> DateTime<Utc> {
    from_unix_nanos(millis_to_nanos(millis))
}

/// Instant `nanos` nanoseconds after the Unix epoch.
pub fn from_unix_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

/// Saturating milliseconds → nanoseconds.
pub fn millis_to_nanos(millis: i64) -> i64 {
    millis.saturating_mul(NANOS_PER_MILLI)
}

/// Fractional milliseconds → nanoseconds, rounded to the nearest.
pub fn millis_f64_to_nanos(millis: f64) -> i64 {
    (millis * NANOS_PER_MILLI as f64).round() as i64
}
