//! Normalization of raw device timestamps
//!
//! Device logs carry timestamps either as epoch milliseconds (number or numeric
//! string) or as ISO-8601 / RFC 3339 text. Everything that cannot be read is
//! mapped to [`RecordTime::Invalid`] rather than propagated.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::warn;

use crate::types::RecordTime;

/// Naive layouts tried after RFC 3339 and RFC 2822
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Normalize a raw JSON timestamp.
///
/// A missing field should be mapped to [`RecordTime::Absent`] by the caller;
/// this function only sees values that are present. An epoch value of zero
/// marks a field the device never set and is `Invalid` without a warning.
pub fn parse_timestamp(raw: &Value) -> RecordTime {
    if epoch_millis(raw).is_some_and(|millis| millis.div_euclid(1000) == 0) {
        return RecordTime::Invalid;
    }

    let parsed = match raw {
        Value::Number(n) => number_millis(n).and_then(from_epoch_millis),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    };

    match parsed {
        Some(dt) => RecordTime::Valid(dt),
        None => {
            warn!(timestamp = %raw, "Received an invalid timestamp");
            RecordTime::Invalid
        }
    }
}

/// Whole milliseconds of a JSON number; fractions are truncated
fn number_millis(n: &serde_json::Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
            .map(|f| f.trunc() as i64)
    })
}

/// Epoch milliseconds carried as a number or an integer string
fn epoch_millis(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => number_millis(n),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Parse timestamp text: integer epoch milliseconds first, then date formats
pub fn parse_timestamp_str(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    if let Ok(millis) = trimmed.parse::<i64>() {
        return from_epoch_millis(millis);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%z") {
        return Some(dt.naive_local());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Whole seconds since the epoch as UTC wall-clock time. Zero means "unset".
fn from_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    let secs = millis.div_euclid(1000);
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}
