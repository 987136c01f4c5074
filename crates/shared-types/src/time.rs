//! Timestamp helpers.
//!
//! Operations carry ISO-8601 strings. Comparisons always go through
//! [`parse_time`] so `2024-01-01T00:00:00Z` and `2024-01-01T00:00:00.000Z`
//! order identically.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::errors::TypeError;

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_time(value: &str) -> Result<DateTime<Utc>, TypeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| TypeError::InvalidTimestamp(value.to_string()))
}

/// Render a timestamp without sub-second precision.
pub fn standard_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Re-render a timestamp string without sub-second precision.
///
/// Unparseable input is returned unchanged.
pub fn normalize_time(value: &str) -> String {
    parse_time(value)
        .map(|t| standard_time(&t))
        .unwrap_or_else(|_| value.to_string())
}

/// Render a timestamp with millisecond precision, the form clients emit.
pub fn iso_millis(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert unix seconds (block times) into an ISO string.
pub fn unix_to_iso(seconds: i64) -> Option<String> {
    Utc.timestamp_opt(seconds, 0).single().map(|t| iso_millis(&t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_millis_and_offsets() {
        let a = parse_time("2024-01-01T00:00:00Z").unwrap();
        let b = parse_time("2024-01-01T00:00:00.000Z").unwrap();
        let c = parse_time("2024-01-01T02:00:00+02:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_normalize_strips_millis() {
        assert_eq!(
            normalize_time("2024-03-05T10:11:12.345Z"),
            "2024-03-05T10:11:12Z"
        );
        assert_eq!(normalize_time("not a time"), "not a time");
    }

    #[test]
    fn test_unix_to_iso() {
        assert_eq!(
            unix_to_iso(1_700_000_000).as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
    }
}
