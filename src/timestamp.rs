// Timestamp normalization for backend message payloads.
//
// The backend emits timestamps in more than one shape: RFC 3339 with an
// offset, RFC 3339 without one, and a space-separated form with no offset
// at all. Everything is normalized to a timezone-qualified string before
// parsing; offset-less values are taken as UTC.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

/// Normalize a raw backend timestamp to RFC 3339 form.
///
/// Replaces the first space date/time separator with `T` and appends `Z`
/// when no UTC/offset marker is present. Idempotent: normalizing an
/// already-normalized timestamp is a no-op.
pub fn normalize_timestamp(raw: &str) -> String {
    let mut value = raw.trim().replacen(' ', "T", 1);
    if !has_offset_marker(&value) {
        value.push('Z');
    }
    value
}

/// Parse a raw backend timestamp into a UTC instant.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let normalized = normalize_timestamp(raw);
    DateTime::parse_from_rfc3339(&normalized)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Invalid timestamp '{}': {}", raw, e))
}

// An offset marker is a trailing Z or a +/- offset in the time part. The
// date part uses '-' too, so only the segment after the separator counts.
fn has_offset_marker(value: &str) -> bool {
    let time_part = match value.split_once('T') {
        Some((_, time)) => time,
        None => return false,
    };
    time_part.ends_with('Z')
        || time_part.ends_with('z')
        || time_part.contains('+')
        || time_part.contains('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_separated_offsetless_gets_utc_marker() {
        assert_eq!(
            normalize_timestamp("2024-01-01 10:00:00"),
            "2024-01-01T10:00:00Z"
        );
    }

    #[test]
    fn already_normalized_is_untouched() {
        assert_eq!(
            normalize_timestamp("2024-01-01T10:00:00+05:30"),
            "2024-01-01T10:00:00+05:30"
        );
        assert_eq!(
            normalize_timestamp("2024-01-01T10:00:00Z"),
            "2024-01-01T10:00:00Z"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = "2024-01-01 10:00:00";
        let once = normalize_timestamp(raw);
        assert_eq!(normalize_timestamp(&once), once);
    }

    #[test]
    fn negative_offset_is_recognized() {
        assert_eq!(
            normalize_timestamp("2024-01-01T10:00:00-03:00"),
            "2024-01-01T10:00:00-03:00"
        );
    }

    #[test]
    fn parses_to_utc() {
        let dt = parse_timestamp("2024-01-01 10:00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-01T10:00:00+00:00");

        // +05:30 is 04:30 UTC
        let dt = parse_timestamp("2024-01-01T10:00:00+05:30").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-01T04:30:00+00:00");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("not a timestamp").is_err());
    }
}
