// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 timestamp into UTC. `None` if malformed.
pub fn parse_utc_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Whether `value` names a moment after `now`. Malformed dates are never
/// considered upcoming.
pub fn is_upcoming(value: &str, now: DateTime<Utc>) -> bool {
    parse_utc_rfc3339(value).is_some_and(|d| d > now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_upcoming() {
        let now = parse_utc_rfc3339("2026-01-01T00:00:00Z").unwrap();
        assert!(is_upcoming("2026-01-01T00:00:01Z", now));
        assert!(!is_upcoming("2025-12-31T23:59:59Z", now));
        assert!(!is_upcoming("not a date", now));
        assert!(is_upcoming("2026-01-01T01:00:00+00:30", now));
    }
}
