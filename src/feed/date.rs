// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::FeedError;

/// Stand-in for timestamps that were missing or could not be parsed
pub const UNKNOWN_DATE: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// Formats seen in the wild that are not strict RFC 2822
const RELAXED_FORMATS: [&str; 4] = [
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S %z",
];

/// Parse a feed timestamp, accepting RFC 2822, RFC 3339 and a few relaxed variants
pub fn parse_feed_date(date_str: &str) -> Result<DateTime<Utc>, FeedError> {
    let trimmed = date_str.trim();

    let parsed = DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .ok()
        .or_else(|| {
            RELAXED_FORMATS
                .iter()
                .find_map(|format| DateTime::parse_from_str(trimmed, format).ok())
        });

    parsed
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| FeedError::InvalidDate {
            date_str: date_str.to_string(),
            reason: "not a recognised RFC 2822 or RFC 3339 timestamp".to_string(),
        })
}

/// Parse a feed timestamp, substituting [`UNKNOWN_DATE`] when it is malformed
pub fn parse_feed_date_or_unknown(date_str: &str) -> DateTime<Utc> {
    parse_feed_date(date_str).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "substituting unknown date");
        UNKNOWN_DATE
    })
}

/// Parse an `itunes:duration` value (`HH:MM:SS`, `MM:SS` or plain seconds)
pub fn parse_duration(value: &str) -> Option<Duration> {
    let mut seconds: u64 = 0;
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    for part in parts {
        let part = part.trim();
        // Fractional seconds are dropped
        let whole = part.split('.').next().unwrap_or(part);
        let n: u64 = whole.parse().ok()?;
        seconds = seconds.checked_mul(60)?.checked_add(n)?;
    }

    Some(Duration::from_secs(seconds))
}
