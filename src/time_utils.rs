// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Convert a provider `expires_at` Unix timestamp, falling back to
/// `now + expires_in` when the provider omits it.
pub fn expiry_from_unix(
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    expires_at
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(|| now + Duration::seconds(expires_in.unwrap_or(0)))
}
