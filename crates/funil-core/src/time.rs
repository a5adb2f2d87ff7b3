// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamp helpers.
//!
//! All timestamps are stored as millisecond-precision UTC ISO-8601 text with
//! a `Z` suffix. The fixed width keeps lexicographic and chronological order
//! identical, which the storage layer relies on for `scheduled_for <= now`
//! comparisons done as text.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current time in canonical storage form, e.g. `2026-08-07T12:34:56.789Z`.
pub fn now_iso() -> String {
    to_iso(Utc::now())
}

/// Render any UTC instant in canonical storage form.
pub fn to_iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a canonical timestamp back into a UTC instant.
pub fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
