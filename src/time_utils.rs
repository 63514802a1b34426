// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Human relative-time label for a feed entry timestamp.
///
/// Entries live at most 24 h, so days are never needed.
pub fn relative_label(timestamp: &str, now: DateTime<Utc>) -> String {
    let Ok(ts) = DateTime::parse_from_rfc3339(timestamp) else {
        return String::new();
    };
    let elapsed = now.signed_duration_since(ts.with_timezone(&Utc));
    let minutes = elapsed.num_minutes();

    if minutes < 1 {
        "Ahora mismo".to_string()
    } else if minutes < 60 {
        format!("Hace {} min", minutes)
    } else {
        format!("Hace {} h", elapsed.num_hours())
    }
}
