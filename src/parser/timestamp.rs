// AccessCrab - GPL-3.0-or-later
// This file is part of AccessCrab.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// AccessCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// AccessCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with AccessCrab.  If not, see <https://www.gnu.org/licenses/>.

//! Timestamp parsing for access-log lines.
//!
//! Parsing is an ordered list of strategies, each returning `Option`. The
//! first strategy that yields an instant wins; if none does, the caller drops
//! the line. Every strategy normalizes to UTC, applying the captured offset
//! when the text carries one and reading offset-less text as UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use fancy_regex::Regex;
use std::sync::LazyLock;

// 17/Apr/2025:05:10:56 +0100 (offset optional)
static CLF_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{1,2})/([A-Za-z]{3})/(\d{4}):(\d{2}):(\d{2}):(\d{2})(?:\s+([+-])(\d{2})(\d{2}))?$",
    )
    .expect("CLF timestamp pattern is valid")
});

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// A single way of turning timestamp text into an instant.
pub type TimestampStrategy = fn(&str) -> Option<DateTime<Utc>>;

/// Default strategy order: the access-log sub-grammar first, then generic
/// date strings.
pub const DEFAULT_STRATEGIES: &[TimestampStrategy] =
    &[parse_clf, parse_rfc3339, parse_rfc2822, parse_naive_utc];

/// Parse a timestamp with [`DEFAULT_STRATEGIES`].
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    parse_timestamp_with(text, DEFAULT_STRATEGIES)
}

/// Try `strategies` in order, returning the first success.
pub fn parse_timestamp_with(
    text: &str,
    strategies: &[TimestampStrategy],
) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    strategies.iter().find_map(|strategy| strategy(text))
}

fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|month| month.eq_ignore_ascii_case(name))
        .map(|index| index as u32 + 1)
}

/// `DD/Mon/YYYY:HH:MM:SS [+-]ZZZZ`, built from the captured fields.
pub fn parse_clf(text: &str) -> Option<DateTime<Utc>> {
    let caps = CLF_TIMESTAMP.captures(text).ok()??;
    let field = |index: usize| caps.get(index).map(|m| m.as_str());

    let day: u32 = field(1)?.parse().ok()?;
    let month = month_number(field(2)?)?;
    let year: i32 = field(3)?.parse().ok()?;
    let hour: u32 = field(4)?.parse().ok()?;
    let minute: u32 = field(5)?.parse().ok()?;
    let second: u32 = field(6)?.parse().ok()?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;

    let offset_seconds = match (field(7), field(8), field(9)) {
        (Some(sign), Some(hours), Some(minutes)) => {
            let hours: i32 = hours.parse().ok()?;
            let minutes: i32 = minutes.parse().ok()?;
            let magnitude = hours * 3600 + minutes * 60;
            if sign == "-" {
                -magnitude
            } else {
                magnitude
            }
        }
        _ => 0,
    };

    let offset = FixedOffset::east_opt(offset_seconds)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// ISO-8601 / RFC 3339 with an explicit offset.
pub fn parse_rfc3339(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RFC 2822, e.g. `Thu, 17 Apr 2025 05:10:56 +0100`.
pub fn parse_rfc2822(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Offset-less `YYYY-MM-DD HH:MM:SS` variants, read as UTC.
pub fn parse_naive_utc(text: &str) -> Option<DateTime<Utc>> {
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}
