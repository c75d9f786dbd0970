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

//! Predicate filtering of parsed entries.
//!
//! A [`Filter`] is a conjunction: an entry passes only when it satisfies
//! every constraint that is set. Filters arrive as JSON from outside
//! callers, so deserialization is lenient. Unknown keys are ignored and
//! malformed values are logged and treated as unset.

use crate::parser::entry::LogEntry;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Status values meaning "any status"
const ANY_STATUS: &[&str] = &["", "-1", "all", "any"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Filter {
    /// Inclusive lower day bound
    #[serde(alias = "date_from", deserialize_with = "lenient_date")]
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper day bound; the whole day is included
    #[serde(alias = "date_to", deserialize_with = "lenient_date")]
    pub date_to: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_text")]
    pub method: Option<String>,
    /// Case-sensitive substring of the request path
    #[serde(deserialize_with = "lenient_text")]
    pub path: Option<String>,
    /// Case-insensitive substring of the user agent
    #[serde(deserialize_with = "lenient_text")]
    pub browser: Option<String>,
    #[serde(alias = "status_code", deserialize_with = "lenient_status")]
    pub status_code: Option<u16>,
}

/// Parse a filter date from `YYYY-MM-DD`, `DD/MM/YYYY` or an RFC 3339
/// datetime (only its date is kept).
pub fn parse_filter_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d/%m/%Y"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn lenient_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => {
            let date = parse_filter_date(&text);
            if date.is_none() {
                tracing::warn!("Ignoring unparseable filter date {text:?}");
            }
            date
        }
        other => {
            tracing::warn!("Ignoring filter date of unexpected type: {other}");
            None
        }
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => non_empty(&text),
        other => {
            tracing::warn!("Ignoring non-text filter value: {other}");
            None
        }
    })
}

fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    let raw = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(None),
        Value::Number(n) => n.to_string(),
        Value::String(text) => text.trim().to_ascii_lowercase(),
        other => {
            tracing::warn!("Ignoring status filter of unexpected type: {other}");
            return Ok(None);
        }
    };
    if ANY_STATUS.contains(&raw.as_str()) {
        return Ok(None);
    }
    let status = raw.parse::<u16>().ok();
    if status.is_none() {
        tracing::warn!("Ignoring invalid status filter {raw:?}");
    }
    Ok(status)
}

impl Filter {
    /// Parse a filter from a JSON object
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        let date = entry.date();
        if self.date_from.is_some_and(|from| date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| date > to) {
            return false;
        }
        if let Some(method) = self.method.as_deref().filter(|m| !m.is_empty()) {
            if !entry.method.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        if let Some(path) = self.path.as_deref() {
            if !entry.path.contains(path) {
                return false;
            }
        }
        if let Some(browser) = self.browser.as_deref() {
            if !entry
                .user_agent
                .to_lowercase()
                .contains(&browser.to_lowercase())
            {
                return false;
            }
        }
        self.status_code
            .is_none_or(|status| entry.status_code == status)
    }

    /// Merge `other` into this filter.
    ///
    /// Only the date bounds are intersected. For method, path, browser and
    /// status a value set in `other` overrides ours instead of being ANDed
    /// with it, so the result equals applying both filters one after the
    /// other only when they constrain different fields.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            date_from: self.date_from.max(other.date_from),
            date_to: match (self.date_to, other.date_to) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
            method: other.method.clone().or_else(|| self.method.clone()),
            path: other.path.clone().or_else(|| self.path.clone()),
            browser: other.browser.clone().or_else(|| self.browser.clone()),
            status_code: other.status_code.or(self.status_code),
        }
    }
}

/// Entries passing `filter`, in their original order
pub fn apply_filter(entries: &[LogEntry], filter: &Filter) -> Vec<LogEntry> {
    profiling::scope!("apply_filter");
    if filter.is_empty() {
        return entries.to_vec();
    }
    entries
        .iter()
        .filter(|entry| filter.matches(entry))
        .cloned()
        .collect()
}
