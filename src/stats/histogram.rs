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

//! Request histograms and the time-window primitive used for rate and burst
//! detection.

use crate::parser::entry::LogEntry;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of hour-of-day buckets
pub const HOURS_PER_DAY: usize = 24;

/// Bucketing mode for [`requests_by_time`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Time-of-day distribution: every entry folds onto one of 24 hour slots
    /// regardless of its date. Not a timeline.
    #[default]
    Hourly,
    /// One bucket per calendar day that has traffic, in chronological order
    Daily,
}

/// Labelled request counts, ready for charting
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: Vec<String>,
    pub counts: Vec<usize>,
}

impl TimeSeries {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Count requests per hour of day or per calendar day (UTC).
pub fn requests_by_time(entries: &[LogEntry], granularity: Granularity) -> TimeSeries {
    profiling::scope!("requests_by_time");

    match granularity {
        Granularity::Hourly => {
            let mut counts = vec![0usize; HOURS_PER_DAY];
            for entry in entries {
                counts[entry.hour() as usize] += 1;
            }
            TimeSeries {
                labels: (0..HOURS_PER_DAY).map(|hour| format!("{hour}:00")).collect(),
                counts,
            }
        }
        Granularity::Daily => {
            let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();
            for entry in entries {
                *days.entry(entry.date()).or_insert(0) += 1;
            }
            let (labels, counts) = days
                .into_iter()
                .map(|(day, count)| (day.format("%Y-%m-%d").to_string(), count))
                .unzip();
            TimeSeries { labels, counts }
        }
    }
}

/// Start of the fixed-width window containing `ts`.
///
/// Windows are aligned to the Unix epoch, so a 5-minute window always starts
/// at :00, :05, :10, ...
pub fn window_start(ts: DateTime<Utc>, window_minutes: u32) -> DateTime<Utc> {
    let width = i64::from(window_minutes.max(1)) * 60;
    let seconds = ts.timestamp();
    let floored = seconds - seconds.rem_euclid(width);
    DateTime::from_timestamp(floored, 0).unwrap_or(ts)
}

/// Request count per occupied window, chronologically ordered.
pub fn count_by_window<'a, I>(entries: I, window_minutes: u32) -> BTreeMap<DateTime<Utc>, usize>
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let mut windows = BTreeMap::new();
    for entry in entries {
        *windows
            .entry(window_start(entry.date_time, window_minutes))
            .or_insert(0) += 1;
    }
    windows
}
