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

//! Error-burst detection: windows whose error count stands out from the rest.

use super::Detector;
use crate::parser::entry::LogEntry;
use crate::stats::histogram::window_start;
use crate::stats::statistics::Spread;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorBurstConfig {
    pub window_minutes: u32,
    /// A window must score strictly above this z-score
    pub z_threshold: f64,
    /// ...and hold at least this many errors
    pub min_errors: usize,
}

impl Default for ErrorBurstConfig {
    fn default() -> Self {
        Self {
            window_minutes: 5,
            z_threshold: 2.0,
            min_errors: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBurst {
    /// `YYYY-MM-DD HH:MM - HH:MM`
    pub time_period: String,
    pub window_start: DateTime<Utc>,
    pub error_count: usize,
    pub ips_involved_count: usize,
    pub z_score: f64,
    pub mean_errors: f64,
    /// Error count at which the z-score threshold is crossed
    pub threshold: f64,
    pub status_codes: BTreeMap<u16, usize>,
    pub explanation: String,
}

pub struct ErrorBurstDetector {
    config: ErrorBurstConfig,
}

impl ErrorBurstDetector {
    pub const fn new(config: ErrorBurstConfig) -> Self {
        Self { config }
    }
}

impl Detector for ErrorBurstDetector {
    type Finding = ErrorBurst;

    fn name(&self) -> &'static str {
        "error bursts"
    }

    fn detect(&self, entries: &[LogEntry]) -> Vec<ErrorBurst> {
        profiling::scope!("ErrorBurstDetector::detect");
        let minutes = self.config.window_minutes;

        // Every window with traffic takes part, including error-free ones.
        let mut windows: BTreeMap<DateTime<Utc>, Vec<&LogEntry>> = BTreeMap::new();
        for entry in entries {
            let errors = windows
                .entry(window_start(entry.date_time, minutes))
                .or_default();
            if entry.is_error() {
                errors.push(entry);
            }
        }

        let counts: Vec<f64> = windows.values().map(|errors| errors.len() as f64).collect();
        let Some(spread) = Spread::of(&counts) else {
            tracing::debug!("Only {} window(s), skipping burst detection", counts.len());
            return Vec::new();
        };
        if !spread.has_variance() {
            tracing::debug!("Error counts have no variance across {} windows", counts.len());
            return Vec::new();
        }

        let threshold = spread.mean + self.config.z_threshold * spread.std_dev;
        let mut bursts: Vec<ErrorBurst> = windows
            .iter()
            .filter_map(|(start, errors)| {
                let z_score = spread.z_score(errors.len() as f64)?;
                (z_score > self.config.z_threshold && errors.len() >= self.config.min_errors)
                    .then(|| self.describe(*start, errors, z_score, spread.mean, threshold))
            })
            .collect();

        bursts.sort_by(|a, b| b.error_count.cmp(&a.error_count));
        bursts
    }
}

impl ErrorBurstDetector {
    fn describe(
        &self,
        start: DateTime<Utc>,
        errors: &[&LogEntry],
        z_score: f64,
        mean_errors: f64,
        threshold: f64,
    ) -> ErrorBurst {
        let minutes = self.config.window_minutes;
        let end = start + Duration::minutes(i64::from(minutes));

        let mut status_codes = BTreeMap::new();
        for entry in errors {
            *status_codes.entry(entry.status_code).or_insert(0) += 1;
        }
        let ips_involved_count = errors
            .iter()
            .map(|e| e.ip_address.as_str())
            .collect::<HashSet<_>>()
            .len();
        let error_count = errors.len();

        ErrorBurst {
            time_period: format!(
                "{} - {}",
                start.format("%Y-%m-%d %H:%M"),
                end.format("%H:%M")
            ),
            window_start: start,
            error_count,
            ips_involved_count,
            z_score,
            mean_errors,
            threshold,
            status_codes,
            explanation: format!(
                "Found {error_count} errors from {ips_involved_count} IPs in a {minutes}-minute window \
                 (z-score {z_score:.2}), which exceeds the threshold of {threshold:.2} \
                 (baseline: {mean_errors:.2} errors)"
            ),
        }
    }
}
