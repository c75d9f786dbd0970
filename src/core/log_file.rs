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

//! Loading access logs from disk and summarizing what was read.

use crate::parser::entry::LogEntry;
use crate::parser::parse_content;
use crate::stats::{total_bandwidth, unique_visitors};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const BYTE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// A parsed log file together with its headline numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    pub file_name: String,
    pub entries: Vec<LogEntry>,
    pub total_requests: usize,
    pub unique_visitors: usize,
    pub total_bandwidth: u64,
    /// Non-blank lines that did not parse
    pub skipped_lines: usize,
}

impl LogSummary {
    pub fn from_content(file_name: impl Into<String>, content: &str) -> Self {
        let outcome = parse_content(content);
        Self {
            file_name: file_name.into(),
            total_requests: outcome.entries.len(),
            unique_visitors: unique_visitors(&outcome.entries),
            total_bandwidth: total_bandwidth(&outcome.entries),
            skipped_lines: outcome.skipped_lines,
            entries: outcome.entries,
        }
    }
}

/// Read and parse the access log at `path`.
///
/// Invalid UTF-8 is replaced rather than rejected so that a single bad
/// byte does not lose the whole file.
pub fn load_file(path: &Path) -> Result<LogSummary> {
    profiling::scope!("load_file");
    let start_time = std::time::Instant::now();

    let buffer = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    tracing::debug!("Read {} bytes from {}", buffer.len(), path.display());

    let content = String::from_utf8_lossy(&buffer);
    let file_name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
    let summary = LogSummary::from_content(file_name, &content);

    if summary.skipped_lines > 0 {
        tracing::warn!(
            "Skipped {} unparseable lines in {}",
            summary.skipped_lines,
            path.display()
        );
    }
    tracing::info!(
        "Loaded {} entries from {} in {:?}",
        summary.total_requests,
        path.display(),
        start_time.elapsed()
    );
    Ok(summary)
}

/// Human-readable byte count with 1024-based units, e.g. `1.5 KB`
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", BYTE_UNITS[unit])
}
