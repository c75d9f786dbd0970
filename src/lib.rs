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

//! Access-log analytics.
//!
//! Raw combined-format text is parsed into [`LogEntry`] values, narrowed
//! with a [`Filter`], then either aggregated for the dashboard
//! ([`stats`], [`Dashboard`]) or scanned for anomalies ([`anomaly`]).

pub mod anomaly;
pub mod config;
pub mod core;
pub mod parser;
pub mod stats;

pub use crate::anomaly::{analyze, try_analyze, AnalysisError, AnomalyConfig, AnomalyReport};
pub use crate::config::AppConfig;
pub use crate::core::{apply_filter, load_file, Dashboard, Filter, GeoTable, LogSummary};
pub use crate::parser::entry::LogEntry;
pub use crate::parser::{parse_content, parse_line, ParseOutcome};
