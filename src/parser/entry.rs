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

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// One successfully parsed access-log line.
///
/// Entries are only ever built from a line that matched the whole grammar, so
/// every field is populated. Serialized field names follow the dashboard's
/// camelCase wire shape (`ipAddress`, `dateTime`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub ip_address: String,
    pub date_time: DateTime<Utc>,
    pub method: String,
    /// Raw request target, query string included
    pub path: String,
    pub status_code: u16,
    /// Response size; `0` is a real zero-byte response
    pub bytes: u64,
    /// `None` when the log carried the `-` placeholder
    pub referer: Option<String>,
    pub user_agent: String,
}

impl LogEntry {
    /// 4xx and 5xx responses
    pub const fn is_error(&self) -> bool {
        self.status_code >= 400
    }

    /// Hour of day (UTC), 0-23
    pub fn hour(&self) -> u32 {
        self.date_time.hour()
    }

    /// Calendar day (UTC)
    pub fn date(&self) -> NaiveDate {
        self.date_time.date_naive()
    }
}
