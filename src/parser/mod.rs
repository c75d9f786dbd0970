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

//! Access-log line parsing.
//!
//! [`parse_line`] turns one combined-format line into a [`LogEntry`] or
//! nothing; [`parse_content`] runs it over a whole file's text.

pub mod entry;
pub mod timestamp;

use entry::LogEntry;
use fancy_regex::Regex;
use rayon::prelude::*;
use std::sync::LazyLock;

// IP - USER [TIMESTAMP] "METHOD PATH PROTOCOL" STATUS BYTES "REFERER" "USER_AGENT"
static ACCESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+) - (\S+) \[([^\]]+)\] "(\S+) (.*?) (\S+)" (\d{3}) (\d+) "([^"]*)" "([^"]*)""#)
        .expect("access line pattern is valid")
});

/// Result of parsing a block of log text.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub entries: Vec<LogEntry>,
    /// Non-blank lines that produced no entry
    pub skipped_lines: usize,
}

/// Parse one access-log line.
///
/// Returns `None` for anything that does not fully match the grammar, for
/// an unparseable timestamp and for a status outside 100..=599. Never panics.
pub fn parse_line(raw: &str) -> Option<LogEntry> {
    let caps = ACCESS_LINE.captures(raw).ok()??;
    let group = |index: usize| caps.get(index).map(|m| m.as_str());

    let date_time = timestamp::parse_timestamp(group(3)?)?;
    let status_code: u16 = group(7)?
        .parse()
        .ok()
        .filter(|code| (100..=599).contains(code))?;
    let bytes: u64 = group(8)?.parse().ok()?;
    let referer = group(9)?;

    Some(LogEntry {
        ip_address: group(1)?.to_string(),
        date_time,
        method: group(4)?.to_string(),
        path: group(5)?.to_string(),
        status_code,
        bytes,
        referer: (referer != "-").then(|| referer.to_string()),
        user_agent: group(10)?.to_string(),
    })
}

/// Parse every non-blank line of `content`.
///
/// Lines are parsed in parallel; the order of `entries` follows the input.
pub fn parse_content(content: &str) -> ParseOutcome {
    profiling::scope!("parse_content");

    let parsed: Vec<Option<LogEntry>> = content
        .par_lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect();

    let candidates = parsed.len();
    let entries: Vec<LogEntry> = parsed.into_iter().flatten().collect();
    let skipped_lines = candidates - entries.len();

    tracing::debug!(
        "Parsed {} entries from {candidates} lines ({skipped_lines} skipped)",
        entries.len()
    );

    ParseOutcome {
        entries,
        skipped_lines,
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::entry::LogEntry;
    use chrono::NaiveDateTime;

    /// Entry at `at` (`YYYY-MM-DD HH:MM:SS`, UTC) with neutral defaults.
    pub fn entry(ip: &str, at: &str, status_code: u16) -> LogEntry {
        let date_time = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M:%S")
            .expect("fixture timestamp")
            .and_utc();
        LogEntry {
            ip_address: ip.to_string(),
            date_time,
            method: "GET".to_string(),
            path: "/".to_string(),
            status_code,
            bytes: 0,
            referer: None,
            user_agent: "Mozilla/5.0".to_string(),
        }
    }

    pub fn entry_at_path(ip: &str, at: &str, path: &str, status_code: u16) -> LogEntry {
        LogEntry {
            path: path.to_string(),
            ..entry(ip, at, status_code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"10.0.0.1 - - [17/Apr/2025:05:10:56 +0100] "GET /a HTTP/1.1" 200 512 "-" "UA""#;

    #[test]
    fn test_well_formed_line() {
        let entry = parse_line(LINE).expect("line should parse");
        assert_eq!(entry.ip_address, "10.0.0.1");
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.path, "/a");
        assert_eq!(entry.status_code, 200);
        assert_eq!(entry.bytes, 512);
        assert_eq!(entry.referer, None);
        assert_eq!(entry.user_agent, "UA");
        assert_eq!(entry.date_time.to_rfc3339(), "2025-04-17T04:10:56+00:00");
    }

    #[test]
    fn test_referer_and_query_string_kept() {
        let line = r#"192.168.1.1 - bob [17/Apr/2025:05:10:56 +0000] "POST /search?q=a b HTTP/2.0" 302 0 "https://example.com/x" "Mozilla/5.0 (X11)""#;
        let entry = parse_line(line).expect("line should parse");
        assert_eq!(entry.path, "/search?q=a b");
        assert_eq!(entry.bytes, 0);
        assert_eq!(entry.referer.as_deref(), Some("https://example.com/x"));
        assert_eq!(entry.user_agent, "Mozilla/5.0 (X11)");
    }

    #[test]
    fn test_malformed_lines_are_dropped() {
        // Missing closing quote on the request
        assert!(parse_line(
            r#"10.0.0.1 - - [17/Apr/2025:05:10:56 +0100] "GET /a HTTP/1.1 200 512 "-" "UA""#
        )
        .is_none());
        // Truncated status
        assert!(parse_line(r#"10.0.0.1 - - [17/Apr/2025:05:10:56 +0100] "GET /a HTTP/1.1" 20"#).is_none());
        // Empty request line
        assert!(parse_line(r#"10.0.0.1 - - [17/Apr/2025:05:10:56 +0100] "" 400 0 "-" "-""#).is_none());
        assert!(parse_line("").is_none());
        assert!(parse_line("not a log line at all").is_none());
    }

    #[test]
    fn test_out_of_range_status_is_rejected() {
        let line = LINE.replace(" 200 ", " 999 ");
        assert!(parse_line(&line).is_none());
        let line = LINE.replace(" 200 ", " 099 ");
        assert!(parse_line(&line).is_none());
    }

    #[test]
    fn test_bad_timestamp_drops_entry() {
        let line = LINE.replace("17/Apr/2025:05:10:56 +0100", "99/Zzz/2025:05:10:56 +0100");
        assert!(parse_line(&line).is_none());
    }

    #[test]
    fn test_generic_timestamp_fallback() {
        let line = LINE.replace("17/Apr/2025:05:10:56 +0100", "2025-04-17T05:10:56Z");
        let entry = parse_line(&line).expect("fallback timestamp should parse");
        assert_eq!(entry.date_time.to_rfc3339(), "2025-04-17T05:10:56+00:00");
    }

    #[test]
    fn test_parse_content_counts_skipped_lines() {
        let content = format!("{LINE}\n\ngarbage\n{LINE}\n   \n10.0.0.2 - - [17/Apr");
        let outcome = parse_content(&content);
        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(outcome.skipped_lines, 2);
    }

    #[test]
    fn test_parse_content_preserves_order() {
        let content: String = (0..200)
            .map(|i| LINE.replace("/a", &format!("/p{i}")) + "\n")
            .collect();
        let outcome = parse_content(&content);
        let paths: Vec<String> = outcome.entries.iter().map(|e| e.path.clone()).collect();
        let expected: Vec<String> = (0..200).map(|i| format!("/p{i}")).collect();
        assert_eq!(paths, expected);
    }
}
