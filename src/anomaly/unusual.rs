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

//! Unusual per-IP behaviour: off-hours access, deviating error rates and
//! outsized contributions to traffic spikes. The three checks run
//! independently, so one IP may show up under several pattern types.

use super::Detector;
use crate::parser::entry::LogEntry;
use crate::stats::group_by_ip;
use crate::stats::histogram::{count_by_window, HOURS_PER_DAY};
use crate::stats::statistics::Spread;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type IpGroups<'a> = IndexMap<&'a str, Vec<&'a LogEntry>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnusualPatternConfig {
    /// Below this many entries no pattern is reported at all
    pub min_entries: usize,
    /// Patterns scoring below this confidence are dropped
    pub min_confidence: f64,
    /// IPs with fewer requests are ignored
    pub min_ip_requests: usize,
    /// An hour is typical when it holds more than this fraction of all traffic
    pub typical_hour_share: f64,
    /// Requests an IP must make in an atypical hour for it to count
    pub min_hour_requests: usize,
    /// Paths need this many requests overall to get a baseline error rate
    pub min_path_samples: usize,
    /// ...and this many from the IP to be compared
    pub min_ip_path_samples: usize,
    /// Absolute error-rate deviation that marks a path as affected
    pub error_rate_deviation: f64,
    pub rate_window_minutes: u32,
    /// Windows with |z| above this are spikes
    pub rate_z_threshold: f64,
    pub min_windows: usize,
    /// Share of spike traffic an IP must account for
    pub min_contribution: f64,
}

impl Default for UnusualPatternConfig {
    fn default() -> Self {
        Self {
            min_entries: 10,
            min_confidence: 0.8,
            min_ip_requests: 5,
            typical_hour_share: 0.03,
            min_hour_requests: 3,
            min_path_samples: 5,
            min_ip_path_samples: 3,
            error_rate_deviation: 0.3,
            rate_window_minutes: 5,
            rate_z_threshold: 2.5,
            min_windows: 3,
            min_contribution: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathErrorDetail {
    pub baseline_error_rate: f64,
    pub ip_error_rate: f64,
    pub requests: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowDetail {
    pub window_start: DateTime<Utc>,
    pub ip_requests: usize,
    pub total_requests: usize,
    pub z_score: f64,
}

/// Pattern-specific payload, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PatternKind {
    #[serde(rename = "unusual_hour_access")]
    HourAccess {
        unusual_hours: Vec<u32>,
        request_count: usize,
        unusual_count: usize,
    },
    #[serde(rename = "unusual_error_rate")]
    ErrorRate {
        affected_paths: Vec<String>,
        affected_path_count: usize,
        max_deviation: f64,
        path_details: IndexMap<String, PathErrorDetail>,
    },
    #[serde(rename = "unusual_request_rate")]
    RequestRate {
        contribution: f64,
        unusual_requests: usize,
        window_details: Vec<WindowDetail>,
    },
}

impl PatternKind {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::HourAccess { .. } => "unusual_hour_access",
            Self::ErrorRate { .. } => "unusual_error_rate",
            Self::RequestRate { .. } => "unusual_request_rate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnusualPattern {
    pub ip_address: String,
    /// Always within `[0, 1]`
    pub confidence: f64,
    #[serde(flatten)]
    pub kind: PatternKind,
    pub explanation: String,
}

pub struct UnusualPatternDetector {
    config: UnusualPatternConfig,
}

impl UnusualPatternDetector {
    pub const fn new(config: UnusualPatternConfig) -> Self {
        Self { config }
    }

    fn confident(&self, confidence: f64) -> Option<f64> {
        let confidence = confidence.clamp(0.0, 1.0);
        (confidence >= self.config.min_confidence).then_some(confidence)
    }

    fn hour_access(&self, entries: &[LogEntry], by_ip: &IpGroups<'_>) -> Vec<UnusualPattern> {
        let mut hour_counts = [0usize; HOURS_PER_DAY];
        for entry in entries {
            hour_counts[entry.hour() as usize] += 1;
        }
        let floor = entries.len() as f64 * self.config.typical_hour_share;
        let typical: Vec<u32> = (0..HOURS_PER_DAY as u32)
            .filter(|&hour| hour_counts[hour as usize] as f64 > floor)
            .collect();

        let mut patterns = Vec::new();
        for (ip, requests) in by_ip {
            if requests.len() < self.config.min_ip_requests {
                continue;
            }
            let mut ip_hours = [0usize; HOURS_PER_DAY];
            for entry in requests {
                ip_hours[entry.hour() as usize] += 1;
            }
            let unusual_hours: Vec<u32> = (0..HOURS_PER_DAY as u32)
                .filter(|hour| {
                    !typical.contains(hour)
                        && ip_hours[*hour as usize] >= self.config.min_hour_requests
                })
                .collect();
            if unusual_hours.is_empty() {
                continue;
            }

            let unusual_count: usize = unusual_hours.iter().map(|&h| ip_hours[h as usize]).sum();
            let raw = 2.0 * unusual_count as f64 / (requests.len() as f64 + 1.0);
            let Some(confidence) = self.confident(raw) else {
                continue;
            };

            patterns.push(UnusualPattern {
                ip_address: (*ip).to_string(),
                confidence,
                explanation: format!(
                    "IP {ip} made {unusual_count} requests during unusual hours {unusual_hours:?}, \
                     when most traffic occurs during {typical:?}"
                ),
                kind: PatternKind::HourAccess {
                    unusual_hours,
                    request_count: requests.len(),
                    unusual_count,
                },
            });
        }
        patterns
    }

    fn error_rate(&self, entries: &[LogEntry], by_ip: &IpGroups<'_>) -> Vec<UnusualPattern> {
        // (requests, errors) per path
        let mut path_totals: IndexMap<&str, (usize, usize)> = IndexMap::new();
        for entry in entries {
            let totals = path_totals.entry(entry.path.as_str()).or_insert((0, 0));
            totals.0 += 1;
            totals.1 += usize::from(entry.is_error());
        }
        let baselines: IndexMap<&str, f64> = path_totals
            .into_iter()
            .filter(|(_, (requests, _))| *requests >= self.config.min_path_samples)
            .map(|(path, (requests, errors))| (path, errors as f64 / requests as f64))
            .collect();
        if baselines.is_empty() {
            return Vec::new();
        }

        let mut patterns = Vec::new();
        for (ip, requests) in by_ip {
            if requests.len() < self.config.min_ip_requests {
                continue;
            }
            let mut ip_paths: IndexMap<&str, (usize, usize)> = IndexMap::new();
            for entry in requests {
                let totals = ip_paths.entry(entry.path.as_str()).or_insert((0, 0));
                totals.0 += 1;
                totals.1 += usize::from(entry.is_error());
            }

            let path_details: IndexMap<String, PathErrorDetail> = ip_paths
                .into_iter()
                .filter(|(_, (count, _))| *count >= self.config.min_ip_path_samples)
                .filter_map(|(path, (count, errors))| {
                    let baseline = *baselines.get(path)?;
                    let ip_rate = errors as f64 / count as f64;
                    ((ip_rate - baseline).abs() > self.config.error_rate_deviation).then(|| {
                        (
                            path.to_string(),
                            PathErrorDetail {
                                baseline_error_rate: baseline,
                                ip_error_rate: ip_rate,
                                requests: count,
                            },
                        )
                    })
                })
                .collect();
            if path_details.is_empty() {
                continue;
            }

            let affected: usize = path_details.values().map(|d| d.requests).sum();
            let max_deviation = path_details
                .values()
                .map(|d| (d.ip_error_rate - d.baseline_error_rate).abs())
                .fold(0.0, f64::max);
            let raw = 2.0 * max_deviation * affected as f64 / requests.len() as f64;
            let Some(confidence) = self.confident(raw) else {
                continue;
            };

            let affected_paths: Vec<String> = path_details.keys().cloned().collect();
            patterns.push(UnusualPattern {
                ip_address: (*ip).to_string(),
                confidence,
                explanation: format!(
                    "IP {ip} has unusual success/error rates on {} paths, with up to \
                     {max_deviation:.2} deviation from the normal baseline",
                    affected_paths.len()
                ),
                kind: PatternKind::ErrorRate {
                    affected_path_count: affected_paths.len(),
                    affected_paths,
                    max_deviation,
                    path_details,
                },
            });
        }
        patterns
    }

    fn request_rate(&self, entries: &[LogEntry], by_ip: &IpGroups<'_>) -> Vec<UnusualPattern> {
        let minutes = self.config.rate_window_minutes;
        let windows = count_by_window(entries, minutes);
        if windows.len() < self.config.min_windows {
            return Vec::new();
        }
        let counts: Vec<f64> = windows.values().map(|&c| c as f64).collect();
        let Some(spread) = Spread::of(&counts) else {
            return Vec::new();
        };

        let spikes: BTreeMap<DateTime<Utc>, f64> = windows
            .iter()
            .filter_map(|(start, &count)| {
                let z = spread.z_score(count as f64)?;
                (z.abs() > self.config.rate_z_threshold).then_some((*start, z))
            })
            .collect();
        if spikes.is_empty() {
            return Vec::new();
        }
        let spike_traffic: usize = spikes.keys().map(|start| windows[start]).sum();

        let mut patterns = Vec::new();
        for (ip, requests) in by_ip {
            let ip_windows = count_by_window(requests.iter().copied(), minutes);
            if ip_windows.len() < 2 {
                continue;
            }
            let window_details: Vec<WindowDetail> = ip_windows
                .iter()
                .filter_map(|(start, &ip_requests)| {
                    spikes.get(start).map(|&z_score| WindowDetail {
                        window_start: *start,
                        ip_requests,
                        total_requests: windows[start],
                        z_score,
                    })
                })
                .collect();
            let unusual_requests: usize = window_details.iter().map(|w| w.ip_requests).sum();
            if unusual_requests == 0 {
                continue;
            }

            let contribution = unusual_requests as f64 / spike_traffic as f64;
            if contribution <= self.config.min_contribution {
                continue;
            }
            let Some(confidence) = self.confident(1.5 * contribution) else {
                continue;
            };

            patterns.push(UnusualPattern {
                ip_address: (*ip).to_string(),
                confidence,
                explanation: format!(
                    "IP {ip} contributed {unusual_requests} requests during unusual traffic windows, \
                     accounting for {:.1}% of the unusual traffic",
                    contribution * 100.0
                ),
                kind: PatternKind::RequestRate {
                    contribution,
                    unusual_requests,
                    window_details,
                },
            });
        }
        patterns
    }
}

impl Detector for UnusualPatternDetector {
    type Finding = UnusualPattern;

    fn name(&self) -> &'static str {
        "unusual patterns"
    }

    fn detect(&self, entries: &[LogEntry]) -> Vec<UnusualPattern> {
        profiling::scope!("UnusualPatternDetector::detect");

        if entries.len() < self.config.min_entries {
            tracing::debug!(
                "Only {} entries, need {} for pattern detection",
                entries.len(),
                self.config.min_entries
            );
            return Vec::new();
        }

        let by_ip = group_by_ip(entries);
        let mut patterns = self.hour_access(entries, &by_ip);
        patterns.extend(self.error_rate(entries, &by_ip));
        patterns.extend(self.request_rate(entries, &by_ip));

        patterns.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::fixtures::{entry, entry_at_path};

    fn detect(entries: &[LogEntry]) -> Vec<UnusualPattern> {
        UnusualPatternDetector::new(UnusualPatternConfig::default()).detect(entries)
    }

    fn of_type<'a>(patterns: &'a [UnusualPattern], label: &str) -> Vec<&'a UnusualPattern> {
        patterns.iter().filter(|p| p.kind.label() == label).collect()
    }

    /// 252 requests from ten IPs spread over office hours on two days.
    fn office_hours() -> Vec<LogEntry> {
        (0..252)
            .map(|i| {
                let at = format!("2025-04-{} {:02}:{:02}:00", 17 + i % 2, 9 + i % 9, i % 60);
                entry(&format!("10.0.0.{}", i % 10), &at, 200)
            })
            .collect()
    }

    #[test]
    fn test_too_few_entries() {
        let entries: Vec<LogEntry> = (0..9)
            .map(|i| entry("10.0.0.1", &format!("2025-04-17 03:0{i}:00"), 500))
            .collect();
        assert!(detect(&entries).is_empty());
    }

    #[test]
    fn test_unusual_hour_access() {
        let mut entries = office_hours();
        for minute in 0..6 {
            entries.push(entry("198.51.100.7", &format!("2025-04-18 03:{minute:02}:30"), 200));
        }
        let patterns = detect(&entries);
        let hours = of_type(&patterns, "unusual_hour_access");
        assert_eq!(hours.len(), 1);
        assert_eq!(hours[0].ip_address, "198.51.100.7");
        assert!((hours[0].confidence - 1.0).abs() < 1e-9);
        match &hours[0].kind {
            PatternKind::HourAccess {
                unusual_hours,
                unusual_count,
                ..
            } => {
                assert_eq!(unusual_hours, &vec![3]);
                assert_eq!(*unusual_count, 6);
            }
            other => panic!("unexpected pattern {other:?}"),
        }
    }

    #[test]
    fn test_unusual_error_rate() {
        let mut entries = Vec::new();
        for i in 0..20 {
            let at = format!("2025-04-17 10:{:02}:00", i);
            entries.push(entry_at_path(&format!("10.0.0.{}", i % 4), &at, "/login", 200));
        }
        for i in 0..5 {
            let at = format!("2025-04-17 10:{:02}:30", i);
            entries.push(entry_at_path("192.0.2.44", &at, "/login", 401));
        }
        let patterns = detect(&entries);
        let rates = of_type(&patterns, "unusual_error_rate");
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].ip_address, "192.0.2.44");
        match &rates[0].kind {
            PatternKind::ErrorRate {
                affected_paths,
                affected_path_count,
                max_deviation,
                path_details,
            } => {
                assert_eq!(affected_paths, &vec!["/login".to_string()]);
                assert_eq!(*affected_path_count, 1);
                assert!((max_deviation - 0.8).abs() < 1e-9);
                assert!((path_details["/login"].baseline_error_rate - 0.2).abs() < 1e-9);
            }
            other => panic!("unexpected pattern {other:?}"),
        }
    }

    #[test]
    fn test_unusual_request_rate() {
        let mut entries = Vec::new();
        for window in 0..10 {
            for second in 0..2 {
                let at = format!("2025-04-17 10:{:02}:{second:02}", window * 5);
                entries.push(entry("10.0.0.1", &at, 200));
            }
        }
        entries.push(entry("203.0.113.5", "2025-04-17 10:15:30", 200));
        for i in 0..40 {
            let at = format!("2025-04-17 10:{:02}:{:02}", 45 + i / 20, 10 + i % 20);
            entries.push(entry("203.0.113.5", &at, 200));
        }
        let patterns = detect(&entries);
        let rates = of_type(&patterns, "unusual_request_rate");
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].ip_address, "203.0.113.5");
        match &rates[0].kind {
            PatternKind::RequestRate {
                contribution,
                unusual_requests,
                window_details,
            } => {
                assert_eq!(*unusual_requests, 40);
                assert!((contribution - 40.0 / 42.0).abs() < 1e-9);
                assert_eq!(window_details.len(), 1);
                assert_eq!(window_details[0].total_requests, 42);
            }
            other => panic!("unexpected pattern {other:?}"),
        }
    }

    #[test]
    fn test_confidence_bounds_and_ordering() {
        let mut entries = office_hours();
        for minute in 0..6 {
            entries.push(entry("198.51.100.7", &format!("2025-04-18 03:{minute:02}:30"), 404));
        }
        let patterns = detect(&entries);
        assert!(!patterns.is_empty());
        for pattern in &patterns {
            assert!((0.0..=1.0).contains(&pattern.confidence));
        }
        assert!(patterns
            .windows(2)
            .all(|pair| pair[0].confidence >= pair[1].confidence));
    }

    #[test]
    fn test_serialized_shape_is_flat() {
        let pattern = UnusualPattern {
            ip_address: "10.0.0.1".to_string(),
            confidence: 0.9,
            kind: PatternKind::HourAccess {
                unusual_hours: vec![3],
                request_count: 7,
                unusual_count: 6,
            },
            explanation: "x".to_string(),
        };
        let json = serde_json::to_value(&pattern).expect("serializable");
        assert_eq!(json["type"], "unusual_hour_access");
        assert_eq!(json["ip_address"], "10.0.0.1");
        assert_eq!(json["unusual_count"], 6);
    }
}
