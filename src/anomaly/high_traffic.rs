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

//! High-traffic IP detection.
//!
//! Each IP's peak request count per window is compared against an IQR fence
//! over all IPs' peaks; an IP that carries an outsized share of the total
//! traffic is flagged as well.

use super::Detector;
use crate::parser::entry::LogEntry;
use crate::stats::histogram::count_by_window;
use crate::stats::statistics::{self, EPSILON};
use crate::stats::{group_by_ip, rank};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Paths listed per flagged IP
const PATH_DISTRIBUTION_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighTrafficConfig {
    pub window_minutes: u32,
    /// Fence is `q3 + iqr_factor * iqr`
    pub iqr_factor: f64,
    /// Floor for the rate fence, and minimum requests for a share-based flag
    pub min_requests: usize,
    /// Percentage of all requests above which an IP is flagged
    pub traffic_share_threshold: f64,
}

impl Default for HighTrafficConfig {
    fn default() -> Self {
        Self {
            window_minutes: 60,
            iqr_factor: 2.5,
            min_requests: 20,
            traffic_share_threshold: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighTrafficIp {
    pub ip_address: String,
    pub request_count: usize,
    pub max_rate_per_window: usize,
    /// Share of all requests in scope, 0-100
    pub traffic_percentage: f64,
    pub rate_threshold: f64,
    pub q3: f64,
    pub iqr: f64,
    pub status_code_distribution: BTreeMap<u16, usize>,
    /// Most requested paths of this IP, busiest first
    pub path_distribution: IndexMap<String, usize>,
    pub explanation: String,
}

/// Rate fence derived from all IPs' peak window rates
#[derive(Debug, Clone, Copy)]
struct RateFence {
    threshold: f64,
    q3: f64,
    iqr: f64,
}

pub struct HighTrafficDetector {
    config: HighTrafficConfig,
}

impl HighTrafficDetector {
    pub const fn new(config: HighTrafficConfig) -> Self {
        Self { config }
    }

    fn fence(&self, peak_rates: &[f64]) -> Option<RateFence> {
        let q1 = statistics::quantile(peak_rates, 0.25)?;
        let q3 = statistics::quantile(peak_rates, 0.75)?;
        let iqr = q3 - q1;
        let fence = if iqr > EPSILON {
            self.config.iqr_factor.mul_add(iqr, q3)
        } else {
            statistics::mean(peak_rates)? * self.config.iqr_factor
        };
        Some(RateFence {
            threshold: fence.max(self.config.min_requests as f64),
            q3,
            iqr,
        })
    }
}

impl Detector for HighTrafficDetector {
    type Finding = HighTrafficIp;

    fn name(&self) -> &'static str {
        "high traffic IPs"
    }

    fn detect(&self, entries: &[LogEntry]) -> Vec<HighTrafficIp> {
        profiling::scope!("HighTrafficDetector::detect");

        let by_ip = group_by_ip(entries);
        if by_ip.len() < 2 {
            tracing::debug!("Fewer than two IPs, skipping high-traffic detection");
            return Vec::new();
        }

        let peaks: Vec<usize> = by_ip
            .values()
            .map(|requests| {
                count_by_window(requests.iter().copied(), self.config.window_minutes)
                    .into_values()
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        let peak_rates: Vec<f64> = peaks.iter().map(|&p| p as f64).collect();
        let Some(fence) = self.fence(&peak_rates) else {
            return Vec::new();
        };

        let total = entries.len() as f64;
        let mut flagged: Vec<HighTrafficIp> = by_ip
            .iter()
            .zip(peaks)
            .filter_map(|((ip, requests), max_rate)| {
                let traffic_percentage = requests.len() as f64 / total * 100.0;
                let rate_exceeded = max_rate as f64 >= fence.threshold;
                let share_exceeded = traffic_percentage > self.config.traffic_share_threshold
                    && requests.len() >= self.config.min_requests;
                (rate_exceeded || share_exceeded).then(|| {
                    self.describe(ip, requests, max_rate, traffic_percentage, fence, share_exceeded)
                })
            })
            .collect();

        flagged.sort_by(|a, b| b.max_rate_per_window.cmp(&a.max_rate_per_window));
        flagged
    }
}

impl HighTrafficDetector {
    fn describe(
        &self,
        ip: &str,
        requests: &[&LogEntry],
        max_rate: usize,
        traffic_percentage: f64,
        fence: RateFence,
        share_exceeded: bool,
    ) -> HighTrafficIp {
        let mut status_code_distribution = BTreeMap::new();
        for entry in requests {
            *status_code_distribution.entry(entry.status_code).or_insert(0) += 1;
        }
        let path_distribution: IndexMap<String, usize> = rank(requests.iter().map(|e| e.path.as_str()))
            .into_iter()
            .take(PATH_DISTRIBUTION_LIMIT)
            .map(|(path, hits)| (path.to_string(), hits))
            .collect();

        let request_count = requests.len();
        let RateFence { threshold, q3, iqr } = fence;
        let mut explanation = format!(
            "IP {ip} made {request_count} requests with a maximum rate of {max_rate} requests per \
             {}-minute window (threshold {threshold:.2}, Q3: {q3:.2}, IQR: {iqr:.2})",
            self.config.window_minutes
        );
        if share_exceeded {
            explanation.push_str(&format!(
                " and accounts for {traffic_percentage:.1}% of all traffic"
            ));
        }

        HighTrafficIp {
            ip_address: ip.to_string(),
            request_count,
            max_rate_per_window: max_rate,
            traffic_percentage,
            rate_threshold: threshold,
            q3,
            iqr,
            status_code_distribution,
            path_distribution,
            explanation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::fixtures::{entry, entry_at_path};

    fn busy_log() -> Vec<LogEntry> {
        let mut entries = Vec::new();
        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"] {
            entries.push(entry(ip, "2025-04-17 09:10:00", 200));
            entries.push(entry(ip, "2025-04-17 11:20:00", 200));
        }
        for i in 0..30 {
            let path = if i % 3 == 0 { "/login" } else { "/api/items" };
            let status = if i % 5 == 0 { 429 } else { 200 };
            let at = format!("2025-04-17 10:{:02}:00", i);
            entries.push(entry_at_path("203.0.113.9", &at, path, status));
        }
        entries
    }

    #[test]
    fn test_flags_the_heavy_ip() {
        let entries = busy_log();
        let flagged = HighTrafficDetector::new(HighTrafficConfig::default()).detect(&entries);
        assert_eq!(flagged.len(), 1);
        let ip = &flagged[0];
        assert_eq!(ip.ip_address, "203.0.113.9");
        assert_eq!(ip.request_count, 30);
        assert_eq!(ip.max_rate_per_window, 30);
        assert!((ip.rate_threshold - 20.0).abs() < 1e-9);
        assert!((ip.traffic_percentage - 30.0 / 38.0 * 100.0).abs() < 1e-9);
        assert_eq!(ip.status_code_distribution.get(&429), Some(&6));
        assert_eq!(
            ip.path_distribution.keys().collect::<Vec<_>>(),
            vec!["/api/items", "/login"]
        );
        assert!(ip.explanation.contains("% of all traffic"));
    }

    #[test]
    fn test_iqr_fence_over_spread_out_peaks() {
        let mut entries = Vec::new();
        for k in 1..=8 {
            for i in 0..k {
                let at = format!("2025-04-17 09:{:02}:00", i);
                entries.push(entry(&format!("10.0.0.{k}"), &at, 200));
            }
        }
        for i in 0..60 {
            let at = format!("2025-04-17 10:{:02}:00", i);
            entries.push(entry("203.0.113.9", &at, 200));
        }
        let flagged = HighTrafficDetector::new(HighTrafficConfig::default()).detect(&entries);
        assert_eq!(flagged.len(), 1);
        let ip = &flagged[0];
        assert_eq!(ip.ip_address, "203.0.113.9");
        assert_eq!(ip.max_rate_per_window, 60);
        assert!((ip.q3 - 7.0).abs() < 1e-9);
        assert!((ip.iqr - 4.0).abs() < 1e-9);
        // q3 + 2.5 * iqr = 17, raised to the min_requests floor
        assert!((ip.rate_threshold - 20.0).abs() < 1e-9);
        assert!((ip.traffic_percentage - 62.5).abs() < 1e-9);
    }

    #[test]
    fn test_traffic_share_alone_flags_a_slow_ip() {
        let mut entries = Vec::new();
        for hour in 0..24 {
            for minute in [0, 30] {
                let at = format!("2025-04-17 {hour:02}:{minute:02}:00");
                entries.push(entry("198.51.100.1", &at, 200));
            }
        }
        for k in 0..8 {
            entries.push(entry(&format!("10.0.0.{k}"), "2025-04-17 12:05:00", 200));
            entries.push(entry(&format!("10.0.0.{k}"), "2025-04-17 12:10:00", 200));
        }
        let flagged = HighTrafficDetector::new(HighTrafficConfig::default()).detect(&entries);
        assert_eq!(flagged.len(), 1);
        let ip = &flagged[0];
        assert_eq!(ip.ip_address, "198.51.100.1");
        assert_eq!(ip.max_rate_per_window, 2);
        assert!((ip.max_rate_per_window as f64) < ip.rate_threshold);
        assert!((ip.traffic_percentage - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentages_are_bounded() {
        let entries = busy_log();
        for ip in HighTrafficDetector::new(HighTrafficConfig::default()).detect(&entries) {
            assert!((0.0..=100.0).contains(&ip.traffic_percentage));
        }
    }

    #[test]
    fn test_single_ip_is_never_flagged() {
        let entries: Vec<LogEntry> = (0..50)
            .map(|i| entry("10.0.0.1", &format!("2025-04-17 10:{:02}:00", i), 200))
            .collect();
        assert!(HighTrafficDetector::new(HighTrafficConfig::default())
            .detect(&entries)
            .is_empty());
    }

    #[test]
    fn test_even_traffic_is_not_flagged() {
        let entries: Vec<LogEntry> = (0..40)
            .map(|i| entry(&format!("10.0.0.{}", i % 8), &format!("2025-04-17 10:{:02}:00", i), 200))
            .collect();
        assert!(HighTrafficDetector::new(HighTrafficConfig::default())
            .detect(&entries)
            .is_empty());
    }
}
