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

pub mod error_burst;
pub mod high_traffic;
pub mod insight;
pub mod unusual;

use crate::parser::entry::LogEntry;
use error_burst::{ErrorBurst, ErrorBurstConfig, ErrorBurstDetector};
use high_traffic::{HighTrafficConfig, HighTrafficDetector, HighTrafficIp};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use unusual::{UnusualPattern, UnusualPatternConfig, UnusualPatternDetector};

/// A single anomaly detection strategy over a batch of entries
pub trait Detector {
    type Finding;

    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Findings for `entries`, most significant first
    fn detect(&self, entries: &[LogEntry]) -> Vec<Self::Finding>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("No log entries to analyze")]
    EmptyInput,
    #[error("Invalid anomaly configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub error_burst: ErrorBurstConfig,
    pub high_traffic: HighTrafficConfig,
    pub unusual: UnusualPatternConfig,
}

impl AnomalyConfig {
    /// Reject settings no detector can work with
    pub fn validate(&self) -> Result<(), AnalysisError> {
        fn check(ok: bool, what: &str) -> Result<(), AnalysisError> {
            if ok {
                Ok(())
            } else {
                Err(AnalysisError::InvalidConfig(what.to_string()))
            }
        }
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;
        let fraction = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);

        let burst = &self.error_burst;
        check(burst.window_minutes > 0, "error_burst.window_minutes must be positive")?;
        check(non_negative(burst.z_threshold), "error_burst.z_threshold must be a non-negative number")?;

        let traffic = &self.high_traffic;
        check(traffic.window_minutes > 0, "high_traffic.window_minutes must be positive")?;
        check(non_negative(traffic.iqr_factor), "high_traffic.iqr_factor must be a non-negative number")?;
        check(
            traffic.traffic_share_threshold.is_finite()
                && (0.0..=100.0).contains(&traffic.traffic_share_threshold),
            "high_traffic.traffic_share_threshold must be a percentage",
        )?;

        let unusual = &self.unusual;
        check(fraction(unusual.min_confidence), "unusual.min_confidence must be within [0, 1]")?;
        check(fraction(unusual.typical_hour_share), "unusual.typical_hour_share must be within [0, 1]")?;
        check(fraction(unusual.min_contribution), "unusual.min_contribution must be within [0, 1]")?;
        check(
            non_negative(unusual.error_rate_deviation),
            "unusual.error_rate_deviation must be a non-negative number",
        )?;
        check(unusual.rate_window_minutes > 0, "unusual.rate_window_minutes must be positive")?;
        check(
            non_negative(unusual.rate_z_threshold),
            "unusual.rate_z_threshold must be a non-negative number",
        )
    }
}

/// Outcome of an analysis run. Failures keep empty finding lists and carry
/// the reason in `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub status: AnalysisStatus,
    pub error_bursts: Vec<ErrorBurst>,
    pub high_traffic_ips: Vec<HighTrafficIp>,
    pub unusual_patterns: Vec<UnusualPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Borrowed view over any finding of a report
#[derive(Debug, Clone, Copy)]
pub enum AnomalyFinding<'a> {
    ErrorBurst(&'a ErrorBurst),
    HighTrafficIp(&'a HighTrafficIp),
    UnusualPattern(&'a UnusualPattern),
}

impl AnomalyFinding<'_> {
    pub fn explanation(&self) -> &str {
        match self {
            Self::ErrorBurst(b) => &b.explanation,
            Self::HighTrafficIp(ip) => &ip.explanation,
            Self::UnusualPattern(p) => &p.explanation,
        }
    }
}

impl AnomalyReport {
    pub fn success(
        error_bursts: Vec<ErrorBurst>,
        high_traffic_ips: Vec<HighTrafficIp>,
        unusual_patterns: Vec<UnusualPattern>,
    ) -> Self {
        let message = format!(
            "Analysis complete: {} error bursts, {} high traffic IPs, {} unusual patterns",
            error_bursts.len(),
            high_traffic_ips.len(),
            unusual_patterns.len()
        );
        Self {
            status: AnalysisStatus::Success,
            error_bursts,
            high_traffic_ips,
            unusual_patterns,
            message: Some(message),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: AnalysisStatus::Error,
            error_bursts: Vec::new(),
            high_traffic_ips: Vec::new(),
            unusual_patterns: Vec::new(),
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Success
    }

    pub fn finding_count(&self) -> usize {
        self.error_bursts.len() + self.high_traffic_ips.len() + self.unusual_patterns.len()
    }

    /// All findings in report order: bursts, then IPs, then patterns
    pub fn findings(&self) -> impl Iterator<Item = AnomalyFinding<'_>> {
        self.error_bursts
            .iter()
            .map(AnomalyFinding::ErrorBurst)
            .chain(self.high_traffic_ips.iter().map(AnomalyFinding::HighTrafficIp))
            .chain(self.unusual_patterns.iter().map(AnomalyFinding::UnusualPattern))
    }
}

fn run<D: Detector>(detector: &D, entries: &[LogEntry]) -> Vec<D::Finding> {
    tracing::info!("Detecting {}...", detector.name());
    let findings = detector.detect(entries);
    tracing::debug!("{} {} found", findings.len(), detector.name());
    findings
}

/// Run every detector over `entries`
pub fn try_analyze(
    entries: &[LogEntry],
    config: &AnomalyConfig,
) -> Result<AnomalyReport, AnalysisError> {
    profiling::scope!("try_analyze");

    if entries.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    config.validate()?;

    tracing::info!("Starting anomaly detection analysis on {} entries", entries.len());
    let error_bursts = run(&ErrorBurstDetector::new(config.error_burst), entries);
    let high_traffic_ips = run(&HighTrafficDetector::new(config.high_traffic), entries);
    let unusual_patterns = run(&UnusualPatternDetector::new(config.unusual), entries);

    let report = AnomalyReport::success(error_bursts, high_traffic_ips, unusual_patterns);
    tracing::info!(
        "Anomaly detection complete. Found {} error bursts, {} high traffic IPs, {} unusual patterns",
        report.error_bursts.len(),
        report.high_traffic_ips.len(),
        report.unusual_patterns.len()
    );
    Ok(report)
}

/// Like [`try_analyze`], with errors folded into an error-status report
pub fn analyze(entries: &[LogEntry], config: &AnomalyConfig) -> AnomalyReport {
    try_analyze(entries, config).unwrap_or_else(|err| {
        tracing::warn!("Anomaly detection failed: {err}");
        AnomalyReport::failure(err.to_string())
    })
}
