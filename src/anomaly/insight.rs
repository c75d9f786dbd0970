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

//! Human-readable summaries of an [`AnomalyReport`], each paired with the
//! follow-up actions worth taking.

use super::unusual::{PatternKind, UnusualPattern};
use super::AnomalyReport;
use serde::{Deserialize, Serialize};

/// IPs above this share of traffic are called out as suspicious
pub const SUSPICIOUS_TRAFFIC_SHARE: f64 = 15.0;

/// More findings than this trigger the general security insight
pub const SECURITY_FINDING_THRESHOLD: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Notice,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub recommendations: Vec<String>,
}

/// Derive insights from a report. Failed reports produce none.
#[must_use]
pub fn generate_insights(report: &AnomalyReport) -> Vec<Insight> {
    if !report.is_success() {
        return Vec::new();
    }

    let mut insights = Vec::new();
    insights.extend(error_burst_insight(report));
    insights.extend(traffic_insight(report));
    insights.extend(hour_access_insight(&report.unusual_patterns));
    insights.extend(error_rate_insight(&report.unusual_patterns));

    if report.finding_count() > SECURITY_FINDING_THRESHOLD {
        insights.push(Insight {
            title: "Security Recommendation".to_string(),
            description: "Multiple anomalies detected may indicate attempted exploitation or \
                          security testing. Consider reviewing your security measures."
                .to_string(),
            severity: Severity::Info,
            recommendations: vec![
                "Review your Web Application Firewall (WAF) rules.".to_string(),
                "Consider implementing CAPTCHA for suspicious traffic patterns.".to_string(),
                "Ensure all software dependencies are up-to-date.".to_string(),
                "Review access logs more frequently to identify ongoing patterns.".to_string(),
            ],
        });
    }
    insights
}

fn error_burst_insight(report: &AnomalyReport) -> Option<Insight> {
    let top = report.error_bursts.iter().max_by_key(|b| b.error_count)?;

    let mut codes: Vec<(u16, usize)> = top.status_codes.iter().map(|(&c, &n)| (c, n)).collect();
    codes.sort_by(|a, b| b.1.cmp(&a.1));
    let primary = codes
        .iter()
        .take(2)
        .map(|(code, _)| code.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut recommendations = vec![
        format!(
            "Check application logs around {} for related errors.",
            top.time_period
        ),
        "Review server status and resources during the spike period.".to_string(),
    ];
    let hints = [
        (404, "Check for broken links or resources being referenced."),
        (500, "Investigate server-side errors in your application logs."),
        (403, "Review authentication mechanisms for potential issues."),
    ];
    for (code, hint) in hints {
        if top.status_codes.contains_key(&code) {
            recommendations.push(hint.to_string());
        }
    }

    Some(Insight {
        title: "Error Burst Analysis".to_string(),
        description: format!(
            "Detected a significant spike of {} errors around {}, primarily status codes {primary}.",
            top.error_count, top.time_period
        ),
        severity: Severity::Critical,
        recommendations,
    })
}

fn traffic_insight(report: &AnomalyReport) -> Option<Insight> {
    let top = report
        .high_traffic_ips
        .iter()
        .find(|ip| ip.traffic_percentage > SUSPICIOUS_TRAFFIC_SHARE)?;
    let paths = top
        .path_distribution
        .keys()
        .take(2)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    Some(Insight {
        title: "Suspicious Traffic Patterns".to_string(),
        description: format!(
            "IP {} accounts for {:.1}% of all traffic, with {} requests primarily to {paths}.",
            top.ip_address, top.traffic_percentage, top.request_count
        ),
        severity: Severity::Warning,
        recommendations: vec![
            "Consider implementing rate limiting for this IP.".to_string(),
            "Verify if this IP belongs to a legitimate service or crawler.".to_string(),
            "Check request patterns for signs of scraping or automated scanning.".to_string(),
            "Monitor this IP for continued unusual activity.".to_string(),
        ],
    })
}

fn hour_access_insight(patterns: &[UnusualPattern]) -> Option<Insight> {
    let top = patterns
        .iter()
        .find(|p| matches!(p.kind, PatternKind::HourAccess { .. }))?;

    Some(Insight {
        title: "Unusual Access Hours".to_string(),
        description: format!(
            "Detected access during unusual hours from IP {}, which could indicate scheduled \
             tasks, international users or potentially malicious activity.",
            top.ip_address
        ),
        severity: Severity::Notice,
        recommendations: vec![
            "Verify expected access patterns for your application.".to_string(),
            "Consider implementing geolocation-based access rules if needed.".to_string(),
            "Check for legitimate scheduled jobs or automation coming from this IP.".to_string(),
        ],
    })
}

fn error_rate_insight(patterns: &[UnusualPattern]) -> Option<Insight> {
    let (top, path_count, max_deviation) = patterns.iter().find_map(|p| match &p.kind {
        PatternKind::ErrorRate {
            affected_path_count,
            max_deviation,
            ..
        } => Some((p, *affected_path_count, *max_deviation)),
        PatternKind::HourAccess { .. } | PatternKind::RequestRate { .. } => None,
    })?;

    Some(Insight {
        title: "Abnormal Error Rates".to_string(),
        description: format!(
            "IP {} shows an unusual error rate pattern across {path_count} paths, with {:.1}% \
             deviation from normal behavior.",
            top.ip_address,
            max_deviation * 100.0
        ),
        severity: Severity::Warning,
        recommendations: vec![
            "Investigate if this is a bot or crawler experiencing high error rates.".to_string(),
            "Check if specific paths are returning errors for certain user agents.".to_string(),
            "Consider analyzing the user journey for this IP to identify usability issues."
                .to_string(),
        ],
    })
}
