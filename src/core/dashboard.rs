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

//! Every aggregate of a filtered view, assembled into one document.

use crate::anomaly::insight::{generate_insights, Insight};
use crate::anomaly::{analyze, AnomalyReport};
use crate::config::AppConfig;
use crate::core::filter::{apply_filter, Filter};
use crate::core::geo::{country_hits, locate_ips, CountryHits, GeoTable, LocatedIp};
use crate::core::log_file::format_bytes;
use crate::parser::entry::LogEntry;
use crate::stats::histogram::{requests_by_time, Granularity, TimeSeries};
use crate::stats::user_agent::{classify_user_agents, UserAgentBreakdown};
use crate::stats::{
    http_methods_distribution, human_vs_bot_traffic, response_size_distribution,
    status_code_distribution, top_ips, top_paths, top_referrers, total_bandwidth,
    unique_visitors, IpHits, LabelHits, PathHits, ReferrerHits, StatusHits, TrafficSplit,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// Entries before filtering
    pub total_entries: usize,
    pub requests: usize,
    pub unique_visitors: usize,
    pub bandwidth: u64,
    pub bandwidth_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub filter: Filter,
    pub overview: Overview,
    pub granularity: Granularity,
    pub requests_over_time: TimeSeries,
    pub top_paths: Vec<PathHits>,
    pub top_ips: Vec<IpHits>,
    pub top_referrers: Vec<ReferrerHits>,
    pub status_codes: Vec<StatusHits>,
    pub http_methods: Vec<LabelHits>,
    pub response_sizes: Vec<LabelHits>,
    pub user_agents: UserAgentBreakdown,
    pub human_vs_bot: TrafficSplit,
    pub anomalies: AnomalyReport,
    pub insights: Vec<Insight>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<LocatedIp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<CountryHits>,
}

impl Dashboard {
    /// Filter `entries` and compute everything shown for the result.
    ///
    /// The aggregates and the anomaly report share the same filtered view.
    pub fn build(
        entries: &[LogEntry],
        filter: &Filter,
        granularity: Granularity,
        config: &AppConfig,
        geo: Option<&GeoTable>,
    ) -> Self {
        profiling::scope!("Dashboard::build");

        let view = apply_filter(entries, filter);
        tracing::info!("Filter kept {} of {} entries", view.len(), entries.len());

        let bandwidth = total_bandwidth(&view);
        let overview = Overview {
            total_entries: entries.len(),
            requests: view.len(),
            unique_visitors: unique_visitors(&view),
            bandwidth,
            bandwidth_display: format_bytes(bandwidth),
        };

        let limits = config.limits;
        let anomalies = analyze(&view, &config.anomaly);
        let insights = generate_insights(&anomalies);
        let locations = geo.map(|table| locate_ips(&view, table)).unwrap_or_default();
        let countries = country_hits(&locations);

        Self {
            filter: filter.clone(),
            overview,
            granularity,
            requests_over_time: requests_by_time(&view, granularity),
            top_paths: top_paths(&view, limits.paths),
            top_ips: top_ips(&view, limits.ips),
            top_referrers: top_referrers(&view, limits.referrers),
            status_codes: status_code_distribution(&view),
            http_methods: http_methods_distribution(&view),
            response_sizes: response_size_distribution(&view),
            user_agents: classify_user_agents(&view, &config.user_agents),
            human_vs_bot: human_vs_bot_traffic(&view, &config.user_agents),
            anomalies,
            insights,
            locations,
            countries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::AnalysisStatus;
    use crate::parser::fixtures::{entry, entry_at_path};

    fn entries() -> Vec<LogEntry> {
        (0..30)
            .map(|i| {
                let at = format!("2025-04-{} 1{}:{:02}:00", 17 + i % 3, i % 4, i);
                let status = if i % 10 == 0 { 404 } else { 200 };
                entry_at_path(&format!("10.0.0.{}", i % 5), &at, &format!("/p{}", i % 12), status)
            })
            .collect()
    }

    #[test]
    fn test_build_unfiltered() {
        let entries = entries();
        let dashboard = Dashboard::build(
            &entries,
            &Filter::default(),
            Granularity::Hourly,
            &AppConfig::default(),
            None,
        );
        assert_eq!(dashboard.overview.total_entries, 30);
        assert_eq!(dashboard.overview.requests, 30);
        assert_eq!(dashboard.overview.unique_visitors, 5);
        assert_eq!(dashboard.requests_over_time.total(), 30);
        assert_eq!(dashboard.top_paths.len(), 10);
        assert_eq!(dashboard.top_ips.len(), 5);
        assert_eq!(
            dashboard.status_codes.iter().map(|s| s.hits).sum::<usize>(),
            30
        );
        assert_eq!(dashboard.anomalies.status, AnalysisStatus::Success);
        assert!(dashboard.locations.is_empty());
    }

    #[test]
    fn test_build_with_empty_result() {
        let filter = Filter {
            status_code: Some(503),
            ..Filter::default()
        };
        let dashboard = Dashboard::build(
            &entries(),
            &filter,
            Granularity::Daily,
            &AppConfig::default(),
            None,
        );
        assert_eq!(dashboard.overview.requests, 0);
        assert_eq!(dashboard.overview.bandwidth_display, "0 Bytes");
        assert!(dashboard.top_paths.is_empty());
        assert_eq!(dashboard.anomalies.status, AnalysisStatus::Error);
        assert!(dashboard.insights.is_empty());
    }

    #[test]
    fn test_build_with_geo() {
        let mut geo = GeoTable::new();
        geo.insert(
            "10.0.0.1",
            crate::core::geo::GeoLocation {
                city: "Lyon".to_string(),
                country: "France".to_string(),
                lat: 45.76,
                lng: 4.84,
            },
        );
        let entries = vec![
            entry("10.0.0.1", "2025-04-17 10:00:00", 200),
            entry("10.0.0.2", "2025-04-17 10:00:01", 200),
        ];
        let dashboard = Dashboard::build(
            &entries,
            &Filter::default(),
            Granularity::Hourly,
            &AppConfig::default(),
            Some(&geo),
        );
        assert_eq!(dashboard.locations.len(), 1);
        assert_eq!(dashboard.countries[0].country, "France");

        let json = serde_json::to_value(&dashboard).expect("serializable");
        assert_eq!(json["overview"]["uniqueVisitors"], 2);
        assert_eq!(json["anomalies"]["status"], "success");
        assert_eq!(json["userAgents"]["operatingSystems"][0]["hits"], 2);
        assert!(json["userAgents"].get("operating_systems").is_none());
    }
}
