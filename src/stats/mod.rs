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

//! Dashboard aggregates over a slice of [`LogEntry`].
//!
//! Every function here is a pure, single-pass reduction. Rankings count in
//! first-encountered order and sort stably, so ties keep the order in which
//! their keys first appeared. Empty input yields empty or zero-valued results.

pub mod histogram;
pub mod statistics;
pub mod user_agent;

use crate::parser::entry::LogEntry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;
use url::Url;
use user_agent::UaClassifier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathHits {
    pub path: String,
    pub hits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpHits {
    pub ip: String,
    pub hits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerHits {
    pub referrer: String,
    pub hits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHits {
    pub status: u16,
    pub hits: usize,
}

/// Hits for a named category (browser, method, size bucket, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelHits {
    pub label: String,
    pub hits: usize,
}

impl LabelHits {
    pub fn new(label: impl Into<String>, hits: usize) -> Self {
        Self {
            label: label.into(),
            hits,
        }
    }
}

/// Human vs automated traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrafficSplit {
    pub human: usize,
    pub bot: usize,
}

/// Count occurrences and sort by count descending.
///
/// Ties keep first-encountered order.
pub fn rank<K, I>(keys: I) -> Vec<(K, usize)>
where
    K: Hash + Eq,
    I: IntoIterator<Item = K>,
{
    let mut counts: IndexMap<K, usize> = IndexMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut ranked: Vec<(K, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Entries per IP, IPs in first-encountered order.
pub fn group_by_ip<'a, I>(entries: I) -> IndexMap<&'a str, Vec<&'a LogEntry>>
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let mut groups: IndexMap<&str, Vec<&LogEntry>> = IndexMap::new();
    for entry in entries {
        groups.entry(entry.ip_address.as_str()).or_default().push(entry);
    }
    groups
}

fn label_hits<'a, I>(labels: I) -> Vec<LabelHits>
where
    I: IntoIterator<Item = &'a str>,
{
    rank(labels)
        .into_iter()
        .map(|(label, hits)| LabelHits::new(label, hits))
        .collect()
}

pub fn top_paths(entries: &[LogEntry], limit: usize) -> Vec<PathHits> {
    rank(entries.iter().map(|e| e.path.as_str()))
        .into_iter()
        .take(limit)
        .map(|(path, hits)| PathHits {
            path: path.to_string(),
            hits,
        })
        .collect()
}

pub fn top_ips(entries: &[LogEntry], limit: usize) -> Vec<IpHits> {
    rank(entries.iter().map(|e| e.ip_address.as_str()))
        .into_iter()
        .take(limit)
        .map(|(ip, hits)| IpHits {
            ip: ip.to_string(),
            hits,
        })
        .collect()
}

/// Host part of a referer URL; `None` if it does not parse or has no host.
pub fn referrer_host(referer: &str) -> Option<String> {
    let url = Url::parse(referer).ok()?;
    url.host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}

/// Referring hosts ranked by hits. Referers that are not URLs are left out.
pub fn top_referrers(entries: &[LogEntry], limit: usize) -> Vec<ReferrerHits> {
    let hosts = entries
        .iter()
        .filter_map(|e| e.referer.as_deref())
        .filter_map(referrer_host);
    rank(hosts)
        .into_iter()
        .take(limit)
        .map(|(referrer, hits)| ReferrerHits { referrer, hits })
        .collect()
}

pub fn status_code_distribution(entries: &[LogEntry]) -> Vec<StatusHits> {
    rank(entries.iter().map(|e| e.status_code))
        .into_iter()
        .map(|(status, hits)| StatusHits { status, hits })
        .collect()
}

pub fn http_methods_distribution(entries: &[LogEntry]) -> Vec<LabelHits> {
    label_hits(entries.iter().map(|e| e.method.as_str()))
}

pub fn human_vs_bot_traffic(entries: &[LogEntry], classifier: &UaClassifier) -> TrafficSplit {
    let bot = entries
        .iter()
        .filter(|e| classifier.is_bot(&e.user_agent))
        .count();
    TrafficSplit {
        human: entries.len() - bot,
        bot,
    }
}

/// Fixed response-size buckets, upper bounds exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeBucket {
    Empty,
    UnderOneKb,
    OneToTenKb,
    TenToHundredKb,
    HundredKbToOneMb,
    OverOneMb,
}

impl SizeBucket {
    pub const ALL: [Self; 6] = [
        Self::Empty,
        Self::UnderOneKb,
        Self::OneToTenKb,
        Self::TenToHundredKb,
        Self::HundredKbToOneMb,
        Self::OverOneMb,
    ];

    pub const fn for_bytes(bytes: u64) -> Self {
        const KB: u64 = 1024;
        if bytes == 0 {
            Self::Empty
        } else if bytes < KB {
            Self::UnderOneKb
        } else if bytes < 10 * KB {
            Self::OneToTenKb
        } else if bytes < 100 * KB {
            Self::TenToHundredKb
        } else if bytes < KB * KB {
            Self::HundredKbToOneMb
        } else {
            Self::OverOneMb
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Empty => "0B",
            Self::UnderOneKb => "<1KB",
            Self::OneToTenKb => "1-10KB",
            Self::TenToHundredKb => "10-100KB",
            Self::HundredKbToOneMb => "100KB-1MB",
            Self::OverOneMb => ">1MB",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Hits per size bucket, always all six buckets in ascending size order.
pub fn response_size_distribution(entries: &[LogEntry]) -> Vec<LabelHits> {
    let mut counts = [0usize; SizeBucket::ALL.len()];
    for entry in entries {
        counts[SizeBucket::for_bytes(entry.bytes).index()] += 1;
    }
    SizeBucket::ALL
        .iter()
        .zip(counts)
        .map(|(bucket, hits)| LabelHits::new(bucket.label(), hits))
        .collect()
}

pub fn unique_visitors(entries: &[LogEntry]) -> usize {
    entries
        .iter()
        .map(|e| e.ip_address.as_str())
        .collect::<HashSet<_>>()
        .len()
}

pub fn total_bandwidth(entries: &[LogEntry]) -> u64 {
    entries.iter().map(|e| e.bytes).sum()
}
