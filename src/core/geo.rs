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

//! Joining entries against an externally supplied IP location table.

use crate::parser::entry::LogEntry;
use crate::stats::rank;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    #[serde(default)]
    pub city: String,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
}

/// `ip -> location` lookup owned by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeoTable(HashMap<String, GeoLocation>);

impl GeoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ip: impl Into<String>, location: GeoLocation) {
        self.0.insert(ip.into(), location);
    }

    pub fn lookup(&self, ip: &str) -> Option<&GeoLocation> {
        self.0.get(ip)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read geo table {}", path.display()))?;
        let table = Self::from_json(&contents)
            .with_context(|| format!("Invalid geo table {}", path.display()))?;
        tracing::info!("Loaded {} IP locations from {}", table.len(), path.display());
        Ok(table)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedIp {
    pub ip: String,
    pub hits: usize,
    #[serde(flatten)]
    pub location: GeoLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryHits {
    pub country: String,
    pub hits: usize,
    pub ips: usize,
}

/// Located IPs ranked by hits. IPs missing from the table are skipped.
pub fn locate_ips(entries: &[LogEntry], table: &GeoTable) -> Vec<LocatedIp> {
    rank(entries.iter().map(|e| e.ip_address.as_str()))
        .into_iter()
        .filter_map(|(ip, hits)| {
            table.lookup(ip).map(|location| LocatedIp {
                ip: ip.to_string(),
                hits,
                location: location.clone(),
            })
        })
        .collect()
}

/// Hits per country, busiest first
pub fn country_hits(located: &[LocatedIp]) -> Vec<CountryHits> {
    let mut countries: IndexMap<&str, (usize, usize)> = IndexMap::new();
    for ip in located {
        let totals = countries.entry(ip.location.country.as_str()).or_default();
        totals.0 += ip.hits;
        totals.1 += 1;
    }
    let mut result: Vec<CountryHits> = countries
        .into_iter()
        .map(|(country, (hits, ips))| CountryHits {
            country: country.to_string(),
            hits,
            ips,
        })
        .collect();
    result.sort_by(|a, b| b.hits.cmp(&a.hits));
    result
}
