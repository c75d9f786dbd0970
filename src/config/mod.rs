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


use crate::anomaly::AnomalyConfig;
use crate::stats::user_agent::UaClassifier;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How many rows the ranked aggregates keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingLimits {
    pub paths: usize,
    pub ips: usize,
    pub referrers: usize,
}

impl Default for RankingLimits {
    fn default() -> Self {
        Self {
            paths: 10,
            ips: 10,
            referrers: 5,
        }
    }
}

/// User configuration stored in the config directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Detector thresholds and window sizes
    #[serde(default)]
    pub anomaly: AnomalyConfig,

    /// Browser, device and OS keyword rules
    #[serde(default)]
    pub user_agents: UaClassifier,

    #[serde(default)]
    pub limits: RankingLimits,
}

impl AppConfig {
    /// Get the path to the user config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("accesscrab").join("config.json"))
    }

    /// Load the user config, returning defaults if it is missing or broken
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            tracing::info!("No config directory, using defaults");
            return Self::default();
        };
        if !path.exists() {
            tracing::info!("No config found at {path:?}, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config: {e:#}");
                Self::default()
            }
        }
    }

    /// Load and validate a config file
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from {path:?}");
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path:?}"))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {path:?}"))?;
        config.anomaly.validate()?;
        Ok(config)
    }

    /// Save the config to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().context("Could not determine config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent:?}"))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file {path:?}"))?;

        tracing::info!("Saved config to {path:?}");
        Ok(())
    }
}
