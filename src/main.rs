/// `AccessCrab` - Web server access-log analytics
///
/// Copyright (C) 2026 Daniel Freiermuth
///
/// This program is free software: you can redistribute it and/or modify
/// it under the terms of the GNU General Public License as published by
/// the Free Software Foundation, either version 3 of the License, or
/// (at your option) any later version.
///
/// This program is distributed in the hope that it will be useful,
/// but WITHOUT ANY WARRANTY; without even the implied warranty of
/// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
/// GNU General Public License for more details.
///
/// You should have received a copy of the GNU General Public License
/// along with this program.  If not, see <https://www.gnu.org/licenses/>.
use accesscrab::core::{load_file, Dashboard, Filter, GeoTable};
use accesscrab::stats::histogram::Granularity;
use accesscrab::AppConfig;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "ram-profiling")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GranularityArg {
    Hourly,
    Daily,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Hourly => Self::Hourly,
            GranularityArg::Daily => Self::Daily,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "accesscrab")]
#[command(author = "AccessCrab Team")]
#[command(version)]
#[command(about = "Analyze web server access logs and flag anomalies", long_about = None)]
struct Args {
    /// Path to the access log to analyze
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Filter as a JSON object, e.g. '{"dateFrom": "2025-04-17", "statusCode": 404}'
    #[arg(long, value_name = "JSON")]
    filter: Option<String>,

    /// Config file to use instead of the one in the user config directory
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// JSON table mapping IP addresses to locations
    #[arg(long, value_name = "PATH")]
    geo: Option<PathBuf>,

    /// Bucketing of the requests-over-time series
    #[arg(long, value_enum, default_value = "hourly")]
    granularity: GranularityArg,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Path for the DHAT heap profiling output (only used when built with --features ram-profiling)
    #[cfg(feature = "ram-profiling")]
    #[arg(
        long = "profile-output",
        value_name = "PROFILE_FILE",
        default_value = "dhat-heap.json"
    )]
    profile_output: PathBuf,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON.
    // Set RUST_LOG to override (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        "AccessCrab starting up (version {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let args = Args::parse();

    #[cfg(feature = "ram-profiling")]
    let _profiler = {
        tracing::info!("RAM profiling enabled, output: {:?}", args.profile_output);
        dhat::Profiler::builder()
            .file_name(args.profile_output.clone())
            .build()
    };

    #[cfg(feature = "cpu-profiling")]
    {
        tracing::info!("CPU profiling enabled with Tracy - run Tracy profiler to connect");
    }

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    let filter = match &args.filter {
        Some(json) => Filter::from_json(json).context("Invalid --filter JSON")?,
        None => Filter::default(),
    };
    let geo = args.geo.as_deref().map(GeoTable::load).transpose()?;

    let summary = load_file(&args.file)?;
    let dashboard = Dashboard::build(
        &summary.entries,
        &filter,
        args.granularity.into(),
        &config,
        geo.as_ref(),
    );

    let json = if args.pretty {
        serde_json::to_string_pretty(&dashboard)
    } else {
        serde_json::to_string(&dashboard)
    }
    .context("Failed to serialize dashboard")?;
    println!("{json}");
    Ok(())
}
