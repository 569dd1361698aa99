#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for detecting accident hotspots in Basel.

mod config;
mod output;
mod pipeline;

use std::io::Write as _;
use std::path::{Path, PathBuf};

use basel_hotspots_detector_models::{Strategy, StrategyKind};
use basel_hotspots_source::{all_sources, find_source};
use clap::{Args, Parser, Subcommand};

use crate::config::DetectionConfig;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "basel_hotspots", about = "Accident hotspot detection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect hotspots with a single strategy
    Detect {
        #[command(flatten)]
        run: RunArgs,
        /// Strategy to run (grid, kde, distance). Defaults to the first
        /// strategy in the config.
        #[arg(long)]
        strategy: Option<StrategyKind>,
    },
    /// Run every configured strategy over the same events
    Compare {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Count events per boundary region, year and category
    Regions {
        #[command(flatten)]
        run: RegionArgs,
    },
    /// List all built-in data sources
    Sources,
}

#[derive(Args)]
struct RunArgs {
    /// Source identifier (e.g., "`basel_accidents`")
    source: String,
    /// CSV export to read
    input: PathBuf,
    /// Detection config TOML. The built-in default is used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of hotspots to report per strategy (overrides the config)
    #[arg(long)]
    top: Option<usize>,
    /// `GeoJSON` study-area boundary (overrides the config)
    #[arg(long)]
    boundary: Option<PathBuf>,
    /// Output format (json, geojson)
    #[arg(long, default_value = "json")]
    format: OutputFormat,
    /// File to write to instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RegionArgs {
    /// Source identifier (e.g., "`swiss_accidents`")
    source: String,
    /// CSV export to read
    input: PathBuf,
    /// Detection config TOML, used for its filter and boundary settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// `GeoJSON` file of named regions (overrides the config)
    #[arg(long)]
    boundary: Option<PathBuf>,
    /// File to write to instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

impl RunArgs {
    fn config(&self) -> Result<DetectionConfig, Box<dyn std::error::Error>> {
        let mut config = DetectionConfig::load(self.config.as_deref())?;
        if let Some(top) = self.top {
            config.top_n = Some(top);
        }
        if let Some(boundary) = &self.boundary {
            config.boundary = Some(boundary.clone());
        }
        Ok(config)
    }
}

fn write_output(path: Option<&Path>, contents: &str) -> std::io::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, contents)?;
            log::info!("Wrote {}", path.display());
            Ok(())
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{contents}")
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sources => {
            let sources = all_sources();
            println!("{:<20} {:<10} NAME", "ID", "CRS");
            println!("{}", "-".repeat(60));
            for source in &sources {
                println!("{:<20} {:<10} {}", source.id(), source.crs.as_ref(), source.name());
            }
        }
        Commands::Detect { run, strategy } => {
            let source = find_source(&run.source)?;
            let config = run.config()?;
            let strategy = config.strategy(strategy)?;
            let events = pipeline::load_events(&source, &run.input, &config)?;

            let ranking = basel_hotspots_detector::detect(&events, strategy, config.top_n)?;
            if ranking.is_empty() {
                log::warn!("No {} hotspots found", ranking.strategy);
            }
            let encoded = output::encode_ranking(&ranking, events.crs(), run.format)?;
            write_output(run.output.as_deref(), &encoded)?;
        }
        Commands::Regions { run } => {
            let source = find_source(&run.source)?;
            let mut config = DetectionConfig::load(run.config.as_deref())?;
            if let Some(boundary) = &run.boundary {
                config.boundary = Some(boundary.clone());
            }
            let counts = pipeline::tally_regions(&source, &run.input, &config)?;
            log::info!("{} region groups", counts.len());
            write_output(run.output.as_deref(), &output::encode_regions(&counts)?)?;
        }
        Commands::Compare { run } => {
            let source = find_source(&run.source)?;
            let config = run.config()?;
            let events = pipeline::load_events(&source, &run.input, &config)?;

            let results = basel_hotspots_detector::compare(&events, &config.strategies, config.top_n);
            let results: Vec<(StrategyKind, _)> = config
                .strategies
                .iter()
                .map(Strategy::kind)
                .zip(results)
                .collect();
            for (kind, result) in &results {
                match result {
                    Ok(ranking) => log::info!("{kind}: {} hotspots", ranking.len()),
                    Err(e) => log::error!("{kind}: {e}"),
                }
            }
            let encoded = output::encode_comparison(&results, events.crs(), run.format)?;
            write_output(run.output.as_deref(), &encoded)?;
        }
    }

    Ok(())
}
