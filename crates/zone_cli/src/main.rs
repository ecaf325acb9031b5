//! Zone CLI
//!
//! Validate tracks, place zones and run reward batches against a zone file

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use zone_core::{
    BatchSummary, GameConfig, GeoPoint, RunValidator, Zone, ZoneId, ZonePlacementResolver,
};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "zone_cli")]
#[command(about = "Territory tools: run validation, zone placement and batch rewards", long_about = None)]
struct Cli {
    /// Game config JSON; falls back to ZONE_CONFIG_PATH, then defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Validate one track file
    Validate {
        /// Track JSON file
        #[arg(long)]
        track: PathBuf,

        /// Distance reported by the device, overrides the file value
        #[arg(long)]
        reported_km: Option<f64>,
    },

    /// Find a free cell for a new zone, optionally creating it
    Place {
        /// Zone file (.json or snapshot)
        #[arg(long)]
        zones: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Group key (country code) of the new zone
        #[arg(long)]
        group: String,

        /// Create the zone under this name and write the zone file back
        #[arg(long)]
        name: Option<String>,
    },

    /// Process a batch of tracks in order
    Batch {
        /// Zone file (.json or snapshot)
        #[arg(long)]
        zones: PathBuf,

        /// Track JSON files, processed in the given order
        #[arg(long, required = true, num_args = 1..)]
        tracks: Vec<PathBuf>,

        /// JSON list of zone decisions, consumed in prompt order
        #[arg(long)]
        decisions: Option<PathBuf>,

        #[arg(long)]
        runner: Option<String>,

        /// Where to write the updated zones; defaults to --zones
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Convert a zone file between JSON and snapshot formats
    Snapshot {
        #[arg(long)]
        r#in: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { track, reported_km } => {
            let input = zone_cli::load_track(&track)?;
            let run = RunValidator::new(config.anti_cheat)
                .validate(&input.points, reported_km.or(input.reported_km));

            println!("{}", serde_json::to_string_pretty(&run)?);
            if let Some(reason) = run.failure_reason() {
                anyhow::bail!("Run rejected: {}", reason);
            }
        }

        Commands::Place { zones, lat, lng, group, name } => {
            let mut grid = zone_cli::load_grid(&zones)?;
            let resolver = ZonePlacementResolver::new(config.discovery);
            let target = GeoPoint::new(lat, lng);

            match name {
                Some(name) => {
                    let zone = Zone::new(ZoneId::generate(), name, group, Default::default(), target);
                    let placement = resolver.place(zone, &mut grid)?;
                    println!("{}", serde_json::to_string_pretty(&placement)?);
                    zone_cli::write_grid(&zones, &grid)?;
                    println!("Zone file updated: {}", zones.display());
                }
                None => {
                    // Dry run, the zone file is not written back
                    let placement = resolver.resolve(target, &group, &mut grid)?;
                    println!("{}", serde_json::to_string_pretty(&placement)?);
                }
            }
        }

        Commands::Batch { zones, tracks, decisions, runner, out } => {
            let grid = zone_cli::load_grid(&zones)?;
            let decisions = match decisions {
                Some(path) => zone_cli::load_decisions(&path)?,
                None => Vec::new(),
            };

            let validator = RunValidator::new(config.anti_cheat.clone());
            let mut runs = Vec::with_capacity(tracks.len());
            for path in &tracks {
                let input = zone_cli::load_track(path)?;
                let run = validator.validate(&input.points, input.reported_km);
                if let Some(reason) = run.failure_reason() {
                    println!("   {}: rejected ({})", path.display(), reason);
                }
                runs.push(run);
            }

            let out = out.unwrap_or(zones);
            let summary = zone_cli::run_batch_to_file(grid, config, runs, decisions, runner, &out)?;
            print_summary(&summary);
        }

        Commands::Snapshot { r#in, out } => {
            let grid = zone_cli::load_grid(&r#in)?;
            zone_cli::write_grid(&out, &grid)?;
            println!("Converted {} zones: {} -> {}", grid.len(), r#in.display(), out.display());
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn load_config(path: Option<&Path>) -> Result<GameConfig> {
    let config = match path {
        Some(path) => GameConfig::load_from_path(path),
        None => GameConfig::from_env(),
    };
    config.context("Failed to load game config")
}

#[cfg(feature = "cli")]
fn print_summary(summary: &BatchSummary) {
    println!("\nBatch complete");
    println!("   Runs finalized:  {}", summary.runs_finalized);
    println!("   Runs rejected:   {}", summary.runs_rejected);
    println!("   Duplicates:      {}", summary.duplicates_skipped);
    println!("   Distance:        {:.2} km", summary.total_km);
    println!("   Reward:          {:.2}", summary.total_reward);
    println!("   Zones created:   {}", summary.zones_created);
    println!("   Mint cost:       {:.2}", summary.mint_cost);
    if !summary.zone_names.is_empty() {
        println!("   Zones visited:   {}", summary.zone_names.join(", "));
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("zone_cli is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
