//! GhostRide - Indoor Cycling Ghost Racing
//!
//! Main entry point for the headless race runner.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ghostride::storage::config::{self, AppConfig, TrainerBackend};
use ghostride::world::route::{Course, SegmentedCourse};
use ghostride::Session;

#[derive(Parser)]
#[command(name = "ghostride", version, about = "Race AI ghosts on a smart trainer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ride a race against the ghost field
    Race {
        /// Config file (defaults to the user data directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after this many seconds of race time
        #[arg(long, default_value_t = 600)]
        duration: u64,

        /// Use a BLE FTMS trainer instead of the synthetic one
        #[arg(long)]
        hardware: bool,

        /// Number of ghosts (overrides config)
        #[arg(long)]
        ghosts: Option<usize>,

        /// Synthetic trainer power in watts (overrides config)
        #[arg(long)]
        power: Option<i16>,

        /// Ride a flat course of this many meters instead of the demo course
        #[arg(long)]
        flat: Option<f64>,

        /// Print the final standings as JSON
        #[arg(long)]
        json: bool,

        /// Print the trainer's raw exchange log after the ride
        #[arg(long)]
        debug_log: bool,
    },

    /// Show or create the configuration file
    Config {
        /// Write a default config file
        #[arg(long)]
        init: bool,

        /// Config file path (defaults to the user data directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file with --init
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting GhostRide v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    match cli.command {
        Commands::Race {
            config,
            duration,
            hardware,
            ghosts,
            power,
            flat,
            json,
            debug_log,
        } => {
            let mut app_config = match config {
                Some(path) => config::load_config_from(&path),
                None => config::load_config(),
            }
            .context("loading configuration")?;

            if hardware {
                app_config.trainer.backend = TrainerBackend::Hardware;
            }
            if let Some(count) = ghosts {
                app_config.race.ghost_count = count;
            }
            if let Some(watts) = power {
                app_config.trainer.synthetic_power_w = watts;
            }

            let course: Arc<dyn Course> = match flat {
                Some(length) => Arc::new(SegmentedCourse::flat(length).context("building course")?),
                None => Arc::new(SegmentedCourse::demo()),
            };

            let mut session = Session::from_config(app_config);
            let summary = session
                .run(course, Duration::from_secs(duration))
                .await
                .context("running race")?;

            let snapshot = &summary.snapshot;
            match snapshot.rider.finished_at {
                Some(time_s) => tracing::info!(
                    "Finished {} of {} in {:.1}s",
                    snapshot.rider_position,
                    snapshot.ghosts.len() + 1,
                    time_s
                ),
                None => tracing::info!(
                    "Stopped at {:.0} m in position {} of {}",
                    snapshot.rider.distance_m,
                    snapshot.rider_position,
                    snapshot.ghosts.len() + 1
                ),
            }

            if json {
                println!("{}", serde_json::to_string_pretty(snapshot)?);
            }

            if debug_log {
                match session.debug_log() {
                    Some(log) => println!("{}", log),
                    None => tracing::info!("{} keeps no debug log", session.trainer().name()),
                }
            }
        }

        Commands::Config { init, path, force } => {
            let path = path.unwrap_or_else(config::get_config_path);

            if init {
                if path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
                }
                config::save_config_to(&AppConfig::default(), &path)
                    .with_context(|| format!("writing {}", path.display()))?;
                tracing::info!("Wrote default config to {}", path.display());
            } else {
                let loaded = config::load_config_from(&path).context("loading configuration")?;
                println!("# {}", path.display());
                println!("{}", toml::to_string_pretty(&loaded)?);
            }
        }
    }

    Ok(())
}
