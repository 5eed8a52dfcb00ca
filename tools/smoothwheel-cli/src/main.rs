//! smoothwheel CLI: inertial smooth scrolling for coarse wheel devices.
//!
//! Usage:
//!   smoothwheel [run] [OPTIONS] [DEVICE]   Grab a wheel device and smooth its output
//!   smoothwheel list                       List scroll-capable devices
//!   smoothwheel check                      Check device and uinput access
//!   smoothwheel config                     Print the effective configuration
//!   smoothwheel simulate [OPTIONS]         Replay synthetic input in virtual time

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use smoothwheel_common::config::{AppConfig, ScrollConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "smoothwheel",
    about = "Inertial smooth scrolling for coarse wheel devices",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Grab a wheel device and re-emit its scrolling smoothly (default)
    Run(RunArgs),

    /// List scroll-capable input devices
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check device, uinput, and group access
    Check,

    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        scroll: ScrollOverrides,
    },

    /// Replay synthetic wheel input through the engine in virtual time
    Simulate(commands::simulate::SimulateArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Source device (e.g. /dev/input/event5); auto-detected when omitted
    device: Option<PathBuf>,

    /// Name keyword for auto-detection (repeatable, replaces the defaults)
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    #[command(flatten)]
    scroll: ScrollOverrides,
}

/// Command-line overrides for the scroll tunables.
#[derive(Args, Debug, Default, Clone)]
pub struct ScrollOverrides {
    /// Velocity fraction removed per tick [0.01, 0.2]
    #[arg(long)]
    friction: Option<f64>,

    /// Tick period in milliseconds [1, 50]
    #[arg(long)]
    tick_ms: Option<u32>,

    /// Input rate (events/s) below which impulses are not dampened
    #[arg(long)]
    low_rate: Option<f64>,

    /// Input rate (events/s) at which dampening is strongest
    #[arg(long)]
    high_rate: Option<f64>,

    /// Impulse scale at or above the high rate [0, 1]
    #[arg(long)]
    min_scale: Option<f64>,

    /// Velocity below which an axis stops
    #[arg(long)]
    stop_threshold: Option<f64>,

    /// Scroll distance multiplier [0.01, 10]
    #[arg(long)]
    multiplier: Option<f64>,

    /// Ignore coarse wheel events on axes that also send hi-res ones
    #[arg(long)]
    dedupe: bool,
}

impl ScrollOverrides {
    /// Apply the overrides on top of `base` and clamp the result.
    pub fn apply(&self, base: &ScrollConfig) -> ScrollConfig {
        let mut config = base.clone();
        if let Some(v) = self.friction {
            config.friction = v;
        }
        if let Some(v) = self.tick_ms {
            config.tick_ms = v;
        }
        if let Some(v) = self.low_rate {
            config.low_rate = v;
        }
        if let Some(v) = self.high_rate {
            config.high_rate = v;
        }
        if let Some(v) = self.min_scale {
            config.min_scale = v;
        }
        if let Some(v) = self.stop_threshold {
            config.stop_threshold = v;
        }
        if let Some(v) = self.multiplier {
            config.multiplier = v;
        }
        if self.dedupe {
            config.dedupe_coarse_when_fine = true;
        }
        config.clamped()
    }
}

impl RunArgs {
    fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(ref device) = self.device {
            config.device.path = Some(device.clone());
        }
        if !self.keywords.is_empty() {
            config.device.keywords = self.keywords.clone();
        }
        config.scroll = self.scroll.apply(&config.scroll);
        config
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => AppConfig::try_load_from(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    config.logging.json |= cli.json_logs;
    smoothwheel_common::logging::init_logging(&config.logging);

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => commands::run::run(args.apply(config)),
        Commands::List { json } => commands::list::run(json),
        Commands::Check => commands::check::run(&config.device.keywords),
        Commands::Config { scroll } => {
            config.scroll = scroll.apply(&config.scroll);
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Simulate(args) => commands::simulate::run(args, &config.scroll),
    }
}
