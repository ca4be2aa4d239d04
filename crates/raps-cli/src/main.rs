//! RAPS simulator command line
//!
//! - `raps run`: run an experiment and write its CSV artifacts
//! - `raps example-config`: print or save an annotated configuration
//! - `raps precompute-world`: build one world and store it for later runs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use raps_core::config::{Policy, SimConfig};
use raps_core::observe::{init_logging, LogConfig, LogFormat, LogLevel};
use raps_sim::experiment::Experiment;
use raps_sim::results::CsvSink;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// RAPS - energy-efficient OFDMA resource allocation simulator
#[derive(Parser, Debug)]
#[command(name = "raps")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Monte Carlo simulator for power control and sleep in OFDMA cells", long_about = None)]
struct Args {
    /// Configuration file path (searched in the default locations if absent)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration
    #[arg(short = 'e', long, global = true)]
    log_level: Option<Level>,

    /// Log format, overrides the configuration
    #[arg(long, global = true)]
    log_format: Option<Format>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an experiment
    Run {
        /// Scheduling policy (ba, dtx, pf, pf_ba, pf_dtx, raps)
        #[arg(short, long)]
        policy: Option<Policy>,

        /// Independent repetitions
        #[arg(short, long)]
        repetitions: Option<usize>,

        /// Base seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output directory for result artifacts
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Write an example configuration to `path`, or stdout
    ExampleConfig { path: Option<PathBuf> },

    /// Build, associate and store one world as JSON
    PrecomputeWorld {
        path: PathBuf,

        /// Seed of the stored world
        #[arg(short, long)]
        seed: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Json,
    Pretty,
    Compact,
}

impl From<Format> for LogFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => LogFormat::Json,
            Format::Pretty => LogFormat::Pretty,
            Format::Compact => LogFormat::Compact,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    match path {
        Some(path) => SimConfig::load_from(path).with_context(|| format!("loading {}", path.display())),
        None => SimConfig::load().context("loading configuration"),
    }
}

fn logging(args: &Args, config: &LogConfig) -> LogConfig {
    let mut log = config.clone();
    if let Some(level) = args.log_level {
        log.level = level.into();
    }
    if let Some(format) = args.log_format {
        log.format = format.into();
    }
    log
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::ExampleConfig { ref path } => {
            let yaml = SimConfig::example_yaml();
            match path {
                Some(path) => {
                    std::fs::write(path, yaml).with_context(|| format!("writing {}", path.display()))?;
                    println!("wrote {}", path.display());
                }
                None => print!("{yaml}"),
            }
            Ok(())
        }
        Command::PrecomputeWorld { ref path, seed } => {
            let config = load_config(args.config.as_deref())?;
            init_logging(&logging(&args, &config.logging)).context("initializing logging")?;
            config.validate().context("invalid configuration")?;
            let seed = seed.unwrap_or(config.experiment.seed);

            let mut config = config;
            config.experiment.seed = seed;
            config.experiment.load_world = None;
            let world = Experiment::new(config)?.prepare_world(0).context("building world")?;
            world.save(path).with_context(|| format!("saving world to {}", path.display()))?;
            info!(path = %path.display(), seed, cells = world.cells().len(), mobiles = world.mobiles().len(), "world stored");
            Ok(())
        }
        Command::Run {
            policy,
            repetitions,
            seed,
            ref out,
        } => {
            let mut config = load_config(args.config.as_deref())?;
            if let Some(policy) = policy {
                config.scheduling.policy = policy;
            }
            if let Some(repetitions) = repetitions {
                config.experiment.repetitions = repetitions;
            }
            if let Some(seed) = seed {
                config.experiment.seed = seed;
            }
            if let Some(out) = out {
                config.experiment.output_dir = out.clone();
            }
            let mut log = logging(&args, &config.logging);
            if log.file.is_none() {
                log.file = Some(config.experiment.output_dir.join("log.txt"));
            }
            init_logging(&log).context("initializing logging")?;

            let start = Instant::now();
            info!(version = env!("CARGO_PKG_VERSION"), policy = %config.scheduling.policy, "RAPS starting");
            let output_dir = config.experiment.output_dir.clone();
            let experiment = Experiment::new(config).context("invalid configuration")?;
            let mut sink = CsvSink::new(&output_dir)?;
            experiment
                .config()
                .save(&output_dir.join("settings.yaml"))
                .context("saving settings")?;

            let summary = experiment.run().context("experiment failed")?;
            summary.write(&mut sink).context("writing results")?;
            info!(
                supply = summary.final_supply(),
                delivered = summary.final_delivered(),
                misses = summary.misses().iter().sum::<usize>(),
                seconds = start.elapsed().as_secs_f64(),
                dir = %output_dir.display(),
                "experiment finished"
            );
            Ok(())
        }
    }
}
