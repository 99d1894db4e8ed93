//! auction-sim CLI - headless simulation runner
//!
//! Drives the engine at a fixed step size and prints one JSON line per
//! simulated second to stdout. Status and progress go to stderr, so the
//! output stream can be piped straight into `jq` or a file.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use auction_sim_core_rs::{
    PatchParseError, SecondSnapshot, SimParams, SimParamsPatch, Simulation, MAX_DT_S,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("failed to read params file: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Patch(#[from] PatchParseError),
    #[error("failed to encode snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser)]
#[command(name = "auction-sim")]
#[command(about = "Headless ad-auction pressure simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and print per-second KPI snapshots as JSON lines
    Run {
        /// Run seed; equal seeds replay exactly
        #[arg(short, long, default_value_t = 1)]
        seed: u32,

        /// Simulated duration in seconds (rounded to whole steps)
        #[arg(short = 'T', long, default_value_t = 60.0)]
        duration: f64,

        /// Fixed step size in seconds, in (0, 0.2]
        #[arg(long, default_value_t = 0.1)]
        dt: f64,

        /// JSON file with parameter overrides, applied before the run
        #[arg(short, long)]
        params: Option<PathBuf>,
    },
    /// Run a simulation and print only its replay digest
    Digest {
        /// Run seed; equal seeds replay exactly
        #[arg(short, long, default_value_t = 1)]
        seed: u32,

        /// Simulated duration in seconds (rounded to whole steps)
        #[arg(short = 'T', long, default_value_t = 60.0)]
        duration: f64,

        /// Fixed step size in seconds, in (0, 0.2]
        #[arg(long, default_value_t = 0.1)]
        dt: f64,

        /// JSON file with parameter overrides, applied before the run
        #[arg(short, long)]
        params: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("auction_sim=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            seed,
            duration,
            dt,
            params,
        } => run(seed, duration, dt, params.as_deref()),
        Commands::Digest {
            seed,
            duration,
            dt,
            params,
        } => digest(seed, duration, dt, params.as_deref()),
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn run(
    seed: u32,
    duration: f64,
    dt: f64,
    params_path: Option<&std::path::Path>,
) -> Result<(), CliError> {
    let mut sim = build_simulation(seed, dt, params_path)?;
    let steps = step_count(duration, dt)?;
    info!(seed, duration, dt, steps, "starting run");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut flushed = 0u64;
    drive(&mut sim, steps, dt, |snapshot| {
        flushed += 1;
        serde_json::to_writer(&mut out, snapshot)?;
        out.write_all(b"\n")?;
        Ok(())
    })?;
    out.flush()?;

    info!(
        seconds = flushed,
        live_sessions = sim.live_count(),
        digest = %sim.replay_digest(),
        "run complete"
    );
    Ok(())
}

fn digest(
    seed: u32,
    duration: f64,
    dt: f64,
    params_path: Option<&std::path::Path>,
) -> Result<(), CliError> {
    let mut sim = build_simulation(seed, dt, params_path)?;
    let steps = step_count(duration, dt)?;
    drive(&mut sim, steps, dt, |_| Ok(()))?;
    println!("{}", sim.replay_digest());
    Ok(())
}

fn build_simulation(
    seed: u32,
    dt: f64,
    params_path: Option<&std::path::Path>,
) -> Result<Simulation, CliError> {
    if !dt.is_finite() || dt <= 0.0 || dt > MAX_DT_S {
        return Err(CliError::InvalidArgs(format!(
            "dt must be in (0, {}], got {}",
            MAX_DT_S, dt
        )));
    }

    let params = match params_path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let patch = SimParamsPatch::from_json(&text)?;
            SimParams::default().merged(&patch)
        }
        None => SimParams::default(),
    };

    Ok(Simulation::with_params(seed, params))
}

fn step_count(duration: f64, dt: f64) -> Result<u64, CliError> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(CliError::InvalidArgs(format!(
            "duration must be positive, got {}",
            duration
        )));
    }
    Ok((duration / dt).round().max(1.0) as u64)
}

fn drive(
    sim: &mut Simulation,
    steps: u64,
    dt: f64,
    mut emit: impl FnMut(&SecondSnapshot) -> Result<(), CliError>,
) -> Result<(), CliError> {
    for _ in 0..steps {
        sim.tick(dt);
        for snapshot in sim.drain_seconds() {
            emit(&snapshot)?;
        }
    }
    Ok(())
}
