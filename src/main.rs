//! Flight Assignment Planner
//!
//! Reads a planning scenario, solves the four carrier/heading sub-problems and
//! writes the assignment table as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use flight_assign::model::Stage;
use flight_assign::{dataset, load_scenario, MicroLpBackend, PlanError, Planner, Settings};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "flight-assign", version, about = "Carrier and heading assignment planner")]
struct Args {
    /// Scenario document (JSON)
    input: PathBuf,

    /// Output file, stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Settings file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Solve a single stage, e.g. `dom-arr`
    #[arg(long)]
    stage: Option<Stage>,

    /// Seed for carry-forward heading sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Write Prometheus metrics to this file after the run
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if args.seed.is_some() {
        settings.carry_forward_seed = args.seed;
    }
    info!(?settings, "Settings loaded");

    let scenario = load_scenario(&args.input)
        .with_context(|| format!("Failed to load scenario {}", args.input.display()))?;

    let planner = Planner::new(&scenario, settings, MicroLpBackend::new())?;
    let result = match args.stage {
        Some(stage) => planner.run_stage(stage),
        None => planner.run(),
    };

    if let Some(path) = &args.metrics_out {
        let text = planner.metrics().encode()?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(PlanError::Infeasible { stage, conflicts }) => {
            error!(%stage, conflicts = conflicts.len(), "No feasible assignment");
            eprintln!("{stage} is infeasible. Conflicting constraints:");
            for name in &conflicts {
                eprintln!("  {name}");
            }
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            dataset::write_json(&outcome, std::io::BufWriter::new(file))?;
            info!(path = %path.display(), rows = outcome.assignment.len(), "Assignment written");
        }
        None => dataset::write_json(&outcome, std::io::stdout().lock())?,
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
