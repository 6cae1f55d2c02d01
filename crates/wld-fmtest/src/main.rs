//! fmtest entry point.
//!
//! Loads the HSM profile, builds the WLD partition table and runs the
//! requested number of key-check iterations.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wld_fmtest::run_iterations;
use wld_hsm::MessageDispatch;
use wld_router::{parse_slot_list, WldConfig, WldRouter};
use wld_sim::{HsmSimulator, PROFILE_ENV};

/// Setup failed: bad profile, no slot configuration or no active slot.
const EXIT_SETUP_FAILURE: u8 = 2;

/// An iteration failed.
const EXIT_ITERATION_FAILURE: u8 = 3;

/// Runs key checks through the WLD router
#[derive(Parser, Debug)]
#[command(name = "fmtest")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of iterations
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    iterations: u64,

    /// HSM profile file
    #[arg(short = 'p', long, env = PROFILE_ENV)]
    profile: PathBuf,

    /// Slot list, overrides WLD_SLOT_LIST (e.g. "1,2 5")
    #[arg(short = 's', long)]
    slots: Option<String>,

    /// Router configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Crypto-officer pin
    #[arg(long, default_value = "userpin")]
    pin: String,

    /// Concurrent workers sharing the router
    #[arg(short = 'w', long, default_value = "1")]
    workers: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn setup(args: &Args) -> anyhow::Result<(Arc<WldRouter>, Arc<HsmSimulator>)> {
    let sim = HsmSimulator::from_file(&args.profile)
        .with_context(|| format!("failed to load HSM profile {}", args.profile.display()))?;
    sim.initialize().context("message dispatch initialization failed")?;
    let sim = Arc::new(sim);

    let config = match &args.config {
        Some(path) => WldConfig::load(path)
            .with_context(|| format!("failed to load router config {}", path.display()))?,
        None => WldConfig::default(),
    }
    .with_env_overrides();

    let explicit = args.slots.as_deref().map(parse_slot_list);

    let router = WldRouter::new(sim.clone(), config);
    let active = router
        .initialize(explicit.as_deref())
        .context("no FM slots and/or adapters available")?;
    info!(active, "WLD router ready");

    Ok((Arc::new(router), sim))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    let (router, sim) = match setup(&args) {
        Ok(ready) => ready,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_SETUP_FAILURE);
        }
    };

    info!(iterations = args.iterations, workers = args.workers, "Starting key-check iterations");

    let result = run_iterations(
        router.clone(),
        sim,
        args.pin.clone(),
        args.iterations,
        args.workers,
    )
    .await;

    let stats = router.stats();
    info!(
        sends = stats.sends,
        successes = stats.successes,
        transient_failures = stats.transient_failures,
        active = router.active_count(),
        "Dispatch statistics"
    );

    match result {
        Ok(summary) => {
            for (slot, count) in &summary.per_slot {
                info!(slot = %slot, iterations = count, "Slot usage");
            }
            info!(iterations = summary.iterations, "All done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Iteration failed: {}", e);
            ExitCode::from(EXIT_ITERATION_FAILURE)
        }
    }
}
