//! Runs the dispatch engine against synthetic demand for a fixed wall-clock
//! duration and reports what happened.
//!
//! Run with: cargo run -p dispatch_sim -- --workers 8 --duration-secs 20

mod export;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dispatch_core::config::{DispatchConfig, MatchingPolicy};
use dispatch_core::dispatcher::Dispatcher;
use dispatch_core::runner::BackgroundTasks;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dispatch_sim",
    about = "Real-time taxi dispatch simulation driven by synthetic demand"
)]
struct Cli {
    /// TOML config file; omitted values fall back to defaults
    #[arg(long, env = "DISPATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Wall-clock seconds to run before shutting down
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Workers to register before the run starts
    #[arg(long, default_value_t = 5)]
    workers: usize,

    #[arg(long)]
    seed: Option<u64>,

    /// Tick period in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Distance a worker covers per tick
    #[arg(long)]
    step_size: Option<f64>,

    /// Match the nearest free worker regardless of distance
    #[arg(long)]
    global_nearest: bool,

    /// Disable synthetic demand
    #[arg(long)]
    no_demand: bool,

    /// Write the final snapshot as JSON
    #[arg(long)]
    snapshot_json: Option<PathBuf>,

    /// Write the completed-trip log as CSV
    #[arg(long)]
    trips_csv: Option<PathBuf>,
}

impl Cli {
    fn dispatch_config(&self) -> Result<DispatchConfig> {
        let mut config = match &self.config {
            Some(path) => DispatchConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => DispatchConfig::default(),
        };
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(tick_ms) = self.tick_ms {
            config = config.with_tick_interval_ms(tick_ms);
        }
        if let Some(step_size) = self.step_size {
            config = config.with_step_size(step_size);
        }
        if self.global_nearest {
            config = config.with_matching_policy(MatchingPolicy::GlobalNearest);
        }
        config.demand.enabled = !self.no_demand;
        config.movement.start_active = true;
        Ok(config)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = cli.dispatch_config()?;
    let dispatcher = Arc::new(Dispatcher::new(config).context("invalid configuration")?);

    for i in 0..cli.workers {
        let plate = format!("SIM-{:03}", i + 1);
        match dispatcher.register_worker("Sedan", &plate) {
            Ok(worker) => info!(worker = %worker.id, plate, position = %worker.position, "initial worker"),
            Err(err) => warn!(plate, %err, "initial worker not registered"),
        }
    }

    let tasks = BackgroundTasks::spawn(Arc::clone(&dispatcher));
    info!(duration_secs = cli.duration_secs, "simulation running; Ctrl+C to stop early");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(cli.duration_secs)) => {}
        result = signal::ctrl_c() => {
            if let Err(err) = result {
                error!(%err, "failed to listen for Ctrl+C");
            }
            info!("interrupted");
        }
    }
    tasks.shutdown().await;

    let snapshot = dispatcher.snapshot();
    println!("--- Dispatch simulation ---");
    println!("Simulated time: {}", snapshot.clock_label);
    println!(
        "Fleet: {} workers ({} free, {} busy)",
        snapshot.counts.fleet_size(),
        snapshot.counts.workers_free,
        snapshot.counts.workers_busy
    );
    println!("Waiting queue: {}", snapshot.queue_depth);
    println!(
        "Completed trips: {}  company earnings: {:.2}  worker payouts: {:.2}",
        snapshot.ledger.total_trips, snapshot.ledger.company_earnings, snapshot.ledger.worker_payouts
    );
    for worker in &snapshot.workers {
        println!(
            "  {:>4} {:<8} {:<14} rating={:.2} earnings={:>8.2} at {}",
            worker.id.to_string(),
            worker.plate,
            worker.model,
            worker.rating,
            worker.earnings,
            worker.position
        );
    }

    if let Some(path) = &cli.snapshot_json {
        export::export_snapshot_json(&snapshot, path)?;
        info!(path = %path.display(), "snapshot written");
    }
    if let Some(path) = &cli.trips_csv {
        export::export_trips_csv(&dispatcher.ledger().completed_trips(), path)?;
        info!(path = %path.display(), "trip log written");
    }
    Ok(())
}
