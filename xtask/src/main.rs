use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the dispatch engine workspace",
    long_about = "A unified CLI for running simulations, benchmarks, load tests\n\
                  and CI checks in the dispatch engine workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the timed simulation with synthetic demand
    Run {
        /// Wall-clock seconds to simulate
        #[arg(long, default_value_t = 10)]
        duration_secs: u64,
        /// Workers registered at start
        #[arg(long, default_value_t = 5)]
        workers: usize,
        /// Optional TOML config passed through to the simulator
        #[arg(long)]
        config: Option<String>,
    },
    /// Run the scripted scenario example
    Scenario,
    /// Run Criterion benchmarks
    Bench,
    /// Compare benchmarks: stash changes, create baseline, restore, compare
    BenchCompare,
    /// Run CI checks (fmt, clippy, tests, examples, benchmarks)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Run load tests (ignored tests in dispatch_core)
    LoadTest,
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build and run the example scenario and a short simulation
    Examples,
    /// Run benchmarks
    Bench,
    /// Run check + examples + bench
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn git(args: &[&str]) -> ExitStatus {
    eprintln!("+ git {}", args.join(" "));
    Command::new("git")
        .args(args)
        .status()
        .expect("failed to execute git")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_git(args: &[&str]) {
    let status = git(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn bench_args<'a>(extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec!["bench", "--package", "dispatch_core", "--bench", "performance"];
    if !extra.is_empty() {
        args.push("--");
        args.extend_from_slice(extra);
    }
    args
}

fn run_simulation(duration_secs: u64, workers: usize, config: Option<&str>) {
    let duration = duration_secs.to_string();
    let workers = workers.to_string();
    let mut args = vec![
        "run",
        "-p",
        "dispatch_sim",
        "--release",
        "--",
        "--duration-secs",
        &duration,
        "--workers",
        &workers,
    ];
    if let Some(config) = config {
        args.push("--config");
        args.push(config);
    }
    run_cargo(&args);
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test dispatch_core");
    run_cargo(&["test", "-p", "dispatch_core"]);

    step("Test dispatch_sim");
    run_cargo(&["test", "-p", "dispatch_sim"]);
}

fn ci_examples() {
    step("Run scenario_run");
    run_cargo(&[
        "run",
        "-p",
        "dispatch_core",
        "--example",
        "scenario_run",
        "--release",
    ]);

    step("Run a short simulation");
    run_simulation(3, 5, None);
}

fn ci_bench() {
    step("Run benchmarks");
    run_cargo(&bench_args(&[]));
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            duration_secs,
            workers,
            config,
        } => {
            run_simulation(duration_secs, workers, config.as_deref());
        }
        Commands::Scenario => {
            run_cargo(&[
                "run",
                "-p",
                "dispatch_core",
                "--example",
                "scenario_run",
                "--release",
            ]);
        }
        Commands::Bench => {
            run_cargo(&bench_args(&[]));
        }
        Commands::BenchCompare => {
            let baseline_dir = Path::new("target/criterion");
            if baseline_dir.exists() {
                step("Removing existing benchmark data");
                std::fs::remove_dir_all(baseline_dir).expect("failed to remove target/criterion");
            }

            step("Stashing current changes");
            run_git(&[
                "stash",
                "push",
                "-m",
                "Temporary stash for benchmark comparison",
            ]);

            step("Running benchmark to create baseline");
            run_cargo(&bench_args(&["--save-baseline", "main"]));

            step("Reapplying changes");
            run_git(&["stash", "pop"]);

            step("Running benchmark comparing against baseline");
            run_cargo(&bench_args(&["--baseline", "main"]));

            eprintln!("\nDone! Check the output above to see performance comparison.");
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Examples => ci_examples(),
                CiJob::Bench => ci_bench(),
                CiJob::All => {
                    ci_check();
                    ci_examples();
                    ci_bench();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::LoadTest => {
            run_cargo(&[
                "test",
                "-p",
                "dispatch_core",
                "--test",
                "load_tests",
                "--",
                "--ignored",
            ]);
        }
    }
}
