//! Headless scheduler runner.
//!
//! Runs the build-order scheduler against the sandbox economy without a game
//! engine. Designed for soak tests, CI determinism checks and replay
//! verification.
//!
//! # Usage
//!
//! ```bash
//! # One episode with JSON lines on stdout
//! cargo run -p econ_headless -- run --ticks 6000
//!
//! # Many seeds in parallel
//! cargo run -p econ_headless -- batch --count 64 --output results/
//!
//! # Verify determinism
//! cargo run -p econ_headless -- verify --seed 12345 --runs 5
//!
//! # Replay a recorded dispatch log
//! cargo run -p econ_headless -- replay --file run.dlog
//! ```

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use econ_core::catalog::ActionCatalog;
use econ_core::config::SchedulerConfig;
use econ_core::replay::DispatchLog;
use econ_headless::{
    batch::{results_path, run_batch, verify_determinism, verify_log, BatchConfig},
    catalog_loader::{load_catalog, load_scheduler_config},
    runner::EpisodeRunner,
    sandbox::SandboxConfig,
};

#[derive(Parser)]
#[command(name = "econ_headless")]
#[command(about = "Headless build-order scheduler runner for soak tests and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every subcommand.
#[derive(Args, Clone)]
struct Inputs {
    /// Catalog name or RON file (default: embedded standard catalog)
    #[arg(long)]
    catalog: Option<String>,

    /// Directory searched for named catalogs
    #[arg(long)]
    catalog_dir: Option<PathBuf>,

    /// Scheduler config RON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sandbox settings RON file
    #[arg(long)]
    sandbox: Option<PathBuf>,

    /// Switch on rejections, lost events and attrition
    #[arg(long)]
    noisy: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single episode, JSON lines on stdout
    Run {
        #[command(flatten)]
        inputs: Inputs,

        /// Sandbox seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Ticks to run
        #[arg(short, long, default_value = "6000")]
        ticks: u64,

        /// Emit a ledger snapshot every N ticks (0 = never)
        #[arg(long, default_value = "0")]
        snapshot_every: u64,

        /// Save the dispatch log to this file
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Run many seeds in parallel
    Batch {
        #[command(flatten)]
        inputs: Inputs,

        /// Number of episodes
        #[arg(short, long, default_value = "16")]
        count: u32,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Ticks per episode
        #[arg(short, long, default_value = "6000")]
        ticks: u64,

        /// Maximum parallel episodes (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        #[command(flatten)]
        inputs: Inputs,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks per run
        #[arg(short, long, default_value = "6000")]
        ticks: u64,
    },

    /// Re-run a recorded dispatch log and compare
    Replay {
        #[command(flatten)]
        inputs: Inputs,

        /// Dispatch log file
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr (stdout is for JSON lines); RUST_LOG overrides
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            inputs,
            seed,
            ticks,
            snapshot_every,
            record,
        } => cmd_run(&inputs, seed, ticks, snapshot_every, record),
        Commands::Batch {
            inputs,
            count,
            seed,
            ticks,
            parallel,
            output,
        } => cmd_batch(&inputs, count, seed, ticks, parallel, output),
        Commands::Verify {
            inputs,
            seed,
            runs,
            ticks,
        } => cmd_verify(&inputs, seed, runs, ticks),
        Commands::Replay { inputs, file } => cmd_replay(&inputs, file),
    };

    if let Err(message) = result {
        tracing::error!("{message}");
        std::process::exit(1);
    }
}

type Loaded = (ActionCatalog, SchedulerConfig, SandboxConfig);

fn load_inputs(inputs: &Inputs) -> Result<Loaded, String> {
    let catalog = load_catalog(inputs.catalog.as_deref(), inputs.catalog_dir.as_deref())
        .map_err(|e| format!("Failed to load catalog: {e}"))?;
    let config = load_scheduler_config(inputs.config.as_deref())
        .map_err(|e| format!("Failed to load scheduler config: {e}"))?;
    let sandbox = match (&inputs.sandbox, inputs.noisy) {
        (Some(path), _) => SandboxConfig::load(path).map_err(|e| format!("Failed to load sandbox config: {e}"))?,
        (None, true) => SandboxConfig::noisy(0),
        (None, false) => SandboxConfig::default(),
    };
    Ok((catalog, config, sandbox))
}

/// Run a single episode
fn cmd_run(
    inputs: &Inputs,
    seed: u64,
    ticks: u64,
    snapshot_every: u64,
    record: Option<PathBuf>,
) -> Result<(), String> {
    let (catalog, config, sandbox) = load_inputs(inputs)?;
    tracing::info!(catalog = catalog.name(), seed, ticks, "Starting episode");

    let runner = EpisodeRunner::new(catalog, config, sandbox.with_seed(seed))
        .map_err(|e| e.to_string())?
        .with_snapshots(snapshot_every);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let (report, log) = runner.run(ticks, &mut out).map_err(|e| e.to_string())?;
    out.flush().map_err(|e| e.to_string())?;

    if let Some(path) = record {
        log.save(&path).map_err(|e| format!("Failed to save dispatch log: {e}"))?;
        eprintln!("Dispatch log saved to: {}", path.display());
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("EPISODE COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Ticks: {}", report.ticks);
    eprintln!("Dispatched: {}", report.scheduler.dispatched);
    eprintln!("Confirmed: {}", report.scheduler.confirmed);
    eprintln!("Abandoned: {} ({} orphaned)", report.scheduler.abandoned, report.scheduler.orphaned);
    eprintln!(
        "Final balance: {} minerals, {} gas",
        report.final_balance.minerals, report.final_balance.gas
    );
    eprintln!("Log hash: {:016x}", report.log_hash);
    Ok(())
}

/// Run a batch of episodes
fn cmd_batch(
    inputs: &Inputs,
    count: u32,
    seed: u64,
    ticks: u64,
    parallel: u32,
    output: PathBuf,
) -> Result<(), String> {
    let (catalog, config, sandbox) = load_inputs(inputs)?;

    std::fs::create_dir_all(&output)
        .map_err(|e| format!("Cannot create output directory '{}': {e}", output.display()))?;

    let batch = BatchConfig {
        episodes: count,
        seed_start: seed,
        ticks,
        parallel,
        sandbox,
    };
    let results = run_batch(batch, &catalog, &config);

    let path = results_path(&output);
    results
        .save(&path)
        .map_err(|e| format!("Failed to save results: {e}"))?;

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Episodes: {}", results.reports.len());
    if !results.errors.is_empty() {
        eprintln!("Episodes FAILED: {}", results.errors.len());
        for error in results.errors.iter().take(10) {
            eprintln!("  Episode {} (seed {}): {}", error.episode, error.seed, error.message);
        }
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!("Mean dispatched: {:.1}", results.summary.mean_dispatched);
    eprintln!("Mean workers: {:.1}", results.summary.mean_workers);
    eprintln!("Orphaned reservations: {}", results.summary.total_orphaned);
    eprintln!("\nResults saved to: {}", path.display());

    if results.errors.is_empty() {
        Ok(())
    } else {
        Err(format!("{} episodes failed", results.errors.len()))
    }
}

/// Verify determinism
fn cmd_verify(inputs: &Inputs, seed: u64, runs: u32, ticks: u64) -> Result<(), String> {
    let (catalog, config, sandbox) = load_inputs(inputs)?;
    tracing::info!("Verifying determinism: seed {} ({} runs, {} ticks)", seed, runs, ticks);

    let check = verify_determinism(&catalog, &config, &sandbox.with_seed(seed), ticks, runs)
        .map_err(|e| e.to_string())?;

    if check.passed() {
        eprintln!("PASS: All {runs} runs produced identical dispatch logs");
        eprintln!("  Hash: {:016x}", check.hashes[0]);
        Ok(())
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        eprintln!("  Hashes: {:016x?}", check.hashes);
        Err(format!("first divergence at command {:?}", check.divergence))
    }
}

/// Replay a recorded dispatch log
fn cmd_replay(inputs: &Inputs, file: PathBuf) -> Result<(), String> {
    let recorded = DispatchLog::load(&file).map_err(|e| format!("Failed to load dispatch log: {e}"))?;

    eprintln!("Loaded dispatch log:");
    eprintln!("  Scenario: {}", recorded.scenario);
    eprintln!("  Seed: {}", recorded.seed);
    eprintln!("  Commands: {}", recorded.command_count());
    eprintln!("  Duration: {} ticks", recorded.final_tick);

    let mut inputs = inputs.clone();
    if inputs.catalog.is_none() {
        inputs.catalog = Some(recorded.scenario.clone());
    }
    let (catalog, config, sandbox) = load_inputs(&inputs)?;

    let check = verify_log(&recorded, &catalog, &config, &sandbox).map_err(|e| e.to_string())?;
    if check.passed() {
        eprintln!("PASS: Replay matches the recording");
        eprintln!("  Hash: {:016x}", check.hashes[0]);
        Ok(())
    } else {
        eprintln!("FAIL: Replay diverged!");
        eprintln!("  Expected: {:016x}", check.hashes[0]);
        eprintln!("  Actual:   {:016x}", check.hashes[1]);
        Err(format!("first divergence at command {:?}", check.divergence))
    }
}
