//! Batch episodes and determinism verification.
//!
//! Runs many independent episodes in parallel using rayon. Each episode owns
//! its scheduler and sandbox outright, so nothing is shared between threads.

use std::path::{Path, PathBuf};
use std::time::Instant;

use econ_core::catalog::ActionCatalog;
use econ_core::config::SchedulerConfig;
use econ_core::replay::DispatchLog;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SandboxError};
use crate::runner::{run_episode, EpisodeReport};
use crate::sandbox::SandboxConfig;

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of episodes
    pub episodes: u32,
    /// Seed of the first episode; the rest count up from it
    pub seed_start: u64,
    /// Ticks per episode
    pub ticks: u64,
    /// Maximum parallel episodes (0 = use rayon default)
    pub parallel: u32,
    /// Sandbox settings (the seed is overridden per episode)
    pub sandbox: SandboxConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            episodes: 16,
            seed_start: 0,
            ticks: 6000,
            parallel: 0,
            sandbox: SandboxConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Config for `episodes` episodes of `ticks` ticks.
    pub fn new(episodes: u32, ticks: u64) -> Self {
        Self {
            episodes,
            ticks,
            ..Default::default()
        }
    }

    /// Set seed start
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set sandbox settings
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Episode index
    pub episode: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Aggregate over all successful episodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Episodes summarized
    pub episodes: usize,
    /// Mean commands dispatched per episode
    pub mean_dispatched: f64,
    /// Mean orders confirmed per episode
    pub mean_confirmed: f64,
    /// Total orders abandoned
    pub total_abandoned: u64,
    /// Total orders force-abandoned by the timeout
    pub total_orphaned: u64,
    /// Mean completed workers at the end
    pub mean_workers: f64,
}

impl BatchSummary {
    /// Summarize reports; `worker_kind` names the kind counted as workers.
    pub fn from_reports(reports: &[EpisodeReport], worker_kind: &str) -> Self {
        if reports.is_empty() {
            return Self::default();
        }
        let n = reports.len() as f64;
        let sum = |f: &dyn Fn(&EpisodeReport) -> u64| reports.iter().map(f).sum::<u64>();
        let workers = |r: &EpisodeReport| u64::from(r.completed.get(worker_kind).copied().unwrap_or(0));
        Self {
            episodes: reports.len(),
            mean_dispatched: sum(&|r| r.scheduler.dispatched) as f64 / n,
            mean_confirmed: sum(&|r| r.scheduler.confirmed) as f64 / n,
            total_abandoned: sum(&|r| r.scheduler.abandoned),
            total_orphaned: sum(&|r| r.scheduler.orphaned),
            mean_workers: sum(&workers) as f64 / n,
        }
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Per-episode reports, in seed order
    pub reports: Vec<EpisodeReport>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let io_error = |e: std::io::Error| SandboxError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| SandboxError::Output(e.to_string()))?;
        std::fs::write(path, json).map_err(io_error)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| SandboxError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&json).map_err(|e| SandboxError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Run a batch of episodes
pub fn run_batch(config: BatchConfig, catalog: &ActionCatalog, scheduler: &SchedulerConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        episodes = config.episodes,
        ticks = config.ticks,
        catalog = catalog.name(),
        "Starting batch run"
    );

    // Configure thread pool if specified
    if config.parallel > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<std::result::Result<EpisodeReport, BatchError>> = (0..config.episodes)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            let sandbox = config.sandbox.clone().with_seed(seed);
            run_episode(catalog, scheduler, sandbox, config.ticks)
                .map(|(report, _)| report)
                .map_err(|e| {
                    warn!("Episode {} failed: {}", i, e);
                    BatchError {
                        episode: i,
                        seed,
                        message: e.to_string(),
                    }
                })
        })
        .collect();

    let (reports, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(std::result::Result::is_ok);
    let reports: Vec<EpisodeReport> = reports.into_iter().filter_map(std::result::Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(std::result::Result::err).collect();

    let worker_kind = worker_kind(catalog);
    let summary = BatchSummary::from_reports(&reports, &worker_kind);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} episodes in {:.1}s ({} failed)",
        reports.len(),
        duration_seconds,
        errors.len()
    );

    BatchResults {
        config,
        reports,
        summary,
        duration_seconds,
        errors,
    }
}

fn worker_kind(catalog: &ActionCatalog) -> String {
    catalog
        .iter()
        .find_map(|a| match &a.producer {
            econ_core::data::ProducerCapability::Worker(kind) => Some(kind.clone()),
            econ_core::data::ProducerCapability::Building(_) => None,
        })
        .unwrap_or_default()
}

/// Outcome of running the same seed several times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismCheck {
    /// Dispatch log hash of each run.
    pub hashes: Vec<u64>,
    /// First command index where a run diverged from the first run.
    pub divergence: Option<usize>,
}

impl DeterminismCheck {
    /// Whether every run matched.
    pub fn passed(&self) -> bool {
        self.divergence.is_none() && self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Verify determinism by running the same seed `runs` times in parallel.
pub fn verify_determinism(
    catalog: &ActionCatalog,
    scheduler: &SchedulerConfig,
    sandbox: &SandboxConfig,
    ticks: u64,
    runs: u32,
) -> Result<DeterminismCheck> {
    let logs: Vec<DispatchLog> = (0..runs.max(1))
        .into_par_iter()
        .map(|_| run_episode(catalog, scheduler, sandbox.clone(), ticks).map(|(_, log)| log))
        .collect::<Result<_>>()?;

    let divergence = logs
        .iter()
        .skip(1)
        .find_map(|log| logs[0].first_divergence(log));
    Ok(DeterminismCheck {
        hashes: logs.iter().map(DispatchLog::hash).collect(),
        divergence,
    })
}

/// Re-run a recorded dispatch log's episode and compare.
///
/// The log stores the seed; the sandbox settings other than the seed and the
/// scheduler config must match the recording.
pub fn verify_log(
    recorded: &DispatchLog,
    catalog: &ActionCatalog,
    scheduler: &SchedulerConfig,
    sandbox: &SandboxConfig,
) -> Result<DeterminismCheck> {
    let sandbox = sandbox.clone().with_seed(recorded.seed);
    let (_, replayed) = run_episode(catalog, scheduler, sandbox, recorded.final_tick)?;
    Ok(DeterminismCheck {
        hashes: vec![recorded.hash(), replayed.hash()],
        divergence: recorded.first_divergence(&replayed),
    })
}

/// Default location of batch results inside `dir`.
pub fn results_path(dir: &Path) -> PathBuf {
    dir.join("batch_results.json")
}
