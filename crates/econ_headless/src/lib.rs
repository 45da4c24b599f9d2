//! Headless sandbox runner for the build-order scheduler.
//!
//! This crate drives [`econ_core::scheduler::Scheduler`] against a small
//! deterministic economy simulation, with output on stdout as JSON lines.
//! This enables:
//!
//! - **Soak testing**: Long episodes with random rejections, lost events and
//!   attrition, checking reservation invariants every tick
//! - **Batch runs**: Many seeds in parallel for aggregate statistics
//! - **Determinism verification**: The same seed must issue the same commands
//! - **Replay verification**: Re-run a recorded dispatch log and compare
//!
//! # Output
//!
//! - **stdout**: JSON records, one per line (see [`protocol`])
//! - **stderr**: Logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # One episode, ledger snapshot every 500 ticks
//! cargo run -p econ_headless -- run --ticks 6000 --snapshot-every 500
//!
//! # Determinism check with noise switched on
//! cargo run -p econ_headless -- verify --seed 7 --runs 5 --noisy
//!
//! # Record, then replay and compare
//! cargo run -p econ_headless -- run --seed 3 --record run.dlog
//! cargo run -p econ_headless -- replay --file run.dlog
//! ```

pub mod batch;
pub mod catalog_loader;
pub mod error;
pub mod protocol;
pub mod runner;
pub mod sandbox;

pub use batch::{run_batch, verify_determinism, verify_log, BatchConfig, BatchResults, DeterminismCheck};
pub use catalog_loader::{default_catalog_dir, load_catalog, load_scheduler_config};
pub use error::{Result, SandboxError};
pub use protocol::Record;
pub use runner::{run_episode, EpisodeReport, EpisodeRunner};
pub use sandbox::{SandboxConfig, SandboxEnvironment, SimpleRng};
