//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the scheduler issues identical
//! commands given identical inputs.
//!
//! # Testing Strategy
//!
//! Two scheduler instances fed the same environment must dispatch the same
//! commands in the same order. Sources of non-determinism include:
//!
//! - **Floating-point math**: Priorities are fixed-point via
//!   [`econ_core::math::Fixed`].
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Pending orders, counts and entities are kept in ordered maps.
//!
//! - **System randomness**: None in the core. Environments that randomize
//!   use explicit seeds.

use econ_core::replay::DispatchLog;
use econ_core::scheduler::Scheduler;

use crate::mock::MockEnvironment;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks run.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic scheduler).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Scheduler is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Drive a scheduler against a self-driving mock for `ticks` ticks and
/// record every dispatched command.
///
/// Each tick the mock advances first, then the scheduler runs a frame.
///
/// # Panics
///
/// Panics if the scheduler reports an error.
pub fn run_episode(
    mut env: MockEnvironment,
    mut scheduler: Scheduler,
    ticks: u64,
) -> (DispatchLog, Scheduler, MockEnvironment) {
    let mut log = DispatchLog::new(scheduler.catalog().name(), 0);
    for _ in 0..ticks {
        env.advance();
        let issued = scheduler.run_frame(&mut env).expect("scheduler tick");
        log.record(&issued);
    }
    log.finalize(scheduler.tick());
    (log, scheduler, env)
}

/// Run the same episode `runs` times and compare dispatch log hashes.
pub fn verify_episode_determinism<F>(runs: usize, ticks: u64, setup: F) -> DeterminismResult
where
    F: Fn() -> (MockEnvironment, Scheduler),
{
    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let (env, scheduler) = setup();
            let (log, _, _) = run_episode(env, scheduler, ticks);
            log.hash()
        })
        .collect();

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks,
    }
}

/// Proptest strategies for scheduler testing.
pub mod strategies {
    use econ_core::grid::{Footprint, TilePos};
    use econ_core::resources::ResourceCost;
    use proptest::prelude::*;

    /// Generate a cost vector in a typical range.
    pub fn arb_cost() -> impl Strategy<Value = ResourceCost> {
        (0i32..500, 0i32..200).prop_map(|(minerals, gas)| ResourceCost::new(minerals, gas))
    }

    /// Generate a tile on a 64x64 map (including out-of-bounds margins).
    pub fn arb_tile() -> impl Strategy<Value = TilePos> {
        (-2i32..66, -2i32..66).prop_map(|(x, y)| TilePos::new(x, y))
    }

    /// Generate a building footprint.
    pub fn arb_footprint() -> impl Strategy<Value = Footprint> {
        (1u32..5, 1u32..5).prop_map(|(w, h)| Footprint::new(w, h))
    }

    /// One operation against a ledger.
    #[derive(Debug, Clone)]
    pub enum LedgerOp {
        /// Reserve a cost for a new order.
        Reserve(ResourceCost),
        /// Release the reservation of the n-th open order (modulo count).
        Release(usize),
        /// New environment balance.
        Refresh(ResourceCost),
    }

    /// Generate a ledger operation.
    pub fn arb_ledger_op() -> impl Strategy<Value = LedgerOp> {
        prop_oneof![
            arb_cost().prop_map(LedgerOp::Reserve),
            any::<usize>().prop_map(LedgerOp::Release),
            (0i32..2000, 0i32..1000).prop_map(|(m, g)| LedgerOp::Refresh(ResourceCost::new(m, g))),
        ]
    }

    /// One scripted step of an episode against the mock environment.
    #[derive(Debug, Clone)]
    pub enum EpisodeStep {
        /// Run one scheduler frame.
        Tick,
        /// Confirm the n-th outstanding command (modulo count).
        Confirm(usize),
        /// Cancel the n-th outstanding command.
        Cancel(usize),
        /// Destroy the producer of the n-th outstanding command.
        DestroyProducer(usize),
        /// Add minerals.
        Income(i32),
        /// Complete every unfinished entity.
        CompleteAll,
    }

    /// Generate an episode step, weighted toward ticks.
    pub fn arb_episode_step() -> impl Strategy<Value = EpisodeStep> {
        prop_oneof![
            4 => Just(EpisodeStep::Tick),
            3 => any::<usize>().prop_map(EpisodeStep::Confirm),
            1 => any::<usize>().prop_map(EpisodeStep::Cancel),
            1 => any::<usize>().prop_map(EpisodeStep::DestroyProducer),
            2 => (0i32..400).prop_map(EpisodeStep::Income),
            1 => Just(EpisodeStep::CompleteAll),
        ]
    }

    /// Generate an episode script.
    pub fn arb_episode(max_len: usize) -> impl Strategy<Value = Vec<EpisodeStep>> {
        proptest::collection::vec(arb_episode_step(), 1..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self_driving_environment, standard_scheduler};

    #[test]
    fn test_episode_determinism() {
        let result = verify_episode_determinism(3, 400, || {
            let env = self_driving_environment(3, 20);
            let scheduler = standard_scheduler(&env);
            (env, scheduler)
        });
        result.assert_deterministic();
        assert_eq!(result.ticks, 400);
        assert_eq!(result.unique_hashes().len(), 1);
    }

    #[test]
    fn test_run_episode_dispatches() {
        let env = self_driving_environment(3, 20);
        let scheduler = standard_scheduler(&env);
        let (log, scheduler, _) = run_episode(env, scheduler, 300);
        assert!(log.command_count() > 0);
        assert_eq!(log.final_tick, 300);
        scheduler.check_invariants().unwrap();
    }
}
