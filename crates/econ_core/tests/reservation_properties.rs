//! Property tests: reservations always match the order book and never leak.

use econ_core::prelude::*;
use econ_test_utils::determinism::strategies::{
    arb_episode, arb_footprint, arb_ledger_op, arb_tile, EpisodeStep, LedgerOp,
};
use econ_test_utils::fixtures::{opening_environment, standard_scheduler};
use econ_test_utils::MockEnvironment;
use proptest::prelude::*;

fn apply(step: &EpisodeStep, env: &mut MockEnvironment, scheduler: &mut Scheduler) {
    let outstanding = env.outstanding();
    let pick = |n: usize| (!outstanding.is_empty()).then(|| outstanding[n % outstanding.len()]);

    match step {
        EpisodeStep::Tick => {
            env.advance();
            scheduler.run_frame(env).unwrap();
        }
        EpisodeStep::Confirm(n) => {
            if let Some(order) = pick(*n) {
                env.confirm(order);
            }
        }
        EpisodeStep::Cancel(n) => {
            if let Some(order) = pick(*n) {
                env.cancel(order);
            }
        }
        EpisodeStep::DestroyProducer(n) => {
            if let Some(order) = pick(*n) {
                let producer = env
                    .commands()
                    .iter()
                    .find(|c| c.order == order)
                    .map(|c| c.producer);
                if let Some(producer) = producer {
                    env.destroy(producer);
                }
            }
        }
        EpisodeStep::Income(minerals) => {
            env.balance += ResourceCost::new(*minerals, 0);
        }
        EpisodeStep::CompleteAll => env.complete_all(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The ledger holds exactly the floor plus open reservations.
    #[test]
    fn prop_ledger_matches_open_reservations(ops in proptest::collection::vec(arb_ledger_op(), 1..60)) {
        let floor = ResourceCost::new(400, 0);
        let mut ledger = ResourceLedger::new(floor, UnderflowPolicy::Strict);
        let mut open: Vec<ResourceCost> = Vec::new();

        for op in ops {
            match op {
                LedgerOp::Reserve(cost) => {
                    if ledger.can_afford(cost) {
                        ledger.reserve(cost);
                        open.push(cost);
                    }
                }
                LedgerOp::Release(n) => {
                    if !open.is_empty() {
                        let cost = open.remove(n % open.len());
                        prop_assert!(ledger.release(cost).is_ok());
                    }
                }
                LedgerOp::Refresh(balance) => ledger.refresh(balance),
            }
            let held = open.iter().fold(ResourceCost::ZERO, |acc, c| acc + *c);
            prop_assert_eq!(ledger.reserved(), floor + held);
            prop_assert_eq!(ledger.held(), held);
        }

        for cost in open.drain(..) {
            prop_assert!(ledger.release(cost).is_ok());
        }
        prop_assert_eq!(ledger.reserved(), floor);
    }

    /// Successful claims never share a cell, and releasing them all empties
    /// the grid.
    #[test]
    fn prop_claims_never_overlap(
        requests in proptest::collection::vec((arb_tile(), arb_footprint()), 1..30)
    ) {
        let mut grid = ReservationGrid::new(64, 64, 1, 1);
        let mut claims = Vec::new();

        for (index, (origin, footprint)) in requests.into_iter().enumerate() {
            let owner = OrderId(index as u64 + 1);
            let free = grid.can_claim(origin, footprint);
            prop_assert_eq!(grid.claim(origin, footprint, owner), free);
            if free {
                prop_assert_eq!(grid.owner_at(origin.x, origin.y), Some(owner));
                claims.push((origin, footprint, owner));
            }
        }

        let expected: usize = claims
            .iter()
            .map(|(_, f, _)| ((f.width + 2) * (f.height + 2)) as usize)
            .sum();
        prop_assert_eq!(grid.claimed_count(), expected);

        for (origin, footprint, owner) in claims {
            grid.release(origin, footprint, owner);
        }
        prop_assert_eq!(grid.claimed_count(), 0);
    }

    /// Whatever the environment does, reservations track pending orders and
    /// ending the episode returns the ledger to its floor.
    #[test]
    fn prop_episode_never_leaks(script in arb_episode(80)) {
        let mut env = opening_environment(600);
        let mut scheduler = standard_scheduler(&env);

        for step in &script {
            apply(step, &mut env, &mut scheduler);
            prop_assert!(scheduler.check_invariants().is_ok());
        }

        // Drain whatever the script left queued
        env.advance();
        scheduler.run_frame(&mut env).unwrap();
        prop_assert!(scheduler.check_invariants().is_ok());

        scheduler.end_episode();
        prop_assert_eq!(scheduler.ledger().reserved(), scheduler.ledger().floor());
        prop_assert_eq!(scheduler.grid().claimed_count(), 0);
        prop_assert_eq!(scheduler.pending_orders().count(), 0);
    }

    /// Each producer carries at most one pending order.
    #[test]
    fn prop_producer_bound_once(script in arb_episode(60)) {
        let mut env = opening_environment(2000);
        let mut scheduler = standard_scheduler(&env);

        for step in &script {
            apply(step, &mut env, &mut scheduler);
            let mut producers: Vec<EntityId> =
                scheduler.pending_orders().filter_map(|o| o.producer).collect();
            let total = producers.len();
            producers.sort_unstable();
            producers.dedup();
            prop_assert_eq!(producers.len(), total);
        }
    }
}
