//! Scheduler benchmarks for econ_core.
//!
//! Run with: `cargo bench -p econ_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use econ_core::prelude::*;
use econ_test_utils::determinism::run_episode;
use econ_test_utils::fixtures::{opening_environment, self_driving_environment, standard_scheduler};

/// Per-tick cost of evaluation plus dispatch, and a full episode.
pub fn scheduler_benchmark(c: &mut Criterion) {
    c.bench_function("tick_once_opening", |b| {
        b.iter_batched(
            || {
                let env = opening_environment(2000);
                let scheduler = standard_scheduler(&env);
                (env, scheduler)
            },
            |(mut env, mut scheduler)| black_box(scheduler.run_frame(&mut env)),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("episode_1000_ticks", |b| {
        b.iter_batched(
            || {
                let env = self_driving_environment(3, 20);
                let scheduler = standard_scheduler(&env);
                (env, scheduler)
            },
            |(env, scheduler)| black_box(run_episode(env, scheduler, 1000).0.hash()),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("grid_claim_release", |b| {
        let mut grid = ReservationGrid::new(128, 128, 1, 1);
        let footprint = Footprint::new(4, 3);
        b.iter(|| {
            for i in 0..16 {
                let origin = TilePos::new(4 + (i % 4) * 20, 4 + (i / 4) * 20);
                grid.claim(origin, footprint, OrderId(u64::from(i.unsigned_abs())));
            }
            for i in 0..16 {
                let origin = TilePos::new(4 + (i % 4) * 20, 4 + (i / 4) * 20);
                grid.release(origin, footprint, OrderId(u64::from(i.unsigned_abs())));
            }
            black_box(grid.claimed_count())
        });
    });
}

criterion_group!(benches, scheduler_benchmark);
criterion_main!(benches);
