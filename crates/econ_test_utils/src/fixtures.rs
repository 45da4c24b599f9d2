//! Test fixtures and helpers.
//!
//! Pre-built catalogs, environments and schedulers for consistent testing.

use econ_core::catalog::ActionCatalog;
use econ_core::config::{SchedulerConfig, UnderflowPolicy};
use econ_core::environment::Activity;
use econ_core::grid::TilePos;
use econ_core::math::Fixed;
use econ_core::resources::ResourceCost;
use econ_core::scheduler::Scheduler;
use econ_core::world::Supply;

use crate::mock::MockEnvironment;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
#[must_use]
pub fn fixed_f(n: f64) -> Fixed {
    Fixed::from_num(n)
}

/// The standard catalog.
///
/// # Panics
///
/// Panics if the embedded catalog fails to load.
#[must_use]
pub fn standard_catalog() -> ActionCatalog {
    ActionCatalog::standard().expect("standard catalog loads")
}

/// Minimal catalog: a hall training workers and workers placing depots.
///
/// Worker priority 2.0 up to 8 workers, depots on supply pressure.
///
/// # Panics
///
/// Panics if the catalog fails to parse.
#[must_use]
pub fn tiny_catalog() -> ActionCatalog {
    ActionCatalog::from_ron_str(
        r#"CatalogData(
            name: "tiny",
            base_kinds: ["hall"],
            actions: [
                ActionData(
                    key: "worker",
                    category: Unit,
                    cost: (minerals: 50),
                    supply: 1,
                    producer: Building("hall"),
                    priority: SoftCap(target: 8, value: 2.0),
                ),
                ActionData(
                    key: "depot",
                    category: Building,
                    cost: (minerals: 100),
                    supply_provided: 8,
                    producer: Worker("worker"),
                    footprint: Some((width: 2, height: 2)),
                    priority: SupplyPressure(max_in_flight: 1, cut_in: 0.5),
                ),
            ],
        )"#,
    )
    .expect("tiny catalog parses")
}

/// Default config with the strict underflow policy.
#[must_use]
pub fn strict_config() -> SchedulerConfig {
    SchedulerConfig {
        underflow_policy: UnderflowPolicy::Strict,
        ..SchedulerConfig::default()
    }
}

/// Candidate build spots on a 64x64 map, spaced so no two claims overlap.
#[must_use]
pub fn build_spots() -> Vec<TilePos> {
    (0..5)
        .flat_map(|row| (0..5).map(move |col| TilePos::new(4 + col * 11, 4 + row * 11)))
        .collect()
}

/// 64x64 map with a completed command center at (30, 30) and four
/// gathering workers, supply 4/10.
#[must_use]
pub fn opening_environment(minerals: i32) -> MockEnvironment {
    let mut env = MockEnvironment::new(64, 64);
    env.spawn("command_center", TilePos::new(30, 30), Activity::Idle, true);
    for offset in 0..4 {
        env.spawn("scv", TilePos::new(34 + offset, 30), Activity::Gathering, true);
    }
    env.balance = ResourceCost::new(minerals, 0);
    env.supply = Supply::new(4, 10);
    env.locations = build_spots();
    env
}

/// Same as [`opening_environment`] but resolving commands on its own:
/// income every tick, confirmation after `confirm_delay`, completion after
/// `complete_delay`.
#[must_use]
pub fn self_driving_environment(confirm_delay: u64, complete_delay: u64) -> MockEnvironment {
    let mut env = opening_environment(50);
    env.income = ResourceCost::new(8, 0);
    env.confirm_delay = Some(confirm_delay);
    env.complete_delay = Some(complete_delay);
    env
}

/// Scheduler with the standard catalog and strict config, sized for `env`.
///
/// # Panics
///
/// Panics if the scheduler cannot be created.
#[must_use]
pub fn standard_scheduler(env: &MockEnvironment) -> Scheduler {
    Scheduler::for_environment(standard_catalog(), strict_config(), env).expect("scheduler builds")
}
