//! Deterministic sandbox economy.
//!
//! [`SandboxEnvironment`] is a small stand-in for a real game engine: workers
//! mine on a fixed cadence, commands start a couple of ticks after they are
//! accepted (when the cost is debited), and units, buildings and research
//! finish after the catalog's build time. Optional seeded noise (command
//! rejection, lost events and attrition) exercises the scheduler's recovery
//! paths. The same seed always yields the same episode.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use econ_core::catalog::{ActionCatalog, ActionDef};
use econ_core::data::ProducerCapability;
use econ_core::environment::{
    Activity, EntityFilter, EntityHandle, EntityId, Environment, EnvironmentEvent,
};
use econ_core::grid::{Footprint, TilePos};
use econ_core::orders::OrderId;
use econ_core::resources::{ResourceCost, ResourceKind};
use econ_core::world::Supply;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SandboxError};

/// Footprint of the starting base.
pub const BASE_FOOTPRINT: Footprint = Footprint::new(4, 3);

/// Cells kept free around proposed buildings.
const PROPOSAL_SPACING: i32 = 2;

// ============================================================================
// Configuration
// ============================================================================

/// Sandbox settings.
///
/// # Example RON
///
/// ```ron
/// SandboxConfig(
///     seed: 7,
///     reject_percent: 5,
///     event_loss_percent: 2,
///     attrition_per_mille: 1,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Seed for every random decision.
    pub seed: u64,
    /// Map width in cells.
    pub map_width: u32,
    /// Map height in cells.
    pub map_height: u32,
    /// Starting balance.
    pub start_balance: ResourceCost,
    /// Workers spawned next to the base.
    pub start_workers: u32,
    /// Supply provided by each completed base.
    pub base_supply: i32,
    /// Supply cap.
    pub max_supply: i32,
    /// Ticks between mining trips.
    pub income_interval: u64,
    /// Minerals each gathering worker returns per trip.
    pub minerals_per_trip: i32,
    /// Kind that yields gas once completed.
    pub gas_kind: String,
    /// Gas each completed gas building yields per trip.
    pub gas_per_trip: i32,
    /// Ticks between acceptance and the cost being debited.
    pub start_delay: u64,
    /// Chance in percent that an issued command is refused.
    pub reject_percent: u32,
    /// Chance in percent that an event is never delivered.
    pub event_loss_percent: u32,
    /// Chance per thousand, each tick, that a non-base entity is destroyed.
    pub attrition_per_mille: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            map_width: 64,
            map_height: 64,
            start_balance: ResourceCost::new(50, 0),
            start_workers: 4,
            base_supply: 10,
            max_supply: 200,
            income_interval: 16,
            minerals_per_trip: 5,
            gas_kind: "refinery".to_string(),
            gas_per_trip: 12,
            start_delay: 2,
            reject_percent: 0,
            event_loss_percent: 0,
            attrition_per_mille: 0,
        }
    }
}

impl SandboxConfig {
    /// Default settings with a different seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Settings with every kind of noise switched on.
    #[must_use]
    pub fn noisy(seed: u64) -> Self {
        Self {
            seed,
            reject_percent: 5,
            event_loss_percent: 3,
            attrition_per_mille: 2,
            ..Self::default()
        }
    }

    /// Check the settings.
    pub fn validate(&self) -> Result<()> {
        if self.map_width < 16 || self.map_height < 16 {
            return Err(SandboxError::InvalidConfig(format!(
                "map {}x{} is smaller than 16x16",
                self.map_width, self.map_height
            )));
        }
        if self.income_interval == 0 {
            return Err(SandboxError::InvalidConfig(
                "income_interval must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("reject_percent", self.reject_percent),
            ("event_loss_percent", self.event_loss_percent),
        ] {
            if value > 100 {
                return Err(SandboxError::InvalidConfig(format!("{name} is {value}, above 100")));
            }
        }
        if self.attrition_per_mille > 1000 {
            return Err(SandboxError::InvalidConfig(format!(
                "attrition_per_mille is {}, above 1000",
                self.attrition_per_mille
            )));
        }
        Ok(())
    }

    /// Parse settings from RON.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| SandboxError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings from a RON file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| SandboxError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = ron::from_str(&source).map_err(|e| SandboxError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Randomness
// ============================================================================

/// Simple deterministic RNG for reproducibility.
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Seeded generator.
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(1),
        }
    }

    /// Next raw value.
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform value in `0..bound` (`bound` > 0).
    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound.max(1)
    }

    /// True with probability `numerator / denominator`.
    ///
    /// Draws nothing when the probability is zero so noise-free runs keep
    /// their random stream untouched.
    pub fn chance(&mut self, numerator: u32, denominator: u32) -> bool {
        if numerator == 0 {
            return false;
        }
        self.below(u64::from(denominator)) < u64::from(numerator)
    }
}

// ============================================================================
// Environment
// ============================================================================

#[derive(Debug, Clone)]
struct SandboxEntity {
    handle: EntityHandle,
    footprint: Option<Footprint>,
    supply: i32,
    supply_provided: i32,
    ready_at: Option<u64>,
    /// Worker constructing it or building training it.
    builder: Option<EntityId>,
}

#[derive(Debug, Clone)]
struct Job {
    order: OrderId,
    producer: EntityId,
    produces: String,
    cost: ResourceCost,
    supply: i32,
    supply_provided: i32,
    footprint: Option<Footprint>,
    position: Option<TilePos>,
    upgrade: bool,
    build_time: u64,
    start_at: u64,
}

/// Sandbox counters, reported with each episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxStats {
    /// Commands accepted.
    pub accepted: u64,
    /// Commands refused at random.
    pub rejected: u64,
    /// Commands cancelled because the producer or the money was gone.
    pub cancelled: u64,
    /// Events dropped at random.
    pub events_lost: u64,
    /// Entities destroyed by attrition.
    pub destroyed: u64,
    /// Minerals mined.
    pub mined_minerals: i64,
    /// Gas mined.
    pub mined_gas: i64,
}

/// Deterministic economy implementing [`Environment`].
#[derive(Debug, Clone)]
pub struct SandboxEnvironment {
    config: SandboxConfig,
    rng: SimpleRng,
    tick: u64,
    next_id: EntityId,
    balance: ResourceCost,
    base_kind: String,
    worker_kind: Option<String>,
    base_tile: TilePos,
    entities: BTreeMap<EntityId, SandboxEntity>,
    occupied: Vec<bool>,
    jobs: VecDeque<Job>,
    research: BTreeMap<String, (EntityId, u64)>,
    events: Vec<EnvironmentEvent>,
    stats: SandboxStats,
}

impl SandboxEnvironment {
    /// Build the starting position for `catalog`: one completed base in the
    /// middle of the map and `start_workers` gathering workers beside it.
    pub fn new(config: SandboxConfig, catalog: &ActionCatalog) -> Result<Self> {
        config.validate()?;
        let base_kind = catalog
            .base_kinds()
            .first()
            .cloned()
            .ok_or_else(|| SandboxError::InvalidConfig("catalog has no base kind".to_string()))?;
        let worker_kind = catalog.iter().find_map(|action| match &action.producer {
            ProducerCapability::Worker(kind) => Some(kind.clone()),
            ProducerCapability::Building(_) => None,
        });
        let worker_supply = worker_kind
            .as_deref()
            .and_then(|kind| catalog.iter().find(|a| a.produces == kind))
            .map_or(1, |a| a.supply);

        let cells = config.map_width as usize * config.map_height as usize;
        let base_tile = TilePos::new(
            i32::try_from(config.map_width / 2).unwrap_or(0) - 2,
            i32::try_from(config.map_height / 2).unwrap_or(0) - 1,
        );

        let mut env = Self {
            rng: SimpleRng::new(config.seed),
            balance: config.start_balance,
            config,
            tick: 0,
            next_id: 1,
            base_kind: base_kind.clone(),
            worker_kind: worker_kind.clone(),
            base_tile,
            entities: BTreeMap::new(),
            occupied: vec![false; cells],
            jobs: VecDeque::new(),
            research: BTreeMap::new(),
            events: Vec::new(),
            stats: SandboxStats::default(),
        };

        env.insert_entity(&base_kind, base_tile, Activity::Idle, Some(BASE_FOOTPRINT), 0, 0);
        if let Some(kind) = worker_kind {
            for offset in 0..env.config.start_workers {
                let tile = TilePos::new(
                    base_tile.x + 5,
                    base_tile.y + i32::try_from(offset).unwrap_or(0),
                );
                env.insert_entity(&kind, tile, Activity::Gathering, None, worker_supply, 0);
            }
        }
        Ok(env)
    }

    fn insert_entity(
        &mut self,
        kind: &str,
        tile: TilePos,
        activity: Activity,
        footprint: Option<Footprint>,
        supply: i32,
        supply_provided: i32,
    ) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        if let Some(footprint) = footprint {
            self.set_occupied(tile, footprint, true);
        }
        self.entities.insert(
            id,
            SandboxEntity {
                handle: EntityHandle {
                    id,
                    kind: kind.to_string(),
                    tile,
                    activity,
                    completed: true,
                },
                footprint,
                supply,
                supply_provided,
                ready_at: None,
                builder: None,
            },
        );
        id
    }

    /// Current tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Current balance.
    pub fn balance(&self) -> ResourceCost {
        self.balance
    }

    /// Sandbox counters.
    pub fn stats(&self) -> SandboxStats {
        self.stats
    }

    /// Settings in use.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Number of entities of `kind`, finished or not.
    pub fn count(&self, kind: &str) -> usize {
        self.entities.values().filter(|e| e.handle.kind == kind).count()
    }

    /// Number of accepted commands that have not started yet.
    pub fn queued_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Advance one tick: mining, job starts, completions, attrition.
    pub fn step(&mut self) {
        self.tick += 1;
        self.mine();
        self.start_jobs();
        self.finish_work();
        self.attrition();
    }

    fn emit(&mut self, event: EnvironmentEvent) {
        if self.rng.chance(self.config.event_loss_percent, 100) {
            self.stats.events_lost += 1;
            tracing::debug!(tick = self.tick, ?event, "event lost");
            return;
        }
        self.events.push(event);
    }

    fn mine(&mut self) {
        if self.tick % self.config.income_interval != 0 {
            return;
        }
        let Some(worker_kind) = self.worker_kind.as_deref() else {
            return;
        };
        let gatherers = self
            .entities
            .values()
            .filter(|e| {
                e.handle.completed
                    && e.handle.kind == worker_kind
                    && e.handle.activity == Activity::Gathering
            })
            .count();
        let gas_sites = self
            .entities
            .values()
            .filter(|e| e.handle.completed && e.handle.kind == self.config.gas_kind)
            .count();

        let minerals = i32::try_from(gatherers)
            .unwrap_or(i32::MAX)
            .saturating_mul(self.config.minerals_per_trip);
        let gas = i32::try_from(gas_sites)
            .unwrap_or(i32::MAX)
            .saturating_mul(self.config.gas_per_trip);
        self.balance += ResourceCost::new(minerals, gas);
        self.stats.mined_minerals += i64::from(minerals);
        self.stats.mined_gas += i64::from(gas);
    }

    fn start_jobs(&mut self) {
        while self.jobs.front().is_some_and(|job| job.start_at <= self.tick) {
            let Some(job) = self.jobs.pop_front() else { break };
            self.start_job(job);
        }
    }

    fn start_job(&mut self, job: Job) {
        let producer_tile = self.entities.get(&job.producer).map(|e| e.handle.tile);
        let affordable = self.balance.minerals >= job.cost.minerals && self.balance.gas >= job.cost.gas;
        let Some(producer_tile) = producer_tile.filter(|_| affordable) else {
            if let (Some(position), Some(footprint)) = (job.position, job.footprint) {
                self.set_occupied(position, footprint, false);
            }
            self.release_producer(job.producer);
            self.stats.cancelled += 1;
            tracing::debug!(tick = self.tick, order = %job.order, affordable, "job cancelled");
            self.emit(EnvironmentEvent::OrderCancelled { order: job.order });
            return;
        };

        self.balance -= job.cost;

        if job.upgrade {
            self.research
                .insert(job.produces.clone(), (job.producer, self.tick + job.build_time));
            self.emit(EnvironmentEvent::ResearchStarted {
                producer: job.producer,
                tech: job.produces,
                order: Some(job.order),
            });
            return;
        }

        let tile = job.position.unwrap_or(producer_tile);
        let id = self.next_id;
        self.next_id += 1;
        let entity = SandboxEntity {
            handle: EntityHandle {
                id,
                kind: job.produces,
                tile,
                activity: Activity::Idle,
                completed: false,
            },
            footprint: job.footprint.filter(|_| job.position.is_some()),
            supply: job.supply,
            supply_provided: job.supply_provided,
            ready_at: Some(self.tick + job.build_time),
            builder: Some(job.producer),
        };
        let handle = entity.handle.clone();
        self.entities.insert(id, entity);

        let builder_activity = if job.position.is_some() {
            Activity::Constructing
        } else {
            Activity::Training
        };
        self.set_activity(job.producer, builder_activity);
        self.emit(EnvironmentEvent::EntityCreated {
            entity: handle,
            order: Some(job.order),
        });
    }

    fn finish_work(&mut self) {
        let tick = self.tick;
        let ready: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.ready_at.is_some_and(|at| at <= tick))
            .map(|(&id, _)| id)
            .collect();

        for id in ready {
            let Some(entity) = self.entities.get_mut(&id) else { continue };
            entity.ready_at = None;
            entity.handle.completed = true;
            let is_worker = self.worker_kind.as_deref() == Some(entity.handle.kind.as_str());
            if is_worker {
                entity.handle.activity = Activity::Gathering;
            }
            let handle = entity.handle.clone();
            let builder = entity.builder.take();

            if let Some(builder) = builder {
                self.release_producer(builder);
            }
            self.emit(EnvironmentEvent::EntityCompleted { entity: handle });
        }

        let finished: Vec<String> = self
            .research
            .iter()
            .filter(|(_, &(_, at))| at <= tick)
            .map(|(tech, _)| tech.clone())
            .collect();
        for tech in finished {
            if let Some((producer, _)) = self.research.remove(&tech) {
                self.release_producer(producer);
            }
            self.emit(EnvironmentEvent::ResearchCompleted { tech });
        }
    }

    fn attrition(&mut self) {
        if !self.rng.chance(self.config.attrition_per_mille, 1000) {
            return;
        }
        let targets: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.handle.kind != self.base_kind)
            .map(|e| e.handle.id)
            .collect();
        if targets.is_empty() {
            return;
        }
        let index = usize::try_from(self.rng.below(targets.len() as u64)).unwrap_or(0);
        self.destroy(targets[index]);
    }

    /// Remove an entity and announce it.
    pub fn destroy(&mut self, id: EntityId) {
        let Some(entity) = self.entities.remove(&id) else {
            return;
        };
        if let Some(footprint) = entity.footprint {
            self.set_occupied(entity.handle.tile, footprint, false);
        }
        self.stats.destroyed += 1;
        tracing::debug!(tick = self.tick, entity = id, kind = %entity.handle.kind, "entity destroyed");
        self.emit(EnvironmentEvent::EntityDestroyed {
            entity: entity.handle,
        });
    }

    fn set_activity(&mut self, id: EntityId, activity: Activity) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.handle.activity = activity;
        }
    }

    /// Workers go back to mining, buildings go idle.
    fn release_producer(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        entity.handle.activity = if self.worker_kind.as_deref() == Some(entity.handle.kind.as_str()) {
            Activity::Gathering
        } else {
            Activity::Idle
        };
    }

    fn cell_index(&self, x: i32, y: i32) -> Option<usize> {
        let x = u32::try_from(x).ok()?;
        let y = u32::try_from(y).ok()?;
        if x >= self.config.map_width || y >= self.config.map_height {
            return None;
        }
        Some(y as usize * self.config.map_width as usize + x as usize)
    }

    fn set_occupied(&mut self, origin: TilePos, footprint: Footprint, value: bool) {
        for (x, y) in footprint_cells(origin, footprint, 0) {
            if let Some(index) = self.cell_index(x, y) {
                self.occupied[index] = value;
            }
        }
    }

    /// Every cell of the footprint expanded by `pad` is on the map and free.
    fn area_free(&self, origin: TilePos, footprint: Footprint, pad: i32) -> bool {
        footprint_cells(origin, footprint, pad)
            .all(|(x, y)| self.cell_index(x, y).is_some_and(|index| !self.occupied[index]))
    }

    fn accept(&mut self, order: OrderId, producer: EntityId, action: &ActionDef, position: Option<TilePos>) {
        if let (Some(position), Some(footprint)) = (position, action.footprint) {
            self.set_occupied(position, footprint, true);
        }
        let busy = match (&action.producer, action.is_upgrade()) {
            (ProducerCapability::Worker(_), _) => Activity::Moving,
            (ProducerCapability::Building(_), true) => Activity::Researching,
            (ProducerCapability::Building(_), false) => Activity::Training,
        };
        self.set_activity(producer, busy);
        self.stats.accepted += 1;
        self.jobs.push_back(Job {
            order,
            producer,
            produces: action.produces.clone(),
            cost: action.cost,
            supply: action.supply,
            supply_provided: action.supply_provided,
            footprint: action.footprint,
            position,
            upgrade: action.is_upgrade(),
            build_time: u64::from(action.build_time),
            start_at: self.tick + self.config.start_delay,
        });
    }

    fn producer_ready(&self, producer: EntityId, action: &ActionDef) -> bool {
        self.entities
            .get(&producer)
            .is_some_and(|e| action.producer.accepts(&e.handle))
    }

    fn roll_rejection(&mut self, order: OrderId) -> bool {
        if self.rng.chance(self.config.reject_percent, 100) {
            self.stats.rejected += 1;
            tracing::debug!(tick = self.tick, order = %order, "command refused");
            return true;
        }
        false
    }
}

fn footprint_cells(origin: TilePos, footprint: Footprint, pad: i32) -> impl Iterator<Item = (i32, i32)> {
    let width = i32::try_from(footprint.width).unwrap_or(i32::MAX);
    let height = i32::try_from(footprint.height).unwrap_or(i32::MAX);
    let (x0, x1) = (origin.x - pad, origin.x + width + pad);
    let (y0, y1) = (origin.y - pad, origin.y + height + pad);
    (y0..y1).flat_map(move |y| (x0..x1).map(move |x| (x, y)))
}

/// Offsets at Chebyshev distance `r`: top and bottom rows, then the sides.
fn ring(r: i32) -> impl Iterator<Item = (i32, i32)> {
    let rows = (-r..=r).flat_map(move |dx| [(dx, -r), (dx, r)]);
    let sides = (1 - r..r).flat_map(move |dy| [(-r, dy), (r, dy)]);
    rows.chain(sides)
}

impl Environment for SandboxEnvironment {
    fn map_size(&self) -> (u32, u32) {
        (self.config.map_width, self.config.map_height)
    }

    fn query_entities(&self, filter: &EntityFilter) -> Vec<EntityHandle> {
        self.entities
            .values()
            .filter(|e| filter.matches(&e.handle))
            .map(|e| e.handle.clone())
            .collect()
    }

    fn resource_balance(&self, kind: ResourceKind) -> i32 {
        self.balance.get(kind)
    }

    fn supply(&self) -> Supply {
        let used = self.entities.values().map(|e| e.supply).sum();
        let total: i32 = self
            .entities
            .values()
            .filter(|e| e.handle.completed)
            .map(|e| {
                if e.handle.kind == self.base_kind {
                    self.config.base_supply
                } else {
                    e.supply_provided
                }
            })
            .sum();
        Supply::new(used, total.min(self.config.max_supply))
    }

    fn issue_produce(&mut self, order: OrderId, producer: EntityId, action: &ActionDef) -> bool {
        if !self.producer_ready(producer, action) || self.roll_rejection(order) {
            return false;
        }
        self.accept(order, producer, action, None);
        true
    }

    fn issue_placement(
        &mut self,
        order: OrderId,
        producer: EntityId,
        action: &ActionDef,
        origin: TilePos,
    ) -> bool {
        if !self.producer_ready(producer, action)
            || !self.validate_placement(origin, action, producer)
            || self.roll_rejection(order)
        {
            return false;
        }
        self.accept(order, producer, action, Some(origin));
        true
    }

    fn validate_placement(&self, origin: TilePos, action: &ActionDef, producer: EntityId) -> bool {
        let Some(footprint) = action.footprint else {
            return false;
        };
        self.entities.contains_key(&producer) && self.area_free(origin, footprint, 0)
    }

    fn build_location(&self, action: &ActionDef, _producer: EntityId) -> Option<TilePos> {
        let footprint = action.footprint?;
        let center = self.base_tile;
        let radius = i32::try_from(self.config.map_width.max(self.config.map_height)).unwrap_or(0);

        // Rings of growing Chebyshev distance around the base
        (1..=radius)
            .flat_map(|r| ring(r).map(move |(dx, dy)| TilePos::new(center.x + dx, center.y + dy)))
            .find(|&origin| self.area_free(origin, footprint, PROPOSAL_SPACING))
    }

    fn poll_events(&mut self) -> Vec<EnvironmentEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(config: SandboxConfig) -> SandboxEnvironment {
        SandboxEnvironment::new(config, &ActionCatalog::standard().unwrap()).unwrap()
    }

    #[test]
    fn test_starting_position() {
        let env = env(SandboxConfig::default());
        assert_eq!(env.count("command_center"), 1);
        assert_eq!(env.count("scv"), 4);
        assert_eq!(env.supply(), Supply::new(4, 10));
        assert_eq!(env.balance(), ResourceCost::new(50, 0));
    }

    #[test]
    fn test_mining_cadence() {
        let mut env = env(SandboxConfig::default());
        for _ in 0..15 {
            env.step();
        }
        assert_eq!(env.balance().minerals, 50);
        env.step();
        assert_eq!(env.balance().minerals, 70);
        assert_eq!(env.stats().mined_minerals, 20);
    }

    #[test]
    fn test_training_lifecycle() {
        let catalog = ActionCatalog::standard().unwrap();
        let scv = catalog.by_key("scv").unwrap().clone();
        let mut env = SandboxEnvironment::new(SandboxConfig::default(), &catalog).unwrap();

        assert!(env.issue_produce(OrderId(1), 1, &scv));
        // The base is busy until the worker finishes
        assert!(!env.issue_produce(OrderId(2), 1, &scv));

        env.step();
        env.step();
        let events = env.poll_events();
        assert!(matches!(
            &events[..],
            [EnvironmentEvent::EntityCreated { entity, order: Some(OrderId(1)) }] if entity.kind == "scv" && !entity.completed
        ));
        assert_eq!(env.balance().minerals, 0);
        assert_eq!(env.supply().used, 5);

        for _ in 0..u64::from(scv.build_time) {
            env.step();
        }
        let events = env.poll_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, EnvironmentEvent::EntityCompleted { entity } if entity.kind == "scv")));
        assert_eq!(env.entities[&1].handle.activity, Activity::Idle);
    }

    #[test]
    fn test_unaffordable_job_cancelled() {
        let catalog = ActionCatalog::standard().unwrap();
        let barracks = catalog.by_key("barracks").unwrap().clone();
        let mut env = SandboxEnvironment::new(SandboxConfig::default(), &catalog).unwrap();

        let origin = env.build_location(&barracks, 2).unwrap();
        assert!(env.issue_placement(OrderId(1), 2, &barracks, origin));
        assert!(!env.validate_placement(origin, &barracks, 3));

        env.step();
        env.step();
        let events = env.poll_events();
        assert_eq!(events, vec![EnvironmentEvent::OrderCancelled { order: OrderId(1) }]);
        assert!(env.validate_placement(origin, &barracks, 3));
        assert_eq!(env.stats().cancelled, 1);
    }

    #[test]
    fn test_build_location_keeps_spacing() {
        let catalog = ActionCatalog::standard().unwrap();
        let depot = catalog.by_key("supply_depot").unwrap().clone();
        let mut env = SandboxEnvironment::new(SandboxConfig::default(), &catalog).unwrap();

        let first = env.build_location(&depot, 2).unwrap();
        assert!(env.issue_placement(OrderId(1), 2, &depot, first));
        let second = env.build_location(&depot, 3).unwrap();
        assert_ne!(first, second);
        assert!(env.area_free(second, depot.footprint.unwrap(), PROPOSAL_SPACING));
    }

    #[test]
    fn test_same_seed_same_noise() {
        let mut a = env(SandboxConfig::noisy(9));
        let mut b = env(SandboxConfig::noisy(9));
        for _ in 0..2000 {
            a.step();
            b.step();
        }
        assert_eq!(a.stats(), b.stats());
        assert_eq!(a.poll_events(), b.poll_events());
    }

    #[test]
    fn test_rng_chance_bounds() {
        let mut rng = SimpleRng::new(3);
        assert!(!rng.chance(0, 100));
        assert!(rng.chance(100, 100));
        assert!((0..100).all(|_| rng.below(7) < 7));
    }

    #[test]
    fn test_config_validation() {
        assert!(SandboxConfig::default().validate().is_ok());
        let bad = SandboxConfig {
            reject_percent: 150,
            ..SandboxConfig::default()
        };
        assert!(matches!(bad.validate(), Err(SandboxError::InvalidConfig(_))));

        let parsed = SandboxConfig::from_ron_str("SandboxConfig(seed: 7, reject_percent: 5)").unwrap();
        assert_eq!(parsed.seed, 7);
        assert_eq!(parsed.map_width, 64);
    }
}
