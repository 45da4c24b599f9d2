//! The scheduling tick loop.
//!
//! Each tick the scheduler refreshes balances from the environment, runs a
//! periodic reconciliation when due, scores the catalog and walks the
//! candidates in priority order. A candidate is dispatched when it is off
//! cooldown, affordable, has a free producer and (for buildings) a location
//! that both the environment and the reservation grid accept. Dispatch
//! reserves the cost and the footprint until the environment reports the
//! outcome, see [`crate::reconcile`].
//!
//! All mutable state lives in one [`SchedulerContext`] owned by the
//! [`Scheduler`]; nothing is shared, so no locking is needed.

use serde::{Deserialize, Serialize};

use crate::catalog::{ActionCatalog, ActionDef, ActionId};
use crate::config::SchedulerConfig;
use crate::environment::{EntityFilter, EntityHandle, EntityId, Environment};
use crate::error::{Result, SchedulerError};
use crate::grid::{ReservationGrid, TilePos};
use crate::ledger::{LedgerSnapshot, ResourceLedger};
use crate::orders::{Claim, OrderBook, OrderId, OrderStatus, PendingOrder};
use crate::priority::{Candidate, PriorityEvaluator};
use crate::resources::ResourceCost;
use crate::world::{EntityCounts, Supply, WorldSnapshot};

// ============================================================================
// Outcomes
// ============================================================================

/// A command accepted by the environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssuedCommand {
    /// Tick of dispatch.
    pub tick: u64,
    /// Correlation token.
    pub order: OrderId,
    /// Dispatched action.
    pub action: ActionId,
    /// Action key, for logs and replays.
    pub key: String,
    /// Unit or building that received the command.
    pub producer: EntityId,
    /// Build location, for buildings.
    pub position: Option<TilePos>,
    /// Reserved cost.
    pub cost: ResourceCost,
}

/// Result of attempting one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Accepted; cost (and footprint) reserved.
    Dispatched(IssuedCommand),
    /// Attempted too recently.
    CoolingDown,
    /// Free balance does not cover the cost.
    Unaffordable,
    /// No completed, unbound producer is available.
    NoProducer,
    /// No proposed location passed validation and the grid.
    PlacementRejected,
    /// The environment refused the command.
    DispatchRejected,
}

/// Running counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Ticks run.
    pub ticks: u64,
    /// Commands accepted by the environment.
    pub dispatched: u64,
    /// Candidates skipped for lack of resources.
    pub unaffordable: u64,
    /// Candidates skipped for lack of a producer.
    pub no_producer: u64,
    /// Candidates skipped while cooling down.
    pub cooling_down: u64,
    /// Building candidates with no acceptable location.
    pub placement_rejected: u64,
    /// Commands refused by the environment.
    pub dispatch_rejected: u64,
    /// Orders confirmed by an event.
    pub confirmed: u64,
    /// Orders abandoned (cancelled, producer lost, timed out, episode end).
    pub abandoned: u64,
    /// Orders force-abandoned by the timeout.
    pub orphaned: u64,
    /// Creation events that matched no pending order.
    pub unmatched_creations: u64,
    /// Full reconciliations run.
    pub reconciliations: u64,
}

impl SchedulerStats {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Dispatched(_) => self.dispatched += 1,
            DispatchOutcome::CoolingDown => self.cooling_down += 1,
            DispatchOutcome::Unaffordable => self.unaffordable += 1,
            DispatchOutcome::NoProducer => self.no_producer += 1,
            DispatchOutcome::PlacementRejected => self.placement_rejected += 1,
            DispatchOutcome::DispatchRejected => self.dispatch_rejected += 1,
        }
    }
}

// ============================================================================
// Context
// ============================================================================

/// All mutable scheduling state.
#[derive(Debug, Clone)]
pub struct SchedulerContext {
    /// Resource reservations.
    pub(crate) ledger: ResourceLedger,
    /// Placement reservations.
    pub(crate) grid: ReservationGrid,
    /// In-flight orders.
    pub(crate) orders: OrderBook,
    /// Entity and tech counts.
    pub(crate) counts: EntityCounts,
    /// Last supply reading.
    pub(crate) supply: Supply,
    /// Earliest tick each action may be attempted again, by action index.
    pub(crate) next_eligible: Vec<u64>,
    /// Current tick (0 before the first tick).
    pub(crate) tick: u64,
    /// Tick of the last full reconciliation.
    pub(crate) last_reconcile: Option<u64>,
    /// Counters.
    pub(crate) stats: SchedulerStats,
}

impl SchedulerContext {
    fn new(config: &SchedulerConfig, map_size: (u32, u32), action_count: usize) -> Self {
        Self {
            ledger: ResourceLedger::new(config.reserve_floor, config.underflow_policy),
            grid: ReservationGrid::new(
                map_size.0,
                map_size.1,
                config.placement_margin,
                config.placement_border,
            ),
            orders: OrderBook::new(config.history_len),
            counts: EntityCounts::default(),
            supply: Supply::default(),
            next_eligible: vec![0; action_count],
            tick: 0,
            last_reconcile: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Check that reservations match the order book exactly.
    ///
    /// The ledger must hold the floor plus every pending order's cost, and
    /// the grid must contain exactly the claims of pending orders.
    pub fn check_invariants(&self) -> Result<()> {
        let expected = self.ledger.floor() + self.orders.pending_cost();
        if self.ledger.reserved() != expected {
            return Err(SchedulerError::InvalidState(format!(
                "reserved {:?} != floor + pending {:?}",
                self.ledger.reserved(),
                expected
            )));
        }

        let mut claimed_cells = 0usize;
        for order in self.orders.pending() {
            let Some(claim) = order.claim else { continue };
            if self.grid.owner_at(claim.origin.x, claim.origin.y) != Some(order.id) {
                return Err(SchedulerError::InvalidState(format!(
                    "order {} does not own its claim at {:?}",
                    order.id, claim.origin
                )));
            }
            let margin = self.grid.margin() * 2;
            claimed_cells +=
                ((claim.footprint.width + margin) * (claim.footprint.height + margin)) as usize;
        }
        if self.grid.claimed_count() != claimed_cells {
            return Err(SchedulerError::InvalidState(format!(
                "{} cells claimed, pending orders account for {}",
                self.grid.claimed_count(),
                claimed_cells
            )));
        }
        Ok(())
    }

    /// Commit a dispatch the environment accepted.
    fn commit(
        &mut self,
        order: OrderId,
        action: &ActionDef,
        producer: EntityId,
        claim: Option<Claim>,
    ) -> IssuedCommand {
        self.ledger.reserve(action.cost);
        self.orders.insert(PendingOrder {
            id: order,
            action: action.id,
            produces: action.produces.clone(),
            cost: action.cost,
            claim,
            producer: Some(producer),
            issued_tick: self.tick,
            status: OrderStatus::Pending,
            entity: None,
            resolved_tick: None,
        });
        tracing::debug!(
            tick = self.tick,
            order = %order,
            action = %action.key,
            producer,
            reserved_minerals = self.ledger.reserved().minerals,
            reserved_gas = self.ledger.reserved().gas,
            "dispatched"
        );
        IssuedCommand {
            tick: self.tick,
            order,
            action: action.id,
            key: action.key.clone(),
            producer,
            position: claim.map(|c| c.origin),
            cost: action.cost,
        }
    }

    /// Producers able to take `action` right now, lowest id first.
    fn eligible_producers<E: Environment + ?Sized>(
        &self,
        env: &E,
        action: &ActionDef,
    ) -> Vec<EntityHandle> {
        let filter = EntityFilter::of_kind(action.producer.kind()).completed();
        let mut producers: Vec<EntityHandle> = env
            .query_entities(&filter)
            .into_iter()
            .filter(|e| action.producer.accepts(e) && !self.orders.is_producer_busy(e.id))
            .collect();
        producers.sort_by_key(|e| e.id);
        producers
    }

    /// Try to dispatch one action.
    fn attempt<E: Environment + ?Sized>(
        &mut self,
        env: &mut E,
        config: &SchedulerConfig,
        action: &ActionDef,
    ) -> DispatchOutcome {
        let index = action.id.index();
        if self.tick < self.next_eligible[index] {
            return DispatchOutcome::CoolingDown;
        }
        if !self.ledger.can_afford(action.cost) {
            return DispatchOutcome::Unaffordable;
        }

        let producers = self.eligible_producers(env, action);
        if producers.is_empty() {
            return DispatchOutcome::NoProducer;
        }
        // Any real attempt starts the cooldown, successful or not. That
        // includes placements turned away only by an existing grid claim.
        self.next_eligible[index] = self.tick + action.cooldown.max(1);

        let Some(footprint) = action.footprint.filter(|_| action.is_building()) else {
            let producer = producers[0].id;
            let order = self.orders.allocate_id();
            return if env.issue_produce(order, producer, action) {
                DispatchOutcome::Dispatched(self.commit(order, action, producer, None))
            } else {
                tracing::debug!(tick = self.tick, action = %action.key, producer, "produce rejected");
                DispatchOutcome::DispatchRejected
            };
        };

        for producer in producers.iter().take(config.max_placement_attempts) {
            let Some(origin) = env.build_location(action, producer.id) else {
                continue;
            };
            if !env.validate_placement(origin, action, producer.id) {
                continue;
            }
            let order = self.orders.allocate_id();
            if !self.grid.claim(origin, footprint, order) {
                tracing::debug!(tick = self.tick, action = %action.key, ?origin, "location already claimed");
                continue;
            }
            if env.issue_placement(order, producer.id, action, origin) {
                let claim = Claim { origin, footprint };
                return DispatchOutcome::Dispatched(self.commit(order, action, producer.id, Some(claim)));
            }
            self.grid.release(origin, footprint, order);
            tracing::debug!(tick = self.tick, action = %action.key, ?origin, "placement rejected by environment");
            return DispatchOutcome::DispatchRejected;
        }
        DispatchOutcome::PlacementRejected
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Build-order scheduler for one episode.
#[derive(Debug, Clone)]
pub struct Scheduler {
    pub(crate) catalog: ActionCatalog,
    pub(crate) config: SchedulerConfig,
    pub(crate) evaluator: PriorityEvaluator,
    pub(crate) context: SchedulerContext,
}

impl Scheduler {
    /// Create a scheduler for a map of `map_size` cells.
    pub fn new(catalog: ActionCatalog, config: SchedulerConfig, map_size: (u32, u32)) -> Result<Self> {
        config.validate()?;
        let context = SchedulerContext::new(&config, map_size, catalog.len());
        Ok(Self {
            evaluator: PriorityEvaluator::from_config(&config),
            catalog,
            config,
            context,
        })
    }

    /// Create a scheduler sized for `env`'s map.
    pub fn for_environment<E: Environment + ?Sized>(
        catalog: ActionCatalog,
        config: SchedulerConfig,
        env: &E,
    ) -> Result<Self> {
        Self::new(catalog, config, env.map_size())
    }

    /// Drain pending events, then run one tick.
    pub fn run_frame<E: Environment + ?Sized>(&mut self, env: &mut E) -> Result<Vec<IssuedCommand>> {
        for event in env.poll_events() {
            self.handle_event(&event)?;
        }
        self.tick_once(env)
    }

    /// Run one scheduling tick and return the commands issued.
    ///
    /// Only a ledger underflow under the strict policy is an error; every
    /// per-candidate failure is an ordinary outcome.
    pub fn tick_once<E: Environment + ?Sized>(&mut self, env: &mut E) -> Result<Vec<IssuedCommand>> {
        self.context.tick += 1;
        self.context.stats.ticks += 1;
        self.context.ledger.refresh(env.balances());
        self.context.supply = env.supply();

        let due = self
            .context
            .last_reconcile
            .map_or(true, |last| self.context.tick - last >= self.config.reconcile_period);
        if due {
            self.reconcile(env)?;
        }

        let snapshot = self.snapshot();
        let candidates = self.evaluator.evaluate(&self.catalog, &snapshot);

        let mut issued = Vec::new();
        for candidate in candidates {
            if issued.len() >= self.config.max_dispatches_per_tick {
                break;
            }
            let outcome = self.attempt(env, candidate);
            self.context.stats.record(&outcome);
            if let DispatchOutcome::Dispatched(command) = outcome {
                issued.push(command);
            }
        }

        #[cfg(feature = "debug-validation")]
        self.context.check_invariants()?;

        Ok(issued)
    }

    fn attempt<E: Environment + ?Sized>(&mut self, env: &mut E, candidate: Candidate) -> DispatchOutcome {
        let Some(action) = self.catalog.get(candidate.action) else {
            return DispatchOutcome::NoProducer;
        };
        let outcome = self.context.attempt(env, &self.config, action);
        if !matches!(outcome, DispatchOutcome::Dispatched(_)) {
            tracing::trace!(
                tick = self.context.tick,
                action = %action.key,
                priority = %candidate.priority,
                ?outcome,
                "candidate skipped"
            );
        }
        outcome
    }

    /// What the priority evaluator sees this tick.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.context.tick,
            available: self.context.ledger.available(),
            free: self.context.ledger.free_all(),
            supply: self.context.supply,
            counts: self.context.counts.clone(),
            pending: self.context.orders.pending_by_kind(),
        }
    }

    /// Current ledger balances.
    #[must_use]
    pub fn ledger_snapshot(&self) -> LedgerSnapshot {
        self.context.ledger.snapshot()
    }

    /// The ledger.
    #[must_use]
    pub fn ledger(&self) -> &ResourceLedger {
        &self.context.ledger
    }

    /// The placement reservation grid.
    #[must_use]
    pub fn grid(&self) -> &ReservationGrid {
        &self.context.grid
    }

    /// Pending orders in id order.
    pub fn pending_orders(&self) -> impl Iterator<Item = &PendingOrder> {
        self.context.orders.pending()
    }

    /// Recently resolved orders, oldest first.
    pub fn order_history(&self) -> impl Iterator<Item = &PendingOrder> {
        self.context.orders.history()
    }

    /// Entity and tech counts.
    #[must_use]
    pub fn counts(&self) -> &EntityCounts {
        &self.context.counts
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.context.stats
    }

    /// Current tick.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.context.tick
    }

    /// The catalog.
    #[must_use]
    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Verify reservations against pending orders.
    pub fn check_invariants(&self) -> Result<()> {
        self.context.check_invariants()
    }

    /// Finish the episode: abandon every pending order, reset the ledger to
    /// its floor and forget all derived state.
    ///
    /// Returns the orders that were still pending.
    pub fn end_episode(&mut self) -> Vec<PendingOrder> {
        let tick = self.context.tick;
        let abandoned = self.context.orders.drain_pending();
        self.context.stats.abandoned += abandoned.len() as u64;

        tracing::info!(
            tick,
            abandoned = abandoned.len(),
            dispatched = self.context.stats.dispatched,
            confirmed = self.context.stats.confirmed,
            "episode ended"
        );

        self.context.ledger.reset();
        self.context.grid.clear();
        self.context.orders.clear();
        self.context.counts.clear();
        self.context.supply = Supply::default();
        self.context.next_eligible.fill(0);
        self.context.tick = 0;
        self.context.last_reconcile = None;

        abandoned
            .into_iter()
            .map(|mut order| {
                order.status = OrderStatus::Abandoned(crate::orders::AbandonReason::EpisodeEnd);
                order.resolved_tick = Some(tick);
                order
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Activity, EnvironmentEvent};
    use crate::resources::ResourceKind;

    /// Command center, some workers, fixed balance; accepts everything.
    struct Stub {
        minerals: i32,
        entities: Vec<EntityHandle>,
        accept: bool,
        issued: Vec<(OrderId, EntityId)>,
    }

    impl Stub {
        fn new(minerals: i32) -> Self {
            let mut entities = vec![EntityHandle {
                id: 1,
                kind: "command_center".to_string(),
                tile: TilePos::new(20, 20),
                activity: Activity::Idle,
                completed: true,
            }];
            for id in 2..6 {
                entities.push(EntityHandle {
                    id,
                    kind: "scv".to_string(),
                    tile: TilePos::new(24, 20),
                    activity: Activity::Gathering,
                    completed: true,
                });
            }
            Self {
                minerals,
                entities,
                accept: true,
                issued: Vec::new(),
            }
        }
    }

    impl Environment for Stub {
        fn map_size(&self) -> (u32, u32) {
            (64, 64)
        }
        fn query_entities(&self, filter: &EntityFilter) -> Vec<EntityHandle> {
            self.entities.iter().filter(|e| filter.matches(e)).cloned().collect()
        }
        fn resource_balance(&self, kind: ResourceKind) -> i32 {
            match kind {
                ResourceKind::Minerals => self.minerals,
                ResourceKind::Gas => 0,
            }
        }
        fn supply(&self) -> Supply {
            Supply::new(4, 10)
        }
        fn issue_produce(&mut self, order: OrderId, producer: EntityId, _: &ActionDef) -> bool {
            self.issued.push((order, producer));
            self.accept
        }
        fn issue_placement(&mut self, order: OrderId, producer: EntityId, _: &ActionDef, _: TilePos) -> bool {
            self.issued.push((order, producer));
            self.accept
        }
        fn validate_placement(&self, _: TilePos, _: &ActionDef, _: EntityId) -> bool {
            true
        }
        fn build_location(&self, _: &ActionDef, producer: EntityId) -> Option<TilePos> {
            let offset = i32::try_from(producer).unwrap_or(0) * 6;
            Some(TilePos::new(offset, 10))
        }
        fn poll_events(&mut self) -> Vec<EnvironmentEvent> {
            Vec::new()
        }
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(
            ActionCatalog::standard().unwrap(),
            SchedulerConfig::default(),
            (64, 64),
        )
        .unwrap()
    }

    #[test]
    fn test_worker_scenario_floor_400() {
        let mut env = Stub::new(450);
        let mut scheduler = scheduler();

        let issued = scheduler.tick_once(&mut env).unwrap();
        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].key, "scv");
        assert_eq!(issued[0].producer, 1);

        let ledger = scheduler.ledger_snapshot();
        assert_eq!(ledger.reserved.minerals, 450);
        assert_eq!(ledger.free.minerals, 0);

        // Balance unchanged until the environment debits; nothing affordable
        let issued = scheduler.tick_once(&mut env).unwrap();
        assert!(issued.is_empty());
        assert!(scheduler.stats().unaffordable > 0);
        scheduler.check_invariants().unwrap();
    }

    #[test]
    fn test_rejected_dispatch_reserves_nothing() {
        let mut env = Stub::new(1000);
        env.accept = false;
        let mut scheduler = scheduler();

        let issued = scheduler.tick_once(&mut env).unwrap();
        assert!(issued.is_empty());
        assert_eq!(scheduler.ledger().held(), ResourceCost::ZERO);
        assert_eq!(scheduler.grid().claimed_count(), 0);
        assert_eq!(scheduler.pending_orders().count(), 0);
        assert!(scheduler.stats().dispatch_rejected >= 2);
    }

    #[test]
    fn test_budget_and_busy_producers() {
        let mut env = Stub::new(5000);
        let config = SchedulerConfig {
            max_dispatches_per_tick: 1,
            ..SchedulerConfig::default()
        };
        let mut scheduler = Scheduler::new(ActionCatalog::standard().unwrap(), config, (64, 64)).unwrap();

        assert_eq!(scheduler.tick_once(&mut env).unwrap().len(), 1);
        assert_eq!(scheduler.tick_once(&mut env).unwrap().len(), 1);

        // Two orders, never the same producer
        let producers: Vec<_> = scheduler.pending_orders().map(|o| o.producer).collect();
        assert_eq!(producers.len(), 2);
        assert_ne!(producers[0], producers[1]);
        scheduler.check_invariants().unwrap();
    }

    #[test]
    fn test_end_episode_resets() {
        let mut env = Stub::new(5000);
        let mut scheduler = scheduler();
        scheduler.tick_once(&mut env).unwrap();
        assert!(scheduler.pending_orders().count() > 0);

        let abandoned = scheduler.end_episode();
        assert!(!abandoned.is_empty());
        assert!(abandoned
            .iter()
            .all(|o| o.status == OrderStatus::Abandoned(crate::orders::AbandonReason::EpisodeEnd)));
        assert_eq!(scheduler.ledger().reserved(), ResourceCost::new(400, 0));
        assert_eq!(scheduler.grid().claimed_count(), 0);
        assert_eq!(scheduler.tick(), 0);
        scheduler.check_invariants().unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SchedulerConfig {
            reconcile_period: 0,
            ..SchedulerConfig::default()
        };
        assert!(Scheduler::new(ActionCatalog::standard().unwrap(), config, (64, 64)).is_err());
    }
}
