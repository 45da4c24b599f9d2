//! Scripted mock environment.
//!
//! [`MockEnvironment`] implements [`Environment`] with plain in-memory state.
//! Tests decide when commands resolve by calling [`MockEnvironment::confirm`],
//! [`MockEnvironment::cancel`] or [`MockEnvironment::destroy`], or let
//! [`MockEnvironment::advance`] confirm and complete them after fixed delays.
//! Everything is deterministic: entities are kept in id order and ids are
//! handed out sequentially.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use econ_core::catalog::ActionDef;
use econ_core::environment::{
    Activity, EntityFilter, EntityHandle, EntityId, Environment, EnvironmentEvent,
};
use econ_core::grid::TilePos;
use econ_core::orders::OrderId;
use econ_core::resources::{ResourceCost, ResourceKind};
use econ_core::world::Supply;

/// A command the mock accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCommand {
    /// Correlation token.
    pub order: OrderId,
    /// Producer that received it.
    pub producer: EntityId,
    /// Action key.
    pub key: String,
    /// Entity kind or tech produced.
    pub produces: String,
    /// Action cost.
    pub cost: ResourceCost,
    /// Supply consumed.
    pub supply: i32,
    /// Supply provided on completion.
    pub supply_provided: i32,
    /// Build location, for buildings.
    pub position: Option<TilePos>,
    /// True for upgrades.
    pub upgrade: bool,
    /// Tick the mock accepted it.
    pub accepted_tick: u64,
    /// Resolved (confirmed or cancelled) already.
    pub resolved: bool,
}

/// In-memory [`Environment`] driven by the test.
#[derive(Debug, Clone)]
pub struct MockEnvironment {
    width: u32,
    height: u32,
    tick: u64,
    next_id: EntityId,
    entities: BTreeMap<EntityId, EntityHandle>,
    /// Current balance. Debited when a command is confirmed.
    pub balance: ResourceCost,
    /// Current supply.
    pub supply: Supply,
    events: VecDeque<EnvironmentEvent>,
    commands: Vec<MockCommand>,
    /// Accept `issue_produce` calls.
    pub accept_produce: bool,
    /// Accept `issue_placement` calls.
    pub accept_placement: bool,
    /// Answer for `validate_placement`.
    pub placement_valid: bool,
    /// Include correlation tokens in events.
    pub send_tokens: bool,
    /// Locations proposed by `build_location`, cycled per accepted placement.
    pub locations: Vec<TilePos>,
    /// Income added per [`advance`](Self::advance).
    pub income: ResourceCost,
    /// Ticks between acceptance and automatic confirmation (None: manual).
    pub confirm_delay: Option<u64>,
    /// Ticks between confirmation and automatic completion (None: manual).
    pub complete_delay: Option<u64>,
    /// Unfinished entities: creation tick and supply provided on completion.
    created_at: BTreeMap<EntityId, (u64, i32)>,
    researching: BTreeMap<String, u64>,
    tiles: BTreeSet<TilePos>,
}

impl MockEnvironment {
    /// Create an empty mock of the given map size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
            next_id: 1,
            entities: BTreeMap::new(),
            balance: ResourceCost::ZERO,
            supply: Supply::default(),
            events: VecDeque::new(),
            commands: Vec::new(),
            accept_produce: true,
            accept_placement: true,
            placement_valid: true,
            send_tokens: true,
            locations: Vec::new(),
            income: ResourceCost::ZERO,
            confirm_delay: None,
            complete_delay: None,
            created_at: BTreeMap::new(),
            researching: BTreeMap::new(),
            tiles: BTreeSet::new(),
        }
    }

    /// Add an entity without announcing it.
    pub fn spawn(&mut self, kind: &str, tile: TilePos, activity: Activity, completed: bool) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        self.entities.insert(
            id,
            EntityHandle {
                id,
                kind: kind.to_string(),
                tile,
                activity,
                completed,
            },
        );
        id
    }

    /// Look up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&EntityHandle> {
        self.entities.get(&id)
    }

    /// Change an entity's activity.
    pub fn set_activity(&mut self, id: EntityId, activity: Activity) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.activity = activity;
        }
    }

    /// Number of entities of `kind`.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.entities.values().filter(|e| e.kind == kind).count()
    }

    /// Commands accepted so far.
    #[must_use]
    pub fn commands(&self) -> &[MockCommand] {
        &self.commands
    }

    /// Queue an arbitrary event.
    pub fn push_event(&mut self, event: EnvironmentEvent) {
        self.events.push_back(event);
    }

    /// Mock tick counter.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn command_mut(&mut self, order: OrderId) -> Option<&mut MockCommand> {
        self.commands
            .iter_mut()
            .find(|c| c.order == order && !c.resolved)
    }

    /// Resolve an accepted command: debit its cost and announce the entity
    /// (or research start).
    ///
    /// Returns the created entity id, or `None` for research or an unknown
    /// order.
    pub fn confirm(&mut self, order: OrderId) -> Option<EntityId> {
        let tick = self.tick;
        let send_tokens = self.send_tokens;
        let command = self.command_mut(order)?;
        command.resolved = true;
        let command = command.clone();

        self.balance -= command.cost;
        let token = send_tokens.then_some(order);

        if command.upgrade {
            self.researching.insert(command.produces.clone(), tick);
            self.set_activity(command.producer, Activity::Researching);
            self.events.push_back(EnvironmentEvent::ResearchStarted {
                producer: command.producer,
                tech: command.produces,
                order: token,
            });
            return None;
        }

        let tile = match command.position {
            Some(position) => position,
            None => self
                .entities
                .get(&command.producer)
                .map_or(TilePos::new(0, 0), |e| e.tile),
        };
        let id = self.spawn(&command.produces, tile, Activity::Idle, false);
        self.created_at.insert(id, (tick, command.supply_provided));
        self.supply.used += command.supply;
        if command.position.is_some() {
            self.tiles.insert(tile);
        }
        let entity = self.entities[&id].clone();
        self.events.push_back(EnvironmentEvent::EntityCreated { entity, order: token });
        Some(id)
    }

    /// Finish construction or training of an entity.
    pub fn complete(&mut self, id: EntityId) {
        if let Some((_, provided)) = self.created_at.remove(&id) {
            self.supply.total += provided;
        }
        if let Some(entity) = self.entities.get_mut(&id) {
            if !entity.completed {
                entity.completed = true;
                let entity = entity.clone();
                self.events.push_back(EnvironmentEvent::EntityCompleted { entity });
            }
        }
    }

    /// Finish every unfinished entity.
    pub fn complete_all(&mut self) {
        let unfinished: Vec<EntityId> = self.created_at.keys().copied().collect();
        for id in unfinished {
            self.complete(id);
        }
    }

    /// Finish an upgrade.
    pub fn finish_research(&mut self, tech: &str) {
        if self.researching.remove(tech).is_some() {
            self.events.push_back(EnvironmentEvent::ResearchCompleted {
                tech: tech.to_string(),
            });
        }
    }

    /// Destroy an entity and announce it.
    pub fn destroy(&mut self, id: EntityId) {
        self.created_at.remove(&id);
        if let Some(entity) = self.entities.remove(&id) {
            self.tiles.remove(&entity.tile);
            self.events.push_back(EnvironmentEvent::EntityDestroyed { entity });
        }
    }

    /// Remove an entity without announcing it (a lost event).
    pub fn vanish(&mut self, id: EntityId) {
        self.created_at.remove(&id);
        self.entities.remove(&id);
    }

    /// Drop an accepted command and announce the cancellation.
    pub fn cancel(&mut self, order: OrderId) {
        if let Some(command) = self.command_mut(order) {
            command.resolved = true;
            self.events.push_back(EnvironmentEvent::OrderCancelled { order });
        }
    }

    /// Unresolved accepted commands, oldest first.
    #[must_use]
    pub fn outstanding(&self) -> Vec<OrderId> {
        self.commands
            .iter()
            .filter(|c| !c.resolved)
            .map(|c| c.order)
            .collect()
    }

    /// Advance the mock by one tick: add income, then apply the automatic
    /// confirmation and completion delays.
    pub fn advance(&mut self) {
        self.tick += 1;
        self.balance += self.income;

        if let Some(delay) = self.confirm_delay {
            let due: Vec<OrderId> = self
                .commands
                .iter()
                .filter(|c| !c.resolved && self.tick >= c.accepted_tick + delay)
                .map(|c| c.order)
                .collect();
            for order in due {
                self.confirm(order);
            }
        }

        if let Some(delay) = self.complete_delay {
            let due: Vec<EntityId> = self
                .created_at
                .iter()
                .filter(|(_, &(created, _))| self.tick >= created + delay)
                .map(|(&id, _)| id)
                .collect();
            for id in due {
                self.complete(id);
            }

            let finished: Vec<String> = self
                .researching
                .iter()
                .filter(|(_, &started)| self.tick >= started + delay)
                .map(|(tech, _)| tech.clone())
                .collect();
            for tech in finished {
                self.finish_research(&tech);
            }
        }
    }

    fn accept(&mut self, order: OrderId, producer: EntityId, action: &ActionDef, position: Option<TilePos>) {
        self.commands.push(MockCommand {
            order,
            producer,
            key: action.key.clone(),
            produces: action.produces.clone(),
            cost: action.cost,
            supply: action.supply,
            supply_provided: action.supply_provided,
            position,
            upgrade: action.is_upgrade(),
            accepted_tick: self.tick,
            resolved: false,
        });
    }
}

impl Environment for MockEnvironment {
    fn map_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn query_entities(&self, filter: &EntityFilter) -> Vec<EntityHandle> {
        self.entities
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    fn resource_balance(&self, kind: ResourceKind) -> i32 {
        self.balance.get(kind)
    }

    fn supply(&self) -> Supply {
        self.supply
    }

    fn issue_produce(&mut self, order: OrderId, producer: EntityId, action: &ActionDef) -> bool {
        if !self.accept_produce || !self.entities.contains_key(&producer) {
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
        if !self.accept_placement || !self.entities.contains_key(&producer) {
            return false;
        }
        self.accept(order, producer, action, Some(origin));
        true
    }

    fn validate_placement(&self, origin: TilePos, _action: &ActionDef, _producer: EntityId) -> bool {
        self.placement_valid && !self.tiles.contains(&origin)
    }

    fn build_location(&self, _action: &ActionDef, _producer: EntityId) -> Option<TilePos> {
        if self.locations.is_empty() {
            return None;
        }
        let placed = self.commands.iter().filter(|c| c.position.is_some()).count();
        Some(self.locations[placed % self.locations.len()])
    }

    fn poll_events(&mut self) -> Vec<EnvironmentEvent> {
        self.events.drain(..).collect()
    }
}
