//! The seam between the scheduler and the game engine.
//!
//! Everything the scheduler knows about the world arrives through
//! [`Environment`]: entity queries, balances, supply, command issuing and a
//! queue of [`EnvironmentEvent`]s drained between ticks. Implementations live
//! outside this crate (the headless sandbox, test mocks, a real engine
//! binding).

use serde::{Deserialize, Serialize};

use crate::catalog::ActionDef;
use crate::grid::TilePos;
use crate::orders::OrderId;
use crate::resources::{ResourceCost, ResourceKind};
use crate::world::Supply;

/// Engine-assigned entity identifier. Never reused within an episode.
pub type EntityId = u64;

/// What an entity is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activity {
    /// Doing nothing.
    Idle,
    /// Walking to or mining a resource patch, empty-handed.
    Gathering,
    /// Returning minerals to a depot.
    CarryingMinerals,
    /// Returning gas to a depot.
    CarryingGas,
    /// Building a structure.
    Constructing,
    /// Training a unit (producer buildings).
    Training,
    /// Researching an upgrade (producer buildings).
    Researching,
    /// Repairing.
    Repairing,
    /// In combat.
    Attacking,
    /// Moving with no other task.
    Moving,
}

impl Activity {
    /// Whether a worker doing this can be pulled off for construction.
    ///
    /// Workers mid-construction, carrying cargo, repairing or fighting keep
    /// their task.
    #[must_use]
    pub const fn is_available_worker(self) -> bool {
        matches!(self, Self::Idle | Self::Gathering | Self::Moving)
    }
}

/// A lightweight view of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityHandle {
    /// Entity identifier.
    pub id: EntityId,
    /// Entity kind key (matches catalog `produces`).
    pub kind: String,
    /// Tile the entity occupies (top-left for buildings).
    pub tile: TilePos,
    /// Current activity.
    pub activity: Activity,
    /// False while the entity is still under construction or training.
    pub completed: bool,
}

/// Filter passed to [`Environment::query_entities`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    /// Restrict to one kind.
    pub kind: Option<String>,
    /// Restrict by completion state.
    pub completed: Option<bool>,
    /// Restrict to these activities (empty means any).
    pub activities: Vec<Activity>,
}

impl EntityFilter {
    /// Match everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Match one kind in any state.
    #[must_use]
    pub fn of_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Restrict to completed entities.
    #[must_use]
    pub fn completed(mut self) -> Self {
        self.completed = Some(true);
        self
    }

    /// Restrict to the given activities.
    #[must_use]
    pub fn with_activities(mut self, activities: &[Activity]) -> Self {
        self.activities = activities.to_vec();
        self
    }

    /// True if `entity` passes the filter.
    #[must_use]
    pub fn matches(&self, entity: &EntityHandle) -> bool {
        self.kind.as_ref().map_or(true, |kind| *kind == entity.kind)
            && self.completed.map_or(true, |c| c == entity.completed)
            && (self.activities.is_empty() || self.activities.contains(&entity.activity))
    }
}

/// Notifications delivered by the environment between ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentEvent {
    /// A unit or building came into existence (in progress or complete).
    EntityCreated {
        /// The new entity.
        entity: EntityHandle,
        /// Order that produced it, when the environment tracks tokens.
        order: Option<OrderId>,
    },
    /// A previously created entity finished construction or training.
    EntityCompleted {
        /// The finished entity.
        entity: EntityHandle,
    },
    /// An entity was destroyed.
    EntityDestroyed {
        /// The destroyed entity, as last seen.
        entity: EntityHandle,
    },
    /// A producer started researching an upgrade (cost debited).
    ResearchStarted {
        /// Building doing the research.
        producer: EntityId,
        /// Tech key.
        tech: String,
        /// Order that started it, when known.
        order: Option<OrderId>,
    },
    /// An upgrade finished.
    ResearchCompleted {
        /// Tech key.
        tech: String,
    },
    /// The environment dropped or superseded an accepted order.
    OrderCancelled {
        /// The cancelled order.
        order: OrderId,
    },
}

/// Access to the game world.
///
/// Calls never block. `issue_*` returning `true` means the engine accepted the
/// command; the outcome arrives later as events.
pub trait Environment {
    /// Placement grid size in cells.
    fn map_size(&self) -> (u32, u32);

    /// Entities matching `filter`, in ascending id order.
    fn query_entities(&self, filter: &EntityFilter) -> Vec<EntityHandle>;

    /// Current balance of one resource.
    fn resource_balance(&self, kind: ResourceKind) -> i32;

    /// Current supply usage.
    fn supply(&self) -> Supply;

    /// Ask `producer` to train a unit or research an upgrade.
    fn issue_produce(&mut self, order: OrderId, producer: EntityId, action: &ActionDef) -> bool;

    /// Ask worker `producer` to construct a building at `origin`.
    fn issue_placement(
        &mut self,
        order: OrderId,
        producer: EntityId,
        action: &ActionDef,
        origin: TilePos,
    ) -> bool;

    /// Whether the engine considers `origin` buildable for `action`.
    fn validate_placement(&self, origin: TilePos, action: &ActionDef, producer: EntityId) -> bool;

    /// Propose a build location for `action` near `producer`.
    fn build_location(&self, action: &ActionDef, producer: EntityId) -> Option<TilePos>;

    /// Drain notifications queued since the last call.
    fn poll_events(&mut self) -> Vec<EnvironmentEvent>;

    /// Balances of every resource kind.
    fn balances(&self) -> ResourceCost {
        let mut cost = ResourceCost::ZERO;
        for kind in ResourceKind::ALL {
            cost.set(kind, self.resource_balance(kind));
        }
        cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scv(id: EntityId, activity: Activity) -> EntityHandle {
        EntityHandle {
            id,
            kind: "scv".to_string(),
            tile: TilePos::new(5, 5),
            activity,
            completed: true,
        }
    }

    #[test]
    fn test_worker_availability() {
        assert!(Activity::Gathering.is_available_worker());
        assert!(Activity::Idle.is_available_worker());
        assert!(!Activity::Constructing.is_available_worker());
        assert!(!Activity::CarryingMinerals.is_available_worker());
        assert!(!Activity::CarryingGas.is_available_worker());
        assert!(!Activity::Repairing.is_available_worker());
        assert!(!Activity::Attacking.is_available_worker());
    }

    #[test]
    fn test_filter_matching() {
        let gathering = scv(1, Activity::Gathering);
        let mut building = scv(2, Activity::Constructing);
        building.completed = false;

        assert!(EntityFilter::all().matches(&gathering));
        assert!(EntityFilter::of_kind("scv").matches(&gathering));
        assert!(!EntityFilter::of_kind("marine").matches(&gathering));
        assert!(!EntityFilter::of_kind("scv").completed().matches(&building));
        assert!(EntityFilter::of_kind("scv")
            .with_activities(&[Activity::Idle, Activity::Gathering])
            .matches(&gathering));
        assert!(!EntityFilter::all()
            .with_activities(&[Activity::Idle])
            .matches(&building));
    }
}
