//! Action data structures for data-driven production definitions.

use serde::{Deserialize, Serialize};

use crate::environment::EntityHandle;
use crate::grid::Footprint;
use crate::math::{decimal_serde, Fixed};
use crate::resources::ResourceCost;
use crate::world::EntityCounts;

/// What an action produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionCategory {
    /// Trained by a producer building.
    Unit,
    /// Placed on the grid by a worker.
    Building,
    /// Researched at a producer building.
    Upgrade,
}

/// Which entities may carry out an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProducerCapability {
    /// A completed worker of this kind that is not busy.
    Worker(String),
    /// A completed, idle building of this kind.
    Building(String),
}

impl ProducerCapability {
    /// Entity kind the capability names.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Worker(kind) | Self::Building(kind) => kind,
        }
    }

    /// Whether `entity` can take an order right now.
    #[must_use]
    pub fn accepts(&self, entity: &EntityHandle) -> bool {
        if !entity.completed || entity.kind != self.kind() {
            return false;
        }
        match self {
            Self::Worker(_) => entity.activity.is_available_worker(),
            Self::Building(_) => entity.activity == crate::environment::Activity::Idle,
        }
    }
}

/// A prerequisite predicate over entity counts and techs.
///
/// # Example RON
///
/// ```ron
/// requires: [
///     Completed(kind: "barracks", count: 1),
///     Researched("stim_pack"),
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requirement {
    /// At least `count` finished entities of `kind`.
    Completed {
        /// Entity kind.
        kind: String,
        /// Minimum count.
        #[serde(default = "default_count")]
        count: u32,
    },
    /// At least `count` entities of `kind`, finished or in progress.
    Exists {
        /// Entity kind.
        kind: String,
        /// Minimum count.
        #[serde(default = "default_count")]
        count: u32,
    },
    /// The upgrade has finished.
    Researched(String),
}

const fn default_count() -> u32 {
    1
}

impl Requirement {
    /// Evaluate against current counts. Never looks at resources.
    #[must_use]
    pub fn is_met(&self, counts: &EntityCounts) -> bool {
        match self {
            Self::Completed { kind, count } => counts.completed(kind) >= *count,
            Self::Exists { kind, count } => counts.total(kind) >= *count,
            Self::Researched(tech) => counts.has_tech(tech),
        }
    }

    /// Entity kind or tech the requirement refers to.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::Completed { kind, .. } | Self::Exists { kind, .. } => kind,
            Self::Researched(tech) => tech,
        }
    }
}

/// How an action's priority is computed each tick.
///
/// Values are written as decimals in RON and converted to fixed point on
/// load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriorityRule {
    /// Always the same priority.
    Constant(#[serde(with = "decimal_serde")] Fixed),

    /// Scales with supply utilization.
    ///
    /// `critical * used / total / threshold`, so the action turns critical
    /// once utilization reaches the configured threshold. Zero below
    /// `cut_in`, at the supply cap, or with `max_in_flight` providers already
    /// pending or under construction.
    SupplyPressure {
        /// Providers allowed in flight at once.
        max_in_flight: u32,
        /// Utilization below which the action is not wanted.
        #[serde(default = "default_cut_in", with = "decimal_serde")]
        cut_in: Fixed,
    },

    /// `value` until `target` instances exist or are planned.
    SoftCap {
        /// Desired count (completed + in progress + pending).
        target: u32,
        /// Priority while below target.
        #[serde(with = "decimal_serde")]
        value: Fixed,
    },

    /// `value` until one instance exists, is pending, or (for upgrades) is
    /// researched or underway.
    Unlock {
        /// Priority while locked.
        #[serde(with = "decimal_serde")]
        value: Fixed,
    },

    /// `value` while free minerals exceed `minerals_above`.
    Surplus {
        /// Free mineral threshold.
        minerals_above: i32,
        /// Priority while above threshold.
        #[serde(with = "decimal_serde")]
        value: Fixed,
    },
}

fn default_cut_in() -> Fixed {
    Fixed::from_bits(0x8000_0000) // 0.5
}

/// Data-driven production action.
///
/// # Example RON
///
/// ```ron
/// ActionData(
///     key: "marine",
///     name: "Marine",
///     category: Unit,
///     cost: (minerals: 50),
///     supply: 1,
///     producer: Building("barracks"),
///     requires: [Completed(kind: "barracks", count: 1)],
///     priority: Constant(2.0),
///     build_time: 24,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionData {
    /// Unique key, referenced from other definitions.
    pub key: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Unit, building or upgrade.
    pub category: ActionCategory,

    /// Resources debited when the action starts.
    #[serde(default)]
    pub cost: ResourceCost,

    /// Supply consumed by the produced unit.
    #[serde(default)]
    pub supply: i32,

    /// Supply provided once the produced building completes.
    #[serde(default)]
    pub supply_provided: i32,

    /// Entity kind or tech produced. Defaults to `key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produces: Option<String>,

    /// Who carries the action out.
    pub producer: ProducerCapability,

    /// Prerequisites, all of which must hold.
    #[serde(default)]
    pub requires: Vec<Requirement>,

    /// Grid footprint (buildings only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footprint: Option<Footprint>,

    /// Priority rule.
    pub priority: PriorityRule,

    /// Earliest tick at which the action is considered.
    #[serde(default)]
    pub not_before: u64,

    /// Minimum ticks between two attempts.
    #[serde(default)]
    pub cooldown: u64,

    /// Construction, training or research time in ticks.
    #[serde(default = "default_build_time")]
    pub build_time: u32,
}

const fn default_build_time() -> u32 {
    1
}

impl ActionData {
    /// Entity kind or tech produced.
    #[must_use]
    pub fn produced_kind(&self) -> &str {
        self.produces.as_deref().unwrap_or(&self.key)
    }
}
