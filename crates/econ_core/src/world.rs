//! Derived world state the scheduler evaluates against.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::environment::EntityHandle;
use crate::math::{ratio, Fixed};
use crate::resources::ResourceCost;

/// Supply used and provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Supply {
    /// Supply consumed by existing and queued units.
    pub used: i32,
    /// Supply provided by completed buildings.
    pub total: i32,
}

impl Supply {
    /// Create a supply reading.
    #[must_use]
    pub const fn new(used: i32, total: i32) -> Self {
        Self { used, total }
    }

    /// Unused supply (may be negative if the engine over-committed).
    #[must_use]
    pub const fn free(&self) -> i32 {
        self.total - self.used
    }

    /// `used / total`, or `None` with no supply at all.
    #[must_use]
    pub fn ratio(&self) -> Option<Fixed> {
        ratio(self.used, self.total)
    }
}

/// Completed / in-progress counts per kind plus researched techs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    /// Finished entities per kind.
    pub completed: BTreeMap<String, u32>,
    /// Entities that exist but are still being built or trained.
    pub in_progress: BTreeMap<String, u32>,
    /// Upgrades currently being researched.
    pub researching: BTreeSet<String>,
    /// Upgrades finished.
    pub techs: BTreeSet<String>,
}

impl EntityCounts {
    /// Completed count of `kind`.
    #[must_use]
    pub fn completed(&self, kind: &str) -> u32 {
        self.completed.get(kind).copied().unwrap_or(0)
    }

    /// In-progress count of `kind`.
    #[must_use]
    pub fn in_progress(&self, kind: &str) -> u32 {
        self.in_progress.get(kind).copied().unwrap_or(0)
    }

    /// Completed plus in-progress count of `kind`.
    #[must_use]
    pub fn total(&self, kind: &str) -> u32 {
        self.completed(kind) + self.in_progress(kind)
    }

    /// True if the upgrade is finished.
    #[must_use]
    pub fn has_tech(&self, tech: &str) -> bool {
        self.techs.contains(tech)
    }

    /// True if the upgrade is finished or underway.
    #[must_use]
    pub fn tech_started(&self, tech: &str) -> bool {
        self.techs.contains(tech) || self.researching.contains(tech)
    }

    /// Count a newly created entity.
    pub fn add(&mut self, entity: &EntityHandle) {
        let map = if entity.completed {
            &mut self.completed
        } else {
            &mut self.in_progress
        };
        *map.entry(entity.kind.clone()).or_insert(0) += 1;
    }

    /// Move one entity of `kind` from in-progress to completed.
    ///
    /// Completion of an entity we never saw created is counted directly.
    pub fn complete(&mut self, kind: &str) {
        decrement(&mut self.in_progress, kind);
        *self.completed.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// Forget a destroyed entity.
    pub fn remove(&mut self, entity: &EntityHandle) {
        let map = if entity.completed {
            &mut self.completed
        } else {
            &mut self.in_progress
        };
        decrement(map, &entity.kind);
    }

    /// Mark an upgrade as underway.
    pub fn start_research(&mut self, tech: &str) {
        if !self.techs.contains(tech) {
            self.researching.insert(tech.to_string());
        }
    }

    /// Mark an upgrade as finished.
    pub fn finish_research(&mut self, tech: &str) {
        self.researching.remove(tech);
        self.techs.insert(tech.to_string());
    }

    /// Rebuild entity counts from ground truth.
    ///
    /// Tech state is not observable through entity queries and is kept.
    pub fn recount(&mut self, entities: &[EntityHandle]) {
        self.completed.clear();
        self.in_progress.clear();
        for entity in entities {
            self.add(entity);
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn decrement(map: &mut BTreeMap<String, u32>, kind: &str) {
    if let Some(count) = map.get_mut(kind) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            map.remove(kind);
        }
    }
}

/// Everything the priority evaluator looks at for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Current tick.
    pub tick: u64,
    /// Environment balances.
    pub available: ResourceCost,
    /// Ledger free balances.
    pub free: ResourceCost,
    /// Supply reading.
    pub supply: Supply,
    /// Entity and tech counts.
    pub counts: EntityCounts,
    /// Dispatched-but-unconfirmed orders per produced kind.
    pub pending: BTreeMap<String, u32>,
}

impl WorldSnapshot {
    /// Pending orders producing `kind`.
    #[must_use]
    pub fn pending(&self, kind: &str) -> u32 {
        self.pending.get(kind).copied().unwrap_or(0)
    }

    /// Completed, in-progress and pending instances of `kind`.
    #[must_use]
    pub fn planned(&self, kind: &str) -> u32 {
        self.counts.total(kind) + self.pending(kind)
    }

    /// In-progress and pending instances of `kind`.
    #[must_use]
    pub fn in_flight(&self, kind: &str) -> u32 {
        self.counts.in_progress(kind) + self.pending(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Activity;
    use crate::grid::TilePos;

    fn entity(id: u64, kind: &str, completed: bool) -> EntityHandle {
        EntityHandle {
            id,
            kind: kind.to_string(),
            tile: TilePos::new(0, 0),
            activity: Activity::Idle,
            completed,
        }
    }

    #[test]
    fn test_supply_ratio() {
        assert_eq!(Supply::new(8, 10).ratio(), Some(Fixed::from_num(0.8)));
        assert_eq!(Supply::new(0, 0).ratio(), None);
        assert_eq!(Supply::new(12, 10).free(), -2);
    }

    #[test]
    fn test_counts_lifecycle() {
        let mut counts = EntityCounts::default();
        counts.add(&entity(1, "barracks", false));
        assert_eq!(counts.in_progress("barracks"), 1);
        assert_eq!(counts.completed("barracks"), 0);

        counts.complete("barracks");
        assert_eq!(counts.in_progress("barracks"), 0);
        assert_eq!(counts.completed("barracks"), 1);
        assert_eq!(counts.total("barracks"), 1);

        counts.remove(&entity(1, "barracks", true));
        assert_eq!(counts.total("barracks"), 0);
        assert!(counts.completed.is_empty());

        // Removing something that was never counted stays at zero
        counts.remove(&entity(2, "barracks", true));
        assert_eq!(counts.total("barracks"), 0);
    }

    #[test]
    fn test_recount_keeps_techs() {
        let mut counts = EntityCounts::default();
        counts.start_research("stim");
        counts.finish_research("stim");
        counts.add(&entity(9, "marine", true));

        counts.recount(&[entity(1, "scv", true), entity(2, "scv", true), entity(3, "supply_depot", false)]);
        assert_eq!(counts.completed("scv"), 2);
        assert_eq!(counts.in_progress("supply_depot"), 1);
        assert_eq!(counts.total("marine"), 0);
        assert!(counts.has_tech("stim"));
        assert!(counts.researching.is_empty());
    }

    #[test]
    fn test_snapshot_planned_counts() {
        let mut counts = EntityCounts::default();
        counts.add(&entity(1, "supply_depot", true));
        counts.add(&entity(2, "supply_depot", false));
        let snapshot = WorldSnapshot {
            tick: 1,
            available: ResourceCost::ZERO,
            free: ResourceCost::ZERO,
            supply: Supply::default(),
            counts,
            pending: BTreeMap::from([("supply_depot".to_string(), 1)]),
        };

        assert_eq!(snapshot.planned("supply_depot"), 3);
        assert_eq!(snapshot.in_flight("supply_depot"), 2);
        assert_eq!(snapshot.pending("barracks"), 0);
    }
}
