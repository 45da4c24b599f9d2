//! Per-tick priority evaluation.
//!
//! Every action whose prerequisites hold gets a fixed-point priority from its
//! [`PriorityRule`]. Zero means "not wanted this tick" and drops the action;
//! anything at or above the critical threshold is attempted first.

use serde::{Deserialize, Serialize};

use crate::catalog::{ActionCatalog, ActionDef, ActionId};
use crate::config::SchedulerConfig;
use crate::data::PriorityRule;
use crate::math::{fixed_serde, Fixed};
use crate::world::WorldSnapshot;

/// Coarse urgency band derived from a priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityTier {
    /// Zero priority: not desired.
    None,
    /// Positive but below the critical threshold.
    Useful,
    /// At or above the critical threshold.
    Critical,
}

/// An action worth attempting this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Action to attempt.
    pub action: ActionId,
    /// Its priority.
    #[serde(with = "fixed_serde")]
    pub priority: Fixed,
    /// Urgency band.
    pub tier: PriorityTier,
}

/// Scores catalog actions against a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityEvaluator {
    critical: Fixed,
    supply_threshold: Fixed,
    max_supply: i32,
}

impl PriorityEvaluator {
    /// Create an evaluator.
    #[must_use]
    pub const fn new(critical: Fixed, supply_threshold: Fixed, max_supply: i32) -> Self {
        Self {
            critical,
            supply_threshold,
            max_supply,
        }
    }

    /// Create an evaluator with the thresholds from `config`.
    #[must_use]
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(
            config.critical_priority,
            config.supply_threshold,
            config.max_supply,
        )
    }

    /// Tier of a priority value.
    #[must_use]
    pub fn tier(&self, priority: Fixed) -> PriorityTier {
        if priority <= Fixed::ZERO {
            PriorityTier::None
        } else if priority >= self.critical {
            PriorityTier::Critical
        } else {
            PriorityTier::Useful
        }
    }

    /// Priority of one action, ignoring prerequisites. Never negative.
    #[must_use]
    pub fn score(&self, action: &ActionDef, snapshot: &WorldSnapshot) -> Fixed {
        if snapshot.tick < action.not_before {
            return Fixed::ZERO;
        }
        if action.supply > 0 && snapshot.supply.used + action.supply > snapshot.supply.total {
            return Fixed::ZERO;
        }

        let kind = action.produces.as_str();
        let value = match &action.priority {
            PriorityRule::Constant(value) => *value,

            PriorityRule::SupplyPressure {
                max_in_flight,
                cut_in,
            } => {
                if snapshot.supply.total >= self.max_supply
                    || snapshot.in_flight(kind) >= *max_in_flight
                {
                    Fixed::ZERO
                } else {
                    // No supply at all is as bad as being capped
                    let utilization = snapshot.supply.ratio().unwrap_or(Fixed::ONE);
                    if utilization < *cut_in {
                        Fixed::ZERO
                    } else {
                        self.critical
                            .saturating_mul(utilization)
                            .checked_div(self.supply_threshold)
                            .unwrap_or(Fixed::MAX)
                    }
                }
            }

            PriorityRule::SoftCap { target, value } => {
                if snapshot.planned(kind) < *target {
                    *value
                } else {
                    Fixed::ZERO
                }
            }

            PriorityRule::Unlock { value } => {
                let unlocked = if action.is_upgrade() {
                    snapshot.counts.tech_started(kind) || snapshot.pending(kind) > 0
                } else {
                    snapshot.planned(kind) > 0
                };
                if unlocked {
                    Fixed::ZERO
                } else {
                    *value
                }
            }

            PriorityRule::Surplus {
                minerals_above,
                value,
            } => {
                if snapshot.free.minerals > *minerals_above {
                    *value
                } else {
                    Fixed::ZERO
                }
            }
        };

        value.max(Fixed::ZERO)
    }

    /// Candidates for this tick, highest priority first.
    ///
    /// Actions with unmet prerequisites or zero priority are dropped. Equal
    /// priorities keep catalog declaration order.
    #[must_use]
    pub fn evaluate(&self, catalog: &ActionCatalog, snapshot: &WorldSnapshot) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = catalog
            .iter()
            .filter(|action| action.prerequisites_met(&snapshot.counts))
            .filter_map(|action| {
                let priority = self.score(action, snapshot);
                match self.tier(priority) {
                    PriorityTier::None => None,
                    tier => Some(Candidate {
                        action: action.id,
                        priority,
                        tier,
                    }),
                }
            })
            .collect();

        // Stable: ties stay in declaration order
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        candidates
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::resources::ResourceCost;
    use crate::world::{EntityCounts, Supply};

    fn evaluator() -> PriorityEvaluator {
        PriorityEvaluator::from_config(&SchedulerConfig::default())
    }

    fn snapshot(supply: Supply) -> WorldSnapshot {
        let mut counts = EntityCounts::default();
        counts.completed.insert("command_center".to_string(), 1);
        counts.completed.insert("scv".to_string(), 4);
        WorldSnapshot {
            tick: 1,
            available: ResourceCost::new(1000, 0),
            free: ResourceCost::new(600, 0),
            supply,
            counts,
            pending: BTreeMap::new(),
        }
    }

    fn catalog() -> ActionCatalog {
        ActionCatalog::standard().unwrap()
    }

    #[test]
    fn test_tiers() {
        let eval = evaluator();
        assert_eq!(eval.tier(Fixed::ZERO), PriorityTier::None);
        assert_eq!(eval.tier(Fixed::from_num(2)), PriorityTier::Useful);
        assert_eq!(eval.tier(Fixed::from_num(5)), PriorityTier::Critical);
    }

    #[test]
    fn test_supply_pressure_turns_critical() {
        let catalog = catalog();
        let depot = catalog.by_key("supply_depot").unwrap();
        let eval = evaluator();

        // Below the cut-in: not wanted
        assert_eq!(eval.score(depot, &snapshot(Supply::new(5, 10))), Fixed::ZERO);
        // At the threshold: exactly critical
        let at_threshold = eval.score(depot, &snapshot(Supply::new(8, 10)));
        assert_eq!(eval.tier(at_threshold), PriorityTier::Critical);
        // Between cut-in and threshold: useful
        let near = eval.score(depot, &snapshot(Supply::new(78, 100)));
        assert_eq!(eval.tier(near), PriorityTier::Useful);
    }

    #[test]
    fn test_supply_pressure_limits() {
        let catalog = catalog();
        let depot = catalog.by_key("supply_depot").unwrap();
        let eval = evaluator();

        let mut s = snapshot(Supply::new(9, 10));
        s.pending.insert("supply_depot".to_string(), 1);
        s.counts.in_progress.insert("supply_depot".to_string(), 1);
        assert_eq!(eval.score(depot, &s), Fixed::ZERO);

        s.pending.clear();
        assert!(eval.score(depot, &s) > Fixed::ZERO);

        // At the supply cap
        assert_eq!(eval.score(depot, &snapshot(Supply::new(200, 200))), Fixed::ZERO);
    }

    #[test]
    fn test_soft_cap_counts_pending() {
        let catalog = catalog();
        let scv = catalog.by_key("scv").unwrap();
        let eval = evaluator();

        let mut s = snapshot(Supply::new(4, 10));
        assert_eq!(eval.score(scv, &s), Fixed::from_num(3));

        s.counts.completed.insert("scv".to_string(), 16);
        s.counts.in_progress.insert("scv".to_string(), 1);
        s.pending.insert("scv".to_string(), 1);
        assert_eq!(eval.score(scv, &s), Fixed::ZERO);
    }

    #[test]
    fn test_supply_cost_gating() {
        let catalog = catalog();
        let scv = catalog.by_key("scv").unwrap();
        assert_eq!(evaluator().score(scv, &snapshot(Supply::new(10, 10))), Fixed::ZERO);
    }

    #[test]
    fn test_unlock_and_not_before() {
        let catalog = catalog();
        let academy = catalog.by_key("academy").unwrap();
        let stim = catalog.by_key("stim_packs").unwrap();
        let eval = evaluator();

        let mut s = snapshot(Supply::new(4, 10));
        assert_eq!(eval.score(academy, &s), Fixed::ZERO);
        s.tick = 600;
        assert_eq!(eval.score(academy, &s), Fixed::from_num(1.5));
        s.pending.insert("academy".to_string(), 1);
        assert_eq!(eval.score(academy, &s), Fixed::ZERO);

        assert_eq!(eval.score(stim, &s), Fixed::from_num(4));
        s.counts.start_research("stim_packs");
        assert_eq!(eval.score(stim, &s), Fixed::ZERO);
    }

    #[test]
    fn test_surplus() {
        let catalog = catalog();
        let turret = catalog.by_key("missile_turret").unwrap();
        let eval = evaluator();

        let mut s = snapshot(Supply::new(4, 10));
        assert!(eval.score(turret, &s) > Fixed::ZERO);
        s.free = ResourceCost::new(300, 0);
        assert_eq!(eval.score(turret, &s), Fixed::ZERO);
    }

    #[test]
    fn test_evaluate_orders_and_filters() {
        let catalog = catalog();
        let eval = evaluator();
        let mut s = snapshot(Supply::new(9, 10));

        let keys = |candidates: Vec<Candidate>| -> Vec<String> {
            candidates
                .iter()
                .map(|c| catalog.get(c.action).unwrap().key.clone())
                .collect()
        };

        // Depot critical, then scv (3.0), then barracks (2.5). Marines need a
        // completed barracks.
        assert_eq!(
            keys(eval.evaluate(&catalog, &s)),
            vec!["supply_depot", "scv", "barracks"]
        );

        s.counts.completed.insert("barracks".to_string(), 1);
        let candidates = eval.evaluate(&catalog, &s);
        assert_eq!(candidates[0].tier, PriorityTier::Critical);
        assert!(keys(candidates).contains(&"marine".to_string()));
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let catalog = ActionCatalog::from_ron_str(
            r#"CatalogData(
                name: "ties",
                base_kinds: ["hall"],
                actions: [
                    ActionData(key: "b", category: Unit, producer: Building("hall"), priority: Constant(1.0)),
                    ActionData(key: "a", category: Unit, producer: Building("hall"), priority: Constant(1.0)),
                    ActionData(key: "c", category: Unit, producer: Building("hall"), priority: Constant(2.0)),
                ],
            )"#,
        )
        .unwrap();
        let order: Vec<u16> = evaluator()
            .evaluate(&catalog, &snapshot(Supply::new(0, 10)))
            .iter()
            .map(|c| c.action.0)
            .collect();
        assert_eq!(order, vec![2, 0, 1]);
    }
}
