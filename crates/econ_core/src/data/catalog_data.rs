//! Catalog data combining every action definition for one ruleset.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::action_data::{ActionCategory, ActionData};

/// Complete catalog definition.
///
/// # Example RON
///
/// ```ron
/// CatalogData(
///     name: "standard",
///     description: "Terran opening",
///     base_kinds: ["command_center"],
///     actions: [...],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogData {
    /// Catalog name.
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Entity kinds that exist but are not produced by any action
    /// (starting town halls, neutral structures).
    #[serde(default)]
    pub base_kinds: Vec<String>,

    /// Actions in declaration order. Order breaks priority ties.
    pub actions: Vec<ActionData>,
}

impl CatalogData {
    /// Look up an action by key.
    #[must_use]
    pub fn get_action(&self, key: &str) -> Option<&ActionData> {
        self.actions.iter().find(|a| a.key == key)
    }

    /// Every entity kind the catalog knows: base kinds plus everything a
    /// unit or building action produces.
    #[must_use]
    pub fn known_kinds(&self) -> BTreeSet<&str> {
        self.base_kinds
            .iter()
            .map(String::as_str)
            .chain(
                self.actions
                    .iter()
                    .filter(|a| a.category != ActionCategory::Upgrade)
                    .map(ActionData::produced_kind),
            )
            .collect()
    }

    /// Every tech produced by an upgrade action.
    #[must_use]
    pub fn known_techs(&self) -> BTreeSet<&str> {
        self.actions
            .iter()
            .filter(|a| a.category == ActionCategory::Upgrade)
            .map(ActionData::produced_kind)
            .collect()
    }

    /// Validate cross-references in the catalog.
    ///
    /// Checks:
    /// - Action keys are unique and the catalog is not empty
    /// - Requirements and producer capabilities name known kinds or techs
    /// - Buildings carry a non-empty footprint, other actions none
    /// - Costs and supply are non-negative
    ///
    /// Returns a list of validation errors.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.actions.is_empty() {
            errors.push(format!("Catalog '{}' has no actions", self.name));
        }
        if self.actions.len() > usize::from(u16::MAX) {
            errors.push(format!("Catalog '{}' has too many actions", self.name));
        }

        let kinds = self.known_kinds();
        let techs = self.known_techs();
        let mut seen = BTreeSet::new();

        for action in &self.actions {
            if !seen.insert(action.key.as_str()) {
                errors.push(format!("Duplicate action key '{}'", action.key));
            }

            if !action.cost.is_non_negative() {
                errors.push(format!("Action '{}' has a negative cost", action.key));
            }
            if action.supply < 0 || action.supply_provided < 0 {
                errors.push(format!("Action '{}' has negative supply", action.key));
            }

            let producer = action.producer.kind();
            if !kinds.contains(producer) {
                errors.push(format!(
                    "Action '{}' produced by unknown kind '{}'",
                    action.key, producer
                ));
            }

            for requirement in &action.requires {
                let subject = requirement.subject();
                let known = match requirement {
                    super::Requirement::Researched(_) => techs.contains(subject),
                    _ => kinds.contains(subject),
                };
                if !known {
                    errors.push(format!(
                        "Action '{}' requires unknown '{}'",
                        action.key, subject
                    ));
                }
            }

            match (action.category, action.footprint) {
                (ActionCategory::Building, None) => {
                    errors.push(format!("Building '{}' has no footprint", action.key));
                }
                (ActionCategory::Building, Some(footprint)) if footprint.is_empty() => {
                    errors.push(format!("Building '{}' has an empty footprint", action.key));
                }
                (ActionCategory::Unit | ActionCategory::Upgrade, Some(_)) => {
                    errors.push(format!("Non-building '{}' has a footprint", action.key));
                }
                _ => {}
            }

            let worker_built = matches!(action.producer, super::ProducerCapability::Worker(_));
            if worker_built != (action.category == ActionCategory::Building) {
                errors.push(format!(
                    "Action '{}': buildings are placed by workers, units and upgrades come from buildings",
                    action.key
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PriorityRule, ProducerCapability, Requirement};
    use crate::grid::Footprint;
    use crate::math::Fixed;
    use crate::resources::ResourceCost;

    fn action(key: &str, category: ActionCategory, producer: ProducerCapability) -> ActionData {
        ActionData {
            key: key.to_string(),
            name: String::new(),
            category,
            cost: ResourceCost::new(50, 0),
            supply: 0,
            supply_provided: 0,
            produces: None,
            producer,
            requires: Vec::new(),
            footprint: (category == ActionCategory::Building).then(|| Footprint::new(2, 2)),
            priority: PriorityRule::Constant(Fixed::ONE),
            not_before: 0,
            cooldown: 0,
            build_time: 1,
        }
    }

    fn create_test_catalog_data() -> CatalogData {
        CatalogData {
            name: "test".to_string(),
            description: String::new(),
            base_kinds: vec!["command_center".to_string()],
            actions: vec![
                action(
                    "scv",
                    ActionCategory::Unit,
                    ProducerCapability::Building("command_center".to_string()),
                ),
                action(
                    "barracks",
                    ActionCategory::Building,
                    ProducerCapability::Worker("scv".to_string()),
                ),
                ActionData {
                    requires: vec![Requirement::Completed {
                        kind: "barracks".to_string(),
                        count: 1,
                    }],
                    ..action(
                        "marine",
                        ActionCategory::Unit,
                        ProducerCapability::Building("barracks".to_string()),
                    )
                },
            ],
        }
    }

    #[test]
    fn test_validate_valid_data() {
        let data = create_test_catalog_data();
        assert!(data.validate().is_empty(), "{:?}", data.validate());
        assert!(data.get_action("marine").is_some());
        assert!(data.known_kinds().contains("command_center"));
    }

    #[test]
    fn test_validate_invalid_reference() {
        let mut data = create_test_catalog_data();
        data.actions[2].requires.push(Requirement::Researched("stim".to_string()));
        data.actions[0].producer = ProducerCapability::Building("nexus".to_string());

        let errors = data.validate();
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("stim")));
        assert!(errors.iter().any(|e| e.contains("nexus")));
    }

    #[test]
    fn test_validate_structure() {
        let mut data = create_test_catalog_data();
        data.actions.push(data.actions[0].clone());
        data.actions[1].footprint = None;
        data.actions[2].cost = ResourceCost::new(-1, 0);

        let errors = data.validate();
        assert!(errors.iter().any(|e| e.contains("Duplicate")));
        assert!(errors.iter().any(|e| e.contains("no footprint")));
        assert!(errors.iter().any(|e| e.contains("negative cost")));
    }

    #[test]
    fn test_validate_empty() {
        let data = CatalogData {
            name: "empty".to_string(),
            description: String::new(),
            base_kinds: Vec::new(),
            actions: Vec::new(),
        };
        assert_eq!(data.validate().len(), 1);
    }
}
