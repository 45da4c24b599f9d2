//! The action catalog: validated, indexed action definitions.
//!
//! Built once from [`CatalogData`] and immutable for the session. Actions are
//! addressed by [`ActionId`], their declaration index, which also breaks
//! priority ties.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::{
    ActionCategory, ActionData, CatalogData, PriorityRule, ProducerCapability, Requirement,
};
use crate::error::{Result, SchedulerError};
use crate::grid::Footprint;
use crate::resources::ResourceCost;
use crate::world::EntityCounts;

/// Standard catalog shipped with the crate.
const STANDARD_CATALOG: &str = include_str!("../assets/data/catalog/standard.ron");

/// Index of an action in its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(pub u16);

impl ActionId {
    /// Position in the catalog's action list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A validated action definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    /// Declaration index.
    pub id: ActionId,
    /// Unique key.
    pub key: String,
    /// Display name (falls back to the key).
    pub name: String,
    /// Unit, building or upgrade.
    pub category: ActionCategory,
    /// Resources reserved on dispatch.
    pub cost: ResourceCost,
    /// Supply consumed.
    pub supply: i32,
    /// Supply provided on completion.
    pub supply_provided: i32,
    /// Entity kind or tech produced.
    pub produces: String,
    /// Who carries the action out.
    pub producer: ProducerCapability,
    /// Prerequisites.
    pub requires: Vec<Requirement>,
    /// Grid footprint, buildings only.
    pub footprint: Option<Footprint>,
    /// Priority rule.
    pub priority: PriorityRule,
    /// Earliest tick considered.
    pub not_before: u64,
    /// Minimum ticks between attempts.
    pub cooldown: u64,
    /// Build, train or research time in ticks.
    pub build_time: u32,
}

impl ActionDef {
    fn from_data(id: ActionId, data: ActionData) -> Self {
        let produces = data.produced_kind().to_string();
        let name = if data.name.is_empty() {
            data.key.clone()
        } else {
            data.name
        };
        Self {
            id,
            key: data.key,
            name,
            category: data.category,
            cost: data.cost,
            supply: data.supply,
            supply_provided: data.supply_provided,
            produces,
            producer: data.producer,
            requires: data.requires,
            footprint: data.footprint,
            priority: data.priority,
            not_before: data.not_before,
            cooldown: data.cooldown,
            build_time: data.build_time,
        }
    }

    /// True for actions placed on the grid.
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.category == ActionCategory::Building
    }

    /// True for upgrades.
    #[must_use]
    pub fn is_upgrade(&self) -> bool {
        self.category == ActionCategory::Upgrade
    }

    /// True if the produced unit provides supply.
    #[must_use]
    pub fn provides_supply(&self) -> bool {
        self.supply_provided > 0
    }

    /// Whether every prerequisite holds.
    #[must_use]
    pub fn prerequisites_met(&self, counts: &EntityCounts) -> bool {
        self.requires.iter().all(|r| r.is_met(counts))
    }
}

/// Immutable, indexed set of actions.
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    name: String,
    base_kinds: Vec<String>,
    actions: Vec<ActionDef>,
    by_key: HashMap<String, ActionId>,
}

impl ActionCatalog {
    /// Validate catalog data and index it.
    pub fn from_data(data: CatalogData) -> Result<Self> {
        let errors = data.validate();
        if !errors.is_empty() {
            return Err(SchedulerError::InvalidCatalog(errors.join("; ")));
        }

        let mut actions = Vec::with_capacity(data.actions.len());
        let mut by_key = HashMap::with_capacity(data.actions.len());
        for (index, action) in data.actions.into_iter().enumerate() {
            let id = ActionId(u16::try_from(index).map_err(|_| {
                SchedulerError::InvalidCatalog("too many actions".to_string())
            })?);
            by_key.insert(action.key.clone(), id);
            actions.push(ActionDef::from_data(id, action));
        }

        tracing::debug!(catalog = %data.name, actions = actions.len(), "catalog loaded");
        Ok(Self {
            name: data.name,
            base_kinds: data.base_kinds,
            actions,
            by_key,
        })
    }

    /// Parse and validate a catalog from RON.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let data: CatalogData = ron::from_str(source).map_err(|e| SchedulerError::DataParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::from_data(data)
    }

    /// Load and validate a catalog file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| SchedulerError::LoadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let data: CatalogData =
            ron::from_str(&contents).map_err(|e| SchedulerError::DataParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Self::from_data(data)
    }

    /// The built-in Terran-style opening catalog.
    pub fn standard() -> Result<Self> {
        Self::from_ron_str(STANDARD_CATALOG)
    }

    /// Catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kinds that exist without being produced by any action.
    #[must_use]
    pub fn base_kinds(&self) -> &[String] {
        &self.base_kinds
    }

    /// Action by id.
    #[must_use]
    pub fn get(&self, id: ActionId) -> Option<&ActionDef> {
        self.actions.get(id.index())
    }

    /// Action by key.
    #[must_use]
    pub fn by_key(&self, key: &str) -> Option<&ActionDef> {
        self.by_key.get(key).and_then(|&id| self.get(id))
    }

    /// Action id for a key.
    pub fn id_of(&self, key: &str) -> Result<ActionId> {
        self.by_key
            .get(key)
            .copied()
            .ok_or_else(|| SchedulerError::UnknownAction(key.to_string()))
    }

    /// Actions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ActionDef> {
        self.actions.iter()
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if the catalog has no actions (never, once validated).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Cost of an action.
    #[must_use]
    pub fn cost_of(&self, id: ActionId) -> Option<ResourceCost> {
        self.get(id).map(|a| a.cost)
    }

    /// Whether the action's prerequisites hold. Unknown actions never do.
    #[must_use]
    pub fn prerequisites_met(&self, id: ActionId, counts: &EntityCounts) -> bool {
        self.get(id).is_some_and(|a| a.prerequisites_met(counts))
    }

    /// Who can carry out the action.
    #[must_use]
    pub fn producer_capability(&self, id: ActionId) -> Option<&ProducerCapability> {
        self.get(id).map(|a| &a.producer)
    }

    /// Every entity kind the catalog knows, in a stable order.
    #[must_use]
    pub fn entity_kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self
            .base_kinds
            .iter()
            .map(String::as_str)
            .chain(self.actions.iter().filter(|a| !a.is_upgrade()).map(|a| a.produces.as_str()))
            .collect();
        kinds.sort_unstable();
        kinds.dedup();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_loads() {
        let catalog = ActionCatalog::standard().unwrap();
        assert_eq!(catalog.name(), "standard");

        let scv = catalog.by_key("scv").unwrap();
        assert_eq!(scv.cost, ResourceCost::new(50, 0));
        assert_eq!(scv.id, ActionId(0));

        let depot = catalog.by_key("supply_depot").unwrap();
        assert!(depot.is_building());
        assert!(depot.provides_supply());
        assert!(depot.footprint.is_some());

        let marine = catalog.by_key("marine").unwrap();
        assert!(!catalog.prerequisites_met(marine.id, &EntityCounts::default()));
        assert!(catalog.entity_kinds().contains(&"command_center"));
    }

    #[test]
    fn test_declaration_order_is_id_order() {
        let catalog = ActionCatalog::standard().unwrap();
        for (index, action) in catalog.iter().enumerate() {
            assert_eq!(action.id.index(), index);
            assert_eq!(catalog.id_of(&action.key).unwrap(), action.id);
        }
        assert!(matches!(
            catalog.id_of("battlecruiser"),
            Err(SchedulerError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_invalid_catalog_rejected() {
        let result = ActionCatalog::from_ron_str(
            r#"CatalogData(
                name: "broken",
                actions: [
                    ActionData(
                        key: "marine",
                        category: Unit,
                        producer: Building("barracks"),
                        priority: Constant(1.0),
                    ),
                ],
            )"#,
        );
        assert!(matches!(result, Err(SchedulerError::InvalidCatalog(_))));
    }

    #[test]
    fn test_parse_error_reported() {
        assert!(matches!(
            ActionCatalog::from_ron_str("CatalogData(name: )"),
            Err(SchedulerError::DataParseError { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.ron");
        std::fs::write(&path, STANDARD_CATALOG).unwrap();

        let catalog = ActionCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), ActionCatalog::standard().unwrap().len());
        assert!(matches!(
            ActionCatalog::load(dir.path().join("missing.ron")),
            Err(SchedulerError::LoadError { .. })
        ));
    }
}
