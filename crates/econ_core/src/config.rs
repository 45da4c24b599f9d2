//! Scheduler configuration.
//!
//! Loaded from RON. Every field has a default, so a config file only needs
//! to mention what it changes:
//!
//! ```ron
//! SchedulerConfig(
//!     reconcile_period: 100,
//!     max_dispatches_per_tick: 2,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::math::{decimal_serde, Fixed};
use crate::resources::ResourceCost;

/// What the ledger does when asked to release more than it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnderflowPolicy {
    /// Refuse the release and report [`SchedulerError::ReservationUnderflow`].
    Strict,
    /// Clamp to the floor and log at error level.
    Clamp,
}

impl Default for UnderflowPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Strict
        } else {
            Self::Clamp
        }
    }
}

/// Tunables for one scheduling session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Standing reservation held for the whole session.
    pub reserve_floor: ResourceCost,
    /// Ticks between full reconciliations against the environment.
    pub reconcile_period: u64,
    /// Age in ticks after which an unresolved order is force-abandoned.
    pub order_timeout: u64,
    /// Maximum commands issued in one tick.
    pub max_dispatches_per_tick: usize,
    /// Producers tried when looking for a valid building location.
    pub max_placement_attempts: usize,
    /// Cells claimed around every building footprint.
    pub placement_margin: u32,
    /// Unbuildable ring at the map edge, in cells.
    pub placement_border: u32,
    /// Priority at or above which an action is critical.
    #[serde(with = "decimal_serde")]
    pub critical_priority: Fixed,
    /// Supply utilization at which supply providers become critical.
    #[serde(with = "decimal_serde")]
    pub supply_threshold: Fixed,
    /// Supply cap; supply providers are pointless beyond it.
    pub max_supply: i32,
    /// Ledger over-release handling.
    pub underflow_policy: UnderflowPolicy,
    /// Resolved orders kept for diagnostics.
    pub history_len: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reserve_floor: ResourceCost::new(400, 0),
            reconcile_period: 200,
            order_timeout: 720,
            max_dispatches_per_tick: 4,
            max_placement_attempts: 3,
            placement_margin: 1,
            placement_border: 1,
            critical_priority: Fixed::from_num(5),
            supply_threshold: Fixed::from_bits(0xCCCC_CCCD), // 0.8
            max_supply: 200,
            underflow_policy: UnderflowPolicy::default(),
            history_len: 64,
        }
    }
}

impl SchedulerConfig {
    /// Parse a config from a RON string.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| SchedulerError::DataParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load and validate a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| SchedulerError::LoadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = ron::from_str(&contents).map_err(|e| SchedulerError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the config describes a usable scheduler.
    pub fn validate(&self) -> Result<()> {
        if !self.reserve_floor.is_non_negative() {
            return Err(SchedulerError::InvalidConfig(
                "reserve_floor must not be negative".to_string(),
            ));
        }
        if self.reconcile_period == 0 {
            return Err(SchedulerError::InvalidConfig(
                "reconcile_period must be positive".to_string(),
            ));
        }
        if self.order_timeout == 0 {
            return Err(SchedulerError::InvalidConfig(
                "order_timeout must be positive".to_string(),
            ));
        }
        if self.max_dispatches_per_tick == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_dispatches_per_tick must be positive".to_string(),
            ));
        }
        if self.max_placement_attempts == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_placement_attempts must be positive".to_string(),
            ));
        }
        if self.placement_border == 0 {
            return Err(SchedulerError::InvalidConfig(
                "placement_border must be at least 1".to_string(),
            ));
        }
        if self.critical_priority <= Fixed::ZERO || self.supply_threshold <= Fixed::ZERO {
            return Err(SchedulerError::InvalidConfig(
                "critical_priority and supply_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reserve_floor, ResourceCost::new(400, 0));
        assert_eq!(config.reconcile_period, 200);
        assert!((config.supply_threshold.to_num::<f64>() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_zero_border_rejected() {
        let config = SchedulerConfig {
            placement_border: 0,
            placement_margin: 0,
            ..SchedulerConfig::default()
        };
        assert!(matches!(config.validate(), Err(SchedulerError::InvalidConfig(_))));

        let from_ron = SchedulerConfig::from_ron_str("(placement_border: 0)").unwrap();
        assert!(from_ron.validate().is_err());
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = SchedulerConfig::from_ron_str(
            "(reconcile_period: 50, critical_priority: 7.5, underflow_policy: Clamp)",
        )
        .unwrap();

        assert_eq!(config.reconcile_period, 50);
        assert_eq!(config.critical_priority, Fixed::from_num(7.5));
        assert_eq!(config.underflow_policy, UnderflowPolicy::Clamp);
        assert_eq!(config.order_timeout, 720);
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let config = SchedulerConfig {
            max_dispatches_per_tick: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.ron");
        std::fs::write(&path, "SchedulerConfig(order_timeout: 0)").unwrap();

        assert!(matches!(
            SchedulerConfig::load(&path),
            Err(SchedulerError::InvalidConfig(_))
        ));
        assert!(matches!(
            SchedulerConfig::load(dir.path().join("missing.ron")),
            Err(SchedulerError::LoadError { .. })
        ));
    }
}
