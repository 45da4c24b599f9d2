//! JSON-lines output of a headless run.
//!
//! Every record is one JSON object per line on stdout:
//!
//! ```text
//! <- {"type":"ready","version":"1.0","catalog":"standard","seed":7}
//! <- {"type":"dispatch","tick":1,"order":1,"key":"scv","producer":1,...}
//! <- {"type":"ledger","tick":100,"available":{"minerals":210,"gas":0},...}
//! <- {"type":"summary","report":{...}}
//! ```
//!
//! Logs go to stderr so the stream stays machine readable.

use econ_core::ledger::LedgerSnapshot;
use econ_core::resources::ResourceCost;
use econ_core::scheduler::IssuedCommand;
use econ_core::world::Supply;
use serde::{Deserialize, Serialize};

use crate::runner::EpisodeReport;

/// Protocol version reported in the ready record.
pub const PROTOCOL_VERSION: &str = "1.0";

/// One line of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    /// Run is starting.
    Ready {
        version: String,
        catalog: String,
        seed: u64,
    },

    /// A command was accepted.
    Dispatch {
        tick: u64,
        order: u64,
        key: String,
        producer: u64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        x: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        y: Option<i32>,
        cost: ResourceCost,
    },

    /// Periodic ledger snapshot.
    Ledger {
        tick: u64,
        available: ResourceCost,
        reserved: ResourceCost,
        free: ResourceCost,
        pending: usize,
        supply: Supply,
    },

    /// Run finished.
    Summary { report: EpisodeReport },
}

impl Record {
    /// Create a ready record.
    pub fn ready(catalog: &str, seed: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            catalog: catalog.to_string(),
            seed,
        }
    }

    /// Record for an issued command.
    pub fn dispatch(command: &IssuedCommand) -> Self {
        Self::Dispatch {
            tick: command.tick,
            order: command.order.0,
            key: command.key.clone(),
            producer: command.producer,
            x: command.position.map(|p| p.x),
            y: command.position.map(|p| p.y),
            cost: command.cost,
        }
    }

    /// Record for a ledger snapshot.
    pub fn ledger(tick: u64, snapshot: LedgerSnapshot, pending: usize, supply: Supply) -> Self {
        Self::Ledger {
            tick,
            available: snapshot.available,
            reserved: snapshot.reserved,
            free: snapshot.free,
            pending,
            supply,
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }

    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use econ_core::catalog::ActionId;
    use econ_core::grid::TilePos;
    use econ_core::orders::OrderId;

    #[test]
    fn test_dispatch_line() {
        let command = IssuedCommand {
            tick: 12,
            order: OrderId(3),
            action: ActionId(2),
            key: "barracks".to_string(),
            producer: 4,
            position: Some(TilePos::new(10, 10)),
            cost: ResourceCost::new(150, 0),
        };
        let line = Record::dispatch(&command).to_json_line();
        assert!(line.ends_with('\n'));
        assert!(line.contains(r#""type":"dispatch""#));
        assert!(line.contains(r#""x":10"#));
        assert!(line.contains(r#""minerals":150"#));
    }

    #[test]
    fn test_unit_dispatch_omits_position() {
        let command = IssuedCommand {
            tick: 1,
            order: OrderId(1),
            action: ActionId(0),
            key: "scv".to_string(),
            producer: 1,
            position: None,
            cost: ResourceCost::new(50, 0),
        };
        let line = Record::dispatch(&command).to_json_line();
        assert!(!line.contains(r#""x""#));
        assert_eq!(Record::from_json(line.trim()).unwrap(), Record::dispatch(&command));
    }

    #[test]
    fn test_ready_line() {
        let line = Record::ready("standard", 7).to_json_line();
        assert!(line.contains(r#""version":"1.0""#));
        assert!(line.contains(r#""seed":7"#));
    }
}
