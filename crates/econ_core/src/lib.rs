//! # Econ Core
//!
//! Real-time build-order scheduler for a two-resource economy.
//!
//! This crate contains **only** deterministic scheduling logic:
//! - No rendering
//! - No game engine (reached through the [`environment::Environment`] trait)
//! - No system randomness
//! - No floating-point math in decisions (priorities are fixed-point)
//!
//! Each tick the [`scheduler::Scheduler`] evaluates a data-driven
//! [`catalog::ActionCatalog`], dispatches a bounded number of production
//! commands and reserves their cost in a [`ledger::ResourceLedger`] (and their
//! footprint in a [`grid::ReservationGrid`]) until the environment reports the
//! outcome. Reservations are never double-counted and never leak: every
//! in-flight order is eventually confirmed, abandoned, or force-abandoned by
//! periodic reconciliation.
//!
//! ## Crate Structure
//!
//! - [`ledger`] - Available vs. reserved resource bookkeeping
//! - [`grid`] - Provisional building footprint claims
//! - [`catalog`] / [`data`] - Action definitions loaded from RON
//! - [`priority`] - Per-tick candidate scoring and ordering
//! - [`scheduler`] - The tick loop and dispatch
//! - [`reconcile`] - Event handlers and periodic reconciliation
//! - [`replay`] - Dispatch log recording for determinism checks

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod data;
pub mod environment;
pub mod error;
pub mod grid;
pub mod ledger;
pub mod math;
pub mod orders;
pub mod priority;
pub mod reconcile;
pub mod replay;
pub mod resources;
pub mod scheduler;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{ActionCatalog, ActionDef, ActionId};
    pub use crate::config::{SchedulerConfig, UnderflowPolicy};
    pub use crate::data::{ActionCategory, PriorityRule, ProducerCapability, Requirement};
    pub use crate::environment::{
        Activity, EntityFilter, EntityHandle, EntityId, Environment, EnvironmentEvent,
    };
    pub use crate::error::{Result, SchedulerError};
    pub use crate::grid::{Footprint, ReservationGrid, TilePos};
    pub use crate::ledger::{LedgerSnapshot, ResourceLedger};
    pub use crate::math::Fixed;
    pub use crate::orders::{AbandonReason, OrderId, OrderStatus, PendingOrder};
    pub use crate::priority::{Candidate, PriorityEvaluator, PriorityTier};
    pub use crate::reconcile::ReconcileReport;
    pub use crate::replay::DispatchLog;
    pub use crate::resources::{ResourceCost, ResourceKind};
    pub use crate::scheduler::{DispatchOutcome, IssuedCommand, Scheduler, SchedulerStats};
    pub use crate::world::{EntityCounts, Supply, WorldSnapshot};
}
