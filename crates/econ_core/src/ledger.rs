//! Resource ledger: available vs. reserved balances.
//!
//! `available` mirrors what the environment reports each tick and is not
//! owned here. `reserved` is owned: it starts at a standing floor, grows when
//! an order is dispatched and shrinks when that order resolves. The free
//! balance (`available - reserved`) can briefly go negative if the
//! environment's balance drops unexpectedly; that only means nothing is
//! affordable.

use serde::{Deserialize, Serialize};

use crate::config::UnderflowPolicy;
use crate::error::{Result, SchedulerError};
use crate::resources::{ResourceCost, ResourceKind};

/// Point-in-time view of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Balance last reported by the environment.
    pub available: ResourceCost,
    /// Amount held by the floor plus in-flight orders.
    pub reserved: ResourceCost,
    /// Spendable amount, clamped to zero.
    pub free: ResourceCost,
    /// Standing reservation.
    pub floor: ResourceCost,
}

/// Tracks reserved resources against the environment's balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLedger {
    available: ResourceCost,
    reserved: ResourceCost,
    floor: ResourceCost,
    policy: UnderflowPolicy,
}

impl ResourceLedger {
    /// Create a ledger whose reservation starts at `floor`.
    #[must_use]
    pub fn new(floor: ResourceCost, policy: UnderflowPolicy) -> Self {
        let floor = floor.clamp_non_negative();
        Self {
            available: ResourceCost::ZERO,
            reserved: floor,
            floor,
            policy,
        }
    }

    /// Balance last reported by the environment.
    #[must_use]
    pub const fn available(&self) -> ResourceCost {
        self.available
    }

    /// Total reserved, floor included.
    #[must_use]
    pub const fn reserved(&self) -> ResourceCost {
        self.reserved
    }

    /// Standing reservation.
    #[must_use]
    pub const fn floor(&self) -> ResourceCost {
        self.floor
    }

    /// Reserved amount attributable to in-flight orders.
    #[must_use]
    pub fn held(&self) -> ResourceCost {
        self.reserved - self.floor
    }

    /// Replace the available balance with the environment's latest report.
    pub fn refresh(&mut self, available: ResourceCost) {
        self.available = available;
    }

    /// Hold `cost` for an in-flight order.
    ///
    /// Negative components are ignored; a cost is never a credit.
    pub fn reserve(&mut self, cost: ResourceCost) {
        debug_assert!(cost.is_non_negative(), "negative reservation {cost:?}");
        self.reserved += cost.clamp_non_negative();
    }

    /// Return `cost` previously held by [`reserve`](Self::reserve).
    ///
    /// The reservation never drops below the floor. Releasing more than is
    /// held is a bookkeeping bug: under [`UnderflowPolicy::Strict`] the
    /// ledger is left untouched and the error is returned, under
    /// [`UnderflowPolicy::Clamp`] the release is clamped and logged.
    pub fn release(&mut self, cost: ResourceCost) -> Result<()> {
        let cost = cost.clamp_non_negative();
        let held = self.held();

        for kind in ResourceKind::ALL {
            let requested = cost.get(kind);
            let held = held.get(kind);
            if requested > held {
                match self.policy {
                    UnderflowPolicy::Strict => {
                        return Err(SchedulerError::ReservationUnderflow {
                            resource: kind,
                            requested,
                            held,
                        });
                    }
                    UnderflowPolicy::Clamp => {
                        tracing::error!(
                            resource = %kind,
                            requested,
                            held,
                            "reservation underflow, clamping to floor"
                        );
                    }
                }
            }
        }

        for kind in ResourceKind::ALL {
            let amount = cost.get(kind).min(held.get(kind)).max(0);
            self.reserved.set(kind, self.reserved.get(kind) - amount);
        }
        Ok(())
    }

    /// Signed free balance of one kind.
    #[must_use]
    pub fn raw_free(&self, kind: ResourceKind) -> i32 {
        self.available.get(kind) - self.reserved.get(kind)
    }

    /// Spendable balance of one kind, never negative.
    #[must_use]
    pub fn free(&self, kind: ResourceKind) -> i32 {
        self.raw_free(kind).max(0)
    }

    /// Spendable balance of every kind.
    #[must_use]
    pub fn free_all(&self) -> ResourceCost {
        (self.available - self.reserved).clamp_non_negative()
    }

    /// True iff every kind's free balance covers `cost`.
    #[must_use]
    pub fn can_afford(&self, cost: ResourceCost) -> bool {
        ResourceKind::ALL
            .iter()
            .all(|&kind| self.free(kind) >= cost.get(kind))
    }

    /// Drop every order's reservation, keeping only the floor.
    pub fn reset(&mut self) {
        self.reserved = self.floor;
    }

    /// Current balances.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            available: self.available,
            reserved: self.reserved,
            free: self.free_all(),
            floor: self.floor,
        }
    }
}
