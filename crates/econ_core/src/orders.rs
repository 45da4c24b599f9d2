//! In-flight orders and their bookkeeping.
//!
//! A [`PendingOrder`] owns exactly one ledger reservation and at most one
//! grid claim. The [`OrderBook`] keeps pending orders in id order so every
//! scan over them is deterministic.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::catalog::ActionId;
use crate::environment::EntityId;
use crate::grid::{Footprint, TilePos};
use crate::resources::ResourceCost;

/// Correlation token for one dispatched order.
///
/// Handed to the environment with every command so that confirmation events
/// can name the order they resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Dispatched; reservation outstanding.
    Pending,
    /// The produced entity exists; reservation released.
    Confirmed,
    /// Given up; reservation released, nothing produced.
    Abandoned(AbandonReason),
}

/// Why an order was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbandonReason {
    /// The environment reported the order cancelled or superseded.
    Cancelled,
    /// The producer was destroyed or vanished before the order resolved.
    ProducerLost,
    /// No resolving notification arrived within the order timeout.
    Timeout,
    /// The episode ended with the order still in flight.
    EpisodeEnd,
}

/// Grid cells provisionally held by a building order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Top-left tile of the footprint.
    pub origin: TilePos,
    /// Building size (the grid adds its margin).
    pub footprint: Footprint,
}

/// One in-flight reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Correlation token.
    pub id: OrderId,
    /// Action that was dispatched.
    pub action: ActionId,
    /// Entity kind (or tech) the action produces.
    pub produces: String,
    /// Cost reserved at dispatch.
    pub cost: ResourceCost,
    /// Placement claim, for building orders.
    pub claim: Option<Claim>,
    /// Unit or building that received the command.
    pub producer: Option<EntityId>,
    /// Tick the order was dispatched.
    pub issued_tick: u64,
    /// Current lifecycle state.
    pub status: OrderStatus,
    /// Entity that resolved the order, once confirmed.
    pub entity: Option<EntityId>,
    /// Tick the order resolved.
    pub resolved_tick: Option<u64>,
}

impl PendingOrder {
    /// Age of the order at `tick`.
    #[must_use]
    pub fn age(&self, tick: u64) -> u64 {
        tick.saturating_sub(self.issued_tick)
    }

    /// Still holding a reservation.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

/// Pending orders plus a bounded history of resolved ones.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    next_id: u64,
    pending: BTreeMap<OrderId, PendingOrder>,
    history: VecDeque<PendingOrder>,
    history_len: usize,
}

impl OrderBook {
    /// Create an empty book keeping up to `history_len` resolved orders.
    #[must_use]
    pub fn new(history_len: usize) -> Self {
        Self {
            next_id: 1,
            pending: BTreeMap::new(),
            history: VecDeque::with_capacity(history_len),
            history_len,
        }
    }

    /// Reserve the next order id.
    ///
    /// Ids burned by rejected dispatches are never reused.
    pub fn allocate_id(&mut self) -> OrderId {
        let id = OrderId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Record a dispatched order.
    pub fn insert(&mut self, order: PendingOrder) {
        debug_assert!(order.is_pending());
        debug_assert!(!self.pending.contains_key(&order.id), "duplicate order {}", order.id);
        self.pending.insert(order.id, order);
    }

    /// Look up a pending order.
    #[must_use]
    pub fn get(&self, id: OrderId) -> Option<&PendingOrder> {
        self.pending.get(&id)
    }

    /// Pending orders in id order.
    pub fn pending(&self) -> impl Iterator<Item = &PendingOrder> {
        self.pending.values()
    }

    /// Number of pending orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Recently resolved orders, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &PendingOrder> {
        self.history.iter()
    }

    /// True if the entity is producer of some pending order.
    #[must_use]
    pub fn is_producer_busy(&self, producer: EntityId) -> bool {
        self.pending.values().any(|o| o.producer == Some(producer))
    }

    /// Pending orders whose producer is `producer`.
    #[must_use]
    pub fn by_producer(&self, producer: EntityId) -> Vec<OrderId> {
        self.pending
            .values()
            .filter(|o| o.producer == Some(producer))
            .map(|o| o.id)
            .collect()
    }

    /// Match a confirmation that carries no correlation token.
    ///
    /// Picks the first pending order (lowest id) producing `kind`. Orders
    /// that hold a claim only match when `tile` is the claim's origin; orders
    /// without a claim match any tile.
    #[must_use]
    pub fn find_match(&self, kind: &str, tile: Option<TilePos>) -> Option<OrderId> {
        self.pending
            .values()
            .find(|o| {
                o.produces == kind
                    && match (o.claim, tile) {
                        (Some(claim), Some(tile)) => claim.origin == tile,
                        (Some(_), None) => false,
                        (None, _) => true,
                    }
            })
            .map(|o| o.id)
    }

    /// Move a pending order into history with its final status.
    ///
    /// Returns the resolved order, or `None` if it was not pending (already
    /// resolved, or never existed).
    pub fn resolve(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        tick: u64,
        entity: Option<EntityId>,
    ) -> Option<PendingOrder> {
        debug_assert!(status != OrderStatus::Pending);
        let mut order = self.pending.remove(&id)?;
        order.status = status;
        order.resolved_tick = Some(tick);
        order.entity = entity;

        if self.history_len > 0 {
            if self.history.len() == self.history_len {
                self.history.pop_front();
            }
            self.history.push_back(order.clone());
        }
        Some(order)
    }

    /// Sum of reservations held by pending orders.
    #[must_use]
    pub fn pending_cost(&self) -> ResourceCost {
        self.pending.values().map(|o| o.cost).sum()
    }

    /// Number of pending orders per produced kind.
    #[must_use]
    pub fn pending_by_kind(&self) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for order in self.pending.values() {
            *counts.entry(order.produces.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Drop every pending order and the history. Ids keep increasing.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.history.clear();
    }

    /// Remove and return every pending order.
    pub fn drain_pending(&mut self) -> Vec<PendingOrder> {
        std::mem::take(&mut self.pending).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(book: &mut OrderBook, produces: &str, claim: Option<Claim>) -> OrderId {
        let id = book.allocate_id();
        book.insert(PendingOrder {
            id,
            action: ActionId(0),
            produces: produces.to_string(),
            cost: ResourceCost::new(100, 0),
            claim,
            producer: Some(id.0 + 100),
            issued_tick: 10,
            status: OrderStatus::Pending,
            entity: None,
            resolved_tick: None,
        });
        id
    }

    fn claim_at(x: i32, y: i32) -> Option<Claim> {
        Some(Claim {
            origin: TilePos::new(x, y),
            footprint: Footprint::new(3, 2),
        })
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut book = OrderBook::new(4);
        let a = book.allocate_id();
        let b = book.allocate_id();
        assert!(b > a);
        assert_eq!(a, OrderId(1));
    }

    #[test]
    fn test_find_match_prefers_oldest_and_respects_claims() {
        let mut book = OrderBook::new(4);
        let depot_a = order(&mut book, "supply_depot", claim_at(10, 10));
        let depot_b = order(&mut book, "supply_depot", claim_at(20, 10));
        let marine_a = order(&mut book, "marine", None);
        let _marine_b = order(&mut book, "marine", None);

        assert_eq!(book.find_match("supply_depot", Some(TilePos::new(20, 10))), Some(depot_b));
        assert_eq!(book.find_match("supply_depot", Some(TilePos::new(10, 10))), Some(depot_a));
        assert_eq!(book.find_match("supply_depot", Some(TilePos::new(5, 5))), None);
        assert_eq!(book.find_match("supply_depot", None), None);
        assert_eq!(book.find_match("marine", Some(TilePos::new(1, 1))), Some(marine_a));
        assert_eq!(book.find_match("barracks", None), None);
    }

    #[test]
    fn test_resolve_moves_to_history_once() {
        let mut book = OrderBook::new(4);
        let id = order(&mut book, "marine", None);

        let resolved = book.resolve(id, OrderStatus::Confirmed, 42, Some(7)).unwrap();
        assert_eq!(resolved.status, OrderStatus::Confirmed);
        assert_eq!(resolved.resolved_tick, Some(42));
        assert_eq!(resolved.entity, Some(7));
        assert!(book.is_empty());

        // Second resolution is a no-op
        assert!(book
            .resolve(id, OrderStatus::Abandoned(AbandonReason::Timeout), 43, None)
            .is_none());
        assert_eq!(book.history().count(), 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut book = OrderBook::new(2);
        for _ in 0..5 {
            let id = order(&mut book, "marine", None);
            book.resolve(id, OrderStatus::Confirmed, 1, None);
        }
        let ids: Vec<_> = book.history().map(|o| o.id).collect();
        assert_eq!(ids, vec![OrderId(4), OrderId(5)]);
    }

    #[test]
    fn test_pending_totals() {
        let mut book = OrderBook::new(0);
        let first = order(&mut book, "marine", None);
        order(&mut book, "marine", None);
        order(&mut book, "barracks", claim_at(4, 4));

        assert_eq!(book.pending_cost(), ResourceCost::new(300, 0));
        assert_eq!(book.pending_by_kind().get("marine"), Some(&2));
        assert!(book.is_producer_busy(first.0 + 100));
        assert_eq!(book.by_producer(first.0 + 100), vec![first]);
        assert!(!book.is_producer_busy(1));
    }
}
