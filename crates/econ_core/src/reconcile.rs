//! Committing and rolling back reservations.
//!
//! Events from the environment confirm or abandon pending orders. Either way
//! the order's exact reservation is returned to the ledger and its claim
//! freed; only confirmation changes entity counts. A periodic full
//! reconciliation recounts entities from ground truth and force-abandons
//! orders that never resolved, so no reservation stays stuck.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::environment::{EntityFilter, EntityId, Environment, EnvironmentEvent};
use crate::error::Result;
use crate::orders::{AbandonReason, OrderId, OrderStatus};
use crate::resources::ResourceCost;
use crate::scheduler::Scheduler;

/// Summary of one full reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Tick the reconciliation ran.
    pub tick: u64,
    /// Entities seen in the environment.
    pub entities: usize,
    /// Orders abandoned because their producer disappeared.
    pub producers_lost: usize,
    /// Orders force-abandoned by the timeout.
    pub timed_out: usize,
    /// Orders still pending afterwards.
    pub pending: usize,
    /// Ledger reservation afterwards.
    pub reserved: ResourceCost,
}

impl Scheduler {
    /// Apply one environment event.
    ///
    /// Fails only on a ledger underflow under the strict policy.
    pub fn handle_event(&mut self, event: &EnvironmentEvent) -> Result<()> {
        match event {
            EnvironmentEvent::EntityCreated { entity, order } => {
                let matched = match order {
                    Some(id) => self.context.orders.get(*id).map(|o| o.id),
                    None => self
                        .context
                        .orders
                        .find_match(&entity.kind, Some(entity.tile)),
                };
                self.context.counts.add(entity);
                match matched {
                    Some(id) => self.confirm(id, Some(entity.id))?,
                    None => {
                        self.context.stats.unmatched_creations += 1;
                        tracing::debug!(
                            tick = self.context.tick,
                            entity = entity.id,
                            kind = %entity.kind,
                            "creation matched no pending order"
                        );
                    }
                }
            }

            EnvironmentEvent::EntityCompleted { entity } => {
                self.context.counts.complete(&entity.kind);
            }

            EnvironmentEvent::EntityDestroyed { entity } => {
                self.context.counts.remove(entity);
                for id in self.context.orders.by_producer(entity.id) {
                    self.abandon(id, AbandonReason::ProducerLost)?;
                }
            }

            EnvironmentEvent::ResearchStarted {
                producer,
                tech,
                order,
            } => {
                let matched = match order {
                    Some(id) => self.context.orders.get(*id).map(|o| o.id),
                    None => self.context.orders.find_match(tech, None),
                };
                self.context.counts.start_research(tech);
                match matched {
                    Some(id) => self.confirm(id, Some(*producer))?,
                    None => self.context.stats.unmatched_creations += 1,
                }
            }

            EnvironmentEvent::ResearchCompleted { tech } => {
                self.context.counts.finish_research(tech);
            }

            EnvironmentEvent::OrderCancelled { order } => {
                if self.context.orders.get(*order).is_some() {
                    self.abandon(*order, AbandonReason::Cancelled)?;
                }
            }
        }

        #[cfg(feature = "debug-validation")]
        self.context.check_invariants()?;

        Ok(())
    }

    /// The order produced its entity: return the reservation and free the
    /// claim.
    fn confirm(&mut self, id: OrderId, entity: Option<EntityId>) -> Result<()> {
        let Some(order) = self.context.orders.get(id) else {
            return Ok(());
        };
        let (cost, claim) = (order.cost, order.claim);

        // Ledger first so a strict underflow leaves everything untouched
        self.context.ledger.release(cost)?;
        if let Some(claim) = claim {
            self.context.grid.release(claim.origin, claim.footprint, id);
        }
        let tick = self.context.tick;
        if let Some(order) = self
            .context
            .orders
            .resolve(id, OrderStatus::Confirmed, tick, entity)
        {
            self.context.stats.confirmed += 1;
            tracing::debug!(
                tick,
                order = %id,
                kind = %order.produces,
                latency = order.age(tick),
                "confirmed"
            );
        }
        Ok(())
    }

    /// Give up on an order: return the reservation and free the claim,
    /// counts unchanged.
    fn abandon(&mut self, id: OrderId, reason: AbandonReason) -> Result<()> {
        let Some(order) = self.context.orders.get(id) else {
            return Ok(());
        };
        let (cost, claim) = (order.cost, order.claim);

        self.context.ledger.release(cost)?;
        if let Some(claim) = claim {
            self.context.grid.release(claim.origin, claim.footprint, id);
        }
        let tick = self.context.tick;
        if let Some(order) = self
            .context
            .orders
            .resolve(id, OrderStatus::Abandoned(reason), tick, None)
        {
            self.context.stats.abandoned += 1;
            if reason == AbandonReason::Timeout {
                self.context.stats.orphaned += 1;
            }
            tracing::warn!(
                tick,
                order = %id,
                kind = %order.produces,
                ?reason,
                age = order.age(tick),
                minerals = cost.minerals,
                gas = cost.gas,
                "order abandoned"
            );
        }
        Ok(())
    }

    /// Recount entities from the environment and clear out orders that can
    /// no longer resolve.
    ///
    /// Runs automatically every `reconcile_period` ticks.
    pub fn reconcile<E: Environment + ?Sized>(&mut self, env: &E) -> Result<ReconcileReport> {
        let tick = self.context.tick;
        let entities = env.query_entities(&EntityFilter::all());
        let live: BTreeSet<EntityId> = entities.iter().map(|e| e.id).collect();
        self.context.counts.recount(&entities);

        let mut report = ReconcileReport {
            tick,
            entities: entities.len(),
            ..ReconcileReport::default()
        };

        let stale: Vec<(OrderId, AbandonReason)> = self
            .context
            .orders
            .pending()
            .filter_map(|order| {
                if order.producer.is_some_and(|p| !live.contains(&p)) {
                    Some((order.id, AbandonReason::ProducerLost))
                } else if order.age(tick) >= self.config.order_timeout {
                    Some((order.id, AbandonReason::Timeout))
                } else {
                    None
                }
            })
            .collect();

        for (id, reason) in stale {
            match reason {
                AbandonReason::Timeout => report.timed_out += 1,
                _ => report.producers_lost += 1,
            }
            self.abandon(id, reason)?;
        }

        if report.timed_out > 0 {
            tracing::warn!(tick, count = report.timed_out, "orphaned reservations force-abandoned");
        }

        report.pending = self.context.orders.len();
        report.reserved = self.context.ledger.reserved();
        self.context.last_reconcile = Some(tick);
        self.context.stats.reconciliations += 1;

        tracing::info!(
            tick,
            entities = report.entities,
            producers_lost = report.producers_lost,
            timed_out = report.timed_out,
            pending = report.pending,
            reserved_minerals = report.reserved.minerals,
            reserved_gas = report.reserved.gas,
            "reconciled"
        );
        Ok(report)
    }
}
