//! Checkout reservation saga.
//!
//! ```text
//! Reserving ──all lines reserved──▶ Reserved ──order persisted──▶ Committed
//!     │                                 │
//!     └──line short─▶ Compensated ◀─────┘ order write failed
//! ```
//!
//! A saga dropped while still holding stock (the request future was
//! cancelled, or the task panicked) hands its steps to a background release
//! on the current tokio runtime.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use stockyard_catalog::ProductId;

use crate::ledger::{LedgerError, StockLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Reserving,
    Reserved,
    Compensated,
    Committed,
}

/// One decrement taken from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationStep {
    pub product: ProductId,
    pub quantity: u32,
}

pub struct ReservationSaga {
    ledger: Arc<dyn StockLedger>,
    taken: Vec<ReservationStep>,
    state: ReservationState,
}

impl ReservationSaga {
    pub fn new(ledger: Arc<dyn StockLedger>) -> Self {
        Self {
            ledger,
            taken: Vec::new(),
            state: ReservationState::Reserving,
        }
    }

    pub fn state(&self) -> ReservationState {
        self.state
    }

    pub fn taken(&self) -> &[ReservationStep] {
        &self.taken
    }

    /// Reserve every step in order. On the first failure all earlier steps
    /// are released (newest first) and the failing step's error is returned.
    pub async fn reserve_all(&mut self, steps: Vec<ReservationStep>) -> Result<(), LedgerError> {
        if self.state != ReservationState::Reserving {
            return Err(LedgerError::Backend(format!(
                "reservation saga cannot reserve in state {:?}",
                self.state
            )));
        }

        for step in steps {
            if let Err(err) = self.ledger.try_reserve(step.product, step.quantity).await {
                warn!(
                    product = %step.product,
                    quantity = step.quantity,
                    prior_steps = self.taken.len(),
                    "reservation failed, compensating: {err}"
                );
                self.compensate().await;
                return Err(err);
            }
            self.taken.push(step);
        }

        self.state = ReservationState::Reserved;
        Ok(())
    }

    /// Release every step taken so far, newest first.
    pub async fn compensate(&mut self) {
        let steps = std::mem::take(&mut self.taken);
        release_newest_first(self.ledger.as_ref(), steps).await;
        self.state = ReservationState::Compensated;
    }

    /// The order is durable; the reservations now belong to it.
    pub fn commit(mut self) -> Vec<ReservationStep> {
        self.state = ReservationState::Committed;
        std::mem::take(&mut self.taken)
    }
}

/// A failed release cannot be retried here; it is logged with the exact
/// product and quantity so stock can be reconciled by hand.
async fn release_newest_first(ledger: &dyn StockLedger, mut steps: Vec<ReservationStep>) {
    while let Some(step) = steps.pop() {
        if let Err(err) = ledger.release(step.product, step.quantity).await {
            error!(
                product = %step.product,
                quantity = step.quantity,
                "compensating release failed: {err}"
            );
        }
    }
}

impl Drop for ReservationSaga {
    fn drop(&mut self) {
        if self.taken.is_empty() {
            return;
        }
        let steps = std::mem::take(&mut self.taken);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(steps = ?steps, "reservation saga abandoned, releasing in background");
                let ledger = Arc::clone(&self.ledger);
                runtime.spawn(async move {
                    release_newest_first(ledger.as_ref(), steps).await;
                });
            }
            Err(_) => error!(
                steps = ?steps,
                "reservation saga dropped outside a runtime, stock not released"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryStockLedger;

    fn step(product: ProductId, quantity: u32) -> ReservationStep {
        ReservationStep { product, quantity }
    }

    fn ledger() -> Arc<dyn StockLedger> {
        Arc::new(InMemoryStockLedger::new())
    }

    #[tokio::test]
    async fn failure_releases_earlier_steps() {
        let ledger = ledger();
        let a = ProductId::generate();
        let b = ProductId::generate();
        ledger.seed(a, 5).await.unwrap();
        ledger.seed(b, 1).await.unwrap();

        let mut saga = ReservationSaga::new(ledger.clone());
        let err = saga
            .reserve_all(vec![step(a, 2), step(b, 3)])
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientStock { product, .. } if product == b));
        assert_eq!(saga.state(), ReservationState::Compensated);
        assert_eq!(ledger.available(a).await.unwrap(), 5);
        assert_eq!(ledger.available(b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn commit_keeps_stock_taken() {
        let ledger = ledger();
        let a = ProductId::generate();
        ledger.seed(a, 3).await.unwrap();

        let mut saga = ReservationSaga::new(ledger.clone());
        saga.reserve_all(vec![step(a, 1), step(a, 1)]).await.unwrap();
        assert_eq!(saga.state(), ReservationState::Reserved);
        let steps = saga.commit();

        assert_eq!(steps.len(), 2);
        assert_eq!(ledger.available(a).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn explicit_compensation_after_reserve() {
        let ledger = ledger();
        let a = ProductId::generate();
        ledger.seed(a, 4).await.unwrap();

        let mut saga = ReservationSaga::new(ledger.clone());
        saga.reserve_all(vec![step(a, 4)]).await.unwrap();
        assert_eq!(ledger.available(a).await.unwrap(), 0);
        saga.compensate().await;
        assert_eq!(ledger.available(a).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn abandoned_saga_releases_in_background() {
        let ledger = ledger();
        let a = ProductId::generate();
        let b = ProductId::generate();
        ledger.seed(a, 2).await.unwrap();
        ledger.seed(b, 2).await.unwrap();

        let mut saga = ReservationSaga::new(ledger.clone());
        saga.reserve_all(vec![step(a, 2), step(b, 1)]).await.unwrap();
        drop(saga);

        for _ in 0..100 {
            if ledger.available(a).await.unwrap() == 2 && ledger.available(b).await.unwrap() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(ledger.available(a).await.unwrap(), 2);
        assert_eq!(ledger.available(b).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn committed_saga_releases_nothing_on_drop() {
        let ledger = ledger();
        let a = ProductId::generate();
        ledger.seed(a, 2).await.unwrap();

        let mut saga = ReservationSaga::new(ledger.clone());
        saga.reserve_all(vec![step(a, 1)]).await.unwrap();
        saga.commit();
        tokio::task::yield_now().await;

        assert_eq!(ledger.available(a).await.unwrap(), 1);
    }
}
