use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::instrument;

use stockyard_catalog::ProductId;
use stockyard_inventory::{StockCommand, StockRecord};

use super::{LedgerError, StockLedger};

/// In-memory ledger. Each reserve/release is one critical section under the
/// map's write lock, so check-and-decrement cannot interleave.
#[derive(Debug, Default)]
pub struct InMemoryStockLedger {
    records: RwLock<HashMap<ProductId, StockRecord>>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn execute(&self, product: ProductId, command: StockCommand) -> Result<u32, LedgerError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::Backend("lock poisoned".to_string()))?;
        let record = records
            .get_mut(&product)
            .ok_or(LedgerError::NotFound(product))?;
        record
            .execute(&command)
            .map_err(|e| LedgerError::from_domain(product, e))
    }
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn seed(&self, product: ProductId, stock: u32) -> Result<(), LedgerError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::Backend("lock poisoned".to_string()))?;
        records.insert(product, StockRecord::seeded(product, stock));
        Ok(())
    }

    async fn available(&self, product: ProductId) -> Result<u32, LedgerError> {
        let records = self
            .records
            .read()
            .map_err(|_| LedgerError::Backend("lock poisoned".to_string()))?;
        records
            .get(&product)
            .map(StockRecord::stock)
            .ok_or(LedgerError::NotFound(product))
    }

    #[instrument(skip(self, product), fields(product = %product), err)]
    async fn try_reserve(&self, product: ProductId, quantity: u32) -> Result<u32, LedgerError> {
        self.execute(product, StockCommand::Reserve { quantity })
    }

    #[instrument(skip(self, product), fields(product = %product), err)]
    async fn release(&self, product: ProductId, quantity: u32) -> Result<u32, LedgerError> {
        self.execute(product, StockCommand::Release { quantity })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn reserve_and_release_round_trip() {
        let ledger = InMemoryStockLedger::new();
        let p = ProductId::generate();
        ledger.seed(p, 3).await.unwrap();

        assert_eq!(ledger.try_reserve(p, 2).await.unwrap(), 1);
        assert_eq!(ledger.release(p, 2).await.unwrap(), 3);
        assert_eq!(ledger.available(p).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn over_reservation_leaves_stock_untouched() {
        let ledger = InMemoryStockLedger::new();
        let p = ProductId::generate();
        ledger.seed(p, 1).await.unwrap();

        let err = ledger.try_reserve(p, 2).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                product: p,
                requested: 2,
                available: 1
            }
        );
        assert_eq!(ledger.available(p).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_product_and_zero_quantity() {
        let ledger = InMemoryStockLedger::new();
        let p = ProductId::generate();
        assert_eq!(
            ledger.try_reserve(p, 1).await.unwrap_err(),
            LedgerError::NotFound(p)
        );

        ledger.seed(p, 1).await.unwrap();
        assert!(matches!(
            ledger.release(p, 0).await,
            Err(LedgerError::InvalidQuantity(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_oversell() {
        let ledger = Arc::new(InMemoryStockLedger::new());
        let p = ProductId::generate();
        ledger.seed(p, 10).await.unwrap();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.try_reserve(p, 1).await.is_ok() })
            })
            .collect();

        let mut won = 0;
        for t in tasks {
            if t.await.unwrap() {
                won += 1;
            }
        }
        assert_eq!(won, 10);
        assert_eq!(ledger.available(p).await.unwrap(), 0);
    }
}
