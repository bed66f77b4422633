//! Inventory ledger: the single authority over per-product stock.
//!
//! Every decrement goes through [`StockLedger::try_reserve`], a single atomic
//! conditional update, and every restoration through [`StockLedger::release`].
//! Callers never read-then-write stock themselves.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use stockyard_catalog::ProductId;
use stockyard_core::DomainError;

pub use in_memory::InMemoryStockLedger;
pub use postgres::PostgresStockLedger;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no stock record for product {0}")]
    NotFound(ProductId),

    #[error("insufficient stock for product {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("ledger backend failure: {0}")]
    Backend(String),
}

impl LedgerError {
    pub(crate) fn from_domain(product: ProductId, err: DomainError) -> Self {
        match err {
            DomainError::InsufficientStock {
                requested,
                available,
                ..
            } => LedgerError::InsufficientStock {
                product,
                requested,
                available,
            },
            DomainError::InvalidInput(msg) => LedgerError::InvalidQuantity(msg),
            DomainError::NotFound(_) => LedgerError::NotFound(product),
            other => LedgerError::Backend(other.to_string()),
        }
    }
}

/// Atomic stock counter per product.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Create (or reset) the counter for a newly registered product.
    async fn seed(&self, product: ProductId, stock: u32) -> Result<(), LedgerError>;

    async fn available(&self, product: ProductId) -> Result<u32, LedgerError>;

    /// Decrement by `quantity` if and only if at least that much is available.
    /// Returns the remaining level.
    async fn try_reserve(&self, product: ProductId, quantity: u32) -> Result<u32, LedgerError>;

    /// Unconditional increment. Returns the new level.
    async fn release(&self, product: ProductId, quantity: u32) -> Result<u32, LedgerError>;
}
