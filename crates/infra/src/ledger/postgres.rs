//! Postgres-backed stock ledger.
//!
//! Reservation is one conditional `UPDATE`: the row is only touched when
//! `stock >= quantity`, so the database serializes racing reservations for the
//! same product and the counter can never go negative. Zero affected rows is
//! disambiguated with a follow-up read.
//!
//! | SQLx error | LedgerError |
//! |------------|-------------|
//! | Database `23514` (check violation) | `InvalidQuantity` |
//! | Any other | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use stockyard_catalog::ProductId;

use super::{LedgerError, StockLedger};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS product_stock (
    product_id UUID PRIMARY KEY,
    stock INTEGER NOT NULL CHECK (stock >= 0),
    version BIGINT NOT NULL DEFAULT 1,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// Ledger over the `product_stock` table.
#[derive(Debug, Clone)]
pub struct PostgresStockLedger {
    pool: Arc<PgPool>,
}

impl PostgresStockLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and make sure the stock table exists.
    pub async fn connect(database_url: &str) -> Result<Self, LedgerError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let ledger = Self::new(pool);
        ledger.ensure_schema().await?;
        Ok(ledger)
    }

    pub async fn ensure_schema(&self) -> Result<(), LedgerError> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn read_stock(&self, product: ProductId) -> Result<Option<u32>, LedgerError> {
        let row = sqlx::query("SELECT stock FROM product_stock WHERE product_id = $1")
            .bind(product.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("read_stock", e))?;

        row.map(|r| {
            let stock: i32 = r
                .try_get("stock")
                .map_err(|e| map_sqlx_error("read_stock", e))?;
            u32::try_from(stock)
                .map_err(|_| LedgerError::Backend(format!("negative stock stored for {product}")))
        })
        .transpose()
    }
}

fn to_sql_quantity(quantity: u32) -> Result<i32, LedgerError> {
    if quantity == 0 {
        return Err(LedgerError::InvalidQuantity(
            "quantity must be at least 1".to_string(),
        ));
    }
    i32::try_from(quantity)
        .map_err(|_| LedgerError::InvalidQuantity(format!("quantity {quantity} too large")))
}

#[async_trait]
impl StockLedger for PostgresStockLedger {
    #[instrument(skip(self, product), fields(product = %product), err)]
    async fn seed(&self, product: ProductId, stock: u32) -> Result<(), LedgerError> {
        let stock = i32::try_from(stock)
            .map_err(|_| LedgerError::InvalidQuantity(format!("stock {stock} too large")))?;
        sqlx::query(
            r#"
            INSERT INTO product_stock (product_id, stock, version)
            VALUES ($1, $2, 1)
            ON CONFLICT (product_id)
            DO UPDATE SET stock = EXCLUDED.stock,
                          version = product_stock.version + 1,
                          updated_at = now()
            "#,
        )
        .bind(product.0.as_uuid())
        .bind(stock)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("seed", e))?;
        Ok(())
    }

    async fn available(&self, product: ProductId) -> Result<u32, LedgerError> {
        self.read_stock(product)
            .await?
            .ok_or(LedgerError::NotFound(product))
    }

    #[instrument(skip(self, product), fields(product = %product, remaining = tracing::field::Empty), err)]
    async fn try_reserve(&self, product: ProductId, quantity: u32) -> Result<u32, LedgerError> {
        let qty = to_sql_quantity(quantity)?;
        let row = sqlx::query(
            r#"
            UPDATE product_stock
            SET stock = stock - $2, version = version + 1, updated_at = now()
            WHERE product_id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product.0.as_uuid())
        .bind(qty)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("try_reserve", e))?;

        match row {
            Some(row) => {
                let remaining: i32 = row
                    .try_get("stock")
                    .map_err(|e| map_sqlx_error("try_reserve", e))?;
                Span::current().record("remaining", remaining);
                Ok(remaining.max(0) as u32)
            }
            // Zero rows: either the product is unknown or there is not enough.
            None => match self.read_stock(product).await? {
                None => Err(LedgerError::NotFound(product)),
                Some(available) => Err(LedgerError::InsufficientStock {
                    product,
                    requested: quantity,
                    available,
                }),
            },
        }
    }

    #[instrument(skip(self, product), fields(product = %product), err)]
    async fn release(&self, product: ProductId, quantity: u32) -> Result<u32, LedgerError> {
        let qty = to_sql_quantity(quantity)?;
        let row = sqlx::query(
            r#"
            UPDATE product_stock
            SET stock = stock + $2, version = version + 1, updated_at = now()
            WHERE product_id = $1
            RETURNING stock
            "#,
        )
        .bind(product.0.as_uuid())
        .bind(qty)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("release", e))?;

        let row = row.ok_or(LedgerError::NotFound(product))?;
        let level: i32 = row
            .try_get("stock")
            .map_err(|e| map_sqlx_error("release", e))?;
        Ok(level.max(0) as u32)
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Check violation: stock would have gone negative or overflowed.
                Some("23514") => LedgerError::InvalidQuantity(msg),
                _ => LedgerError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            LedgerError::Backend(format!("connection pool closed in {}", operation))
        }
        other => LedgerError::Backend(format!("sqlx error in {}: {}", operation, other)),
    }
}
