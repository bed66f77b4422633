//! Inventory domain module: the per-product stock counter.
//!
//! Stock changes are decided here as pure logic (no IO). Ledger backends in
//! `stockyard-infra` run these decisions inside a single critical section or
//! express them as one conditional SQL update.

pub mod stock;

pub use stock::{StockCommand, StockEvent, StockRecord};
