//! Versioned record storage boundary.
//!
//! Carts, orders and rentals are persisted as snapshots keyed by id. Every
//! write carries an `ExpectedVersion` so two writers that decided against the
//! same loaded state cannot both commit.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryRecordStore;
pub use r#trait::{RecordStore, StoreError};
