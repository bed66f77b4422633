//! Product catalog domain module.
//!
//! The catalog is an external collaborator of the commerce engine; this crate
//! models only what the engine reads from it: identity, seller and the price
//! fields valid for each offer type.

pub mod product;

pub use product::{MAX_UNIT_PRICE, PriceMode, Product, ProductId, ProductKind, ProductOffer};
