//! Infrastructure layer: stock ledgers, record stores, the payment gateway
//! client and the async commerce services built on them.

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod saga;
pub mod services;
pub mod store;
