//! Domain error model.

use thiserror::Error;

use crate::id::AggregateId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic business failures raised by the domain crates.
///
/// Infrastructure failures (storage, gateway IO) are modelled in `stockyard-infra`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing or malformed price, quantity, duration or other request field.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Status value outside the permitted set, or a transition out of a terminal state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient stock for product {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: AggregateId,
        requested: u32,
        available: u32,
    },

    /// Stale version on an optimistic write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The actor lacks the required relationship to the record.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(product: AggregateId, requested: u32, available: u32) -> Self {
        Self::InsufficientStock {
            product,
            requested,
            available,
        }
    }
}
