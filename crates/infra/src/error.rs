//! Service-level error surface.
//!
//! Every layer below has its own error enum; services collapse them into
//! [`CommerceError`], whose [`ErrorKind`] is what the HTTP layer maps to a
//! status code.

use thiserror::Error;

use stockyard_catalog::ProductId;
use stockyard_core::DomainError;

use crate::dispatcher::DispatchError;
use crate::gateway::GatewayError;
use crate::ledger::LedgerError;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    InsufficientStock,
    InvalidState,
    InvalidInput,
    ExternalGateway,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::InsufficientStock => "InsufficientStock",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::ExternalGateway => "ExternalGatewayError",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Internal => "Internal",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommerceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("insufficient stock for product {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `outcome_unknown` is set when the gateway may still complete the
    /// session; the order then stays pending with its stock reserved.
    #[error("payment gateway error: {message}")]
    ExternalGateway {
        message: String,
        outcome_unknown: bool,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CommerceResult<T> = Result<T, CommerceError>;

impl CommerceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommerceError::NotFound(_) => ErrorKind::NotFound,
            CommerceError::Unauthorized => ErrorKind::Unauthorized,
            CommerceError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CommerceError::InvalidState(_) => ErrorKind::InvalidState,
            CommerceError::InvalidInput(_) => ErrorKind::InvalidInput,
            CommerceError::ExternalGateway { .. } => ErrorKind::ExternalGateway,
            CommerceError::Conflict(_) => ErrorKind::Conflict,
            CommerceError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CommerceError::NotFound(what.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        CommerceError::InvalidInput(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        CommerceError::InvalidState(msg.into())
    }

    pub(crate) fn gateway(err: &GatewayError) -> Self {
        CommerceError::ExternalGateway {
            message: err.to_string(),
            outcome_unknown: !err.outcome_known(),
        }
    }
}

impl From<DomainError> for CommerceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidInput(msg) => CommerceError::InvalidInput(msg),
            DomainError::InvalidId(msg) => CommerceError::InvalidInput(msg),
            DomainError::InvalidState(msg) => CommerceError::InvalidState(msg),
            DomainError::NotFound(what) => CommerceError::NotFound(what),
            DomainError::InsufficientStock {
                product,
                requested,
                available,
            } => CommerceError::InsufficientStock {
                product: ProductId(product),
                requested,
                available,
            },
            DomainError::Conflict(msg) => CommerceError::Conflict(msg),
            DomainError::Unauthorized => CommerceError::Unauthorized,
        }
    }
}

impl From<StoreError> for CommerceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => CommerceError::Conflict(msg),
            StoreError::Backend(msg) => CommerceError::Internal(msg),
        }
    }
}

impl From<DispatchError> for CommerceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Domain(err) => err.into(),
            DispatchError::Concurrency(msg) => CommerceError::Conflict(msg),
            DispatchError::Store(err) => err.into(),
        }
    }
}

impl From<LedgerError> for CommerceError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NotFound(product) => CommerceError::NotFound(format!("product {product}")),
            LedgerError::InsufficientStock {
                product,
                requested,
                available,
            } => CommerceError::InsufficientStock {
                product,
                requested,
                available,
            },
            LedgerError::InvalidQuantity(msg) => CommerceError::InvalidInput(msg),
            LedgerError::Backend(msg) => CommerceError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_timeout_is_flagged_unknown() {
        let err = CommerceError::gateway(&GatewayError::Timeout);
        assert_eq!(err.kind(), ErrorKind::ExternalGateway);
        assert!(matches!(
            err,
            CommerceError::ExternalGateway {
                outcome_unknown: true,
                ..
            }
        ));
    }

    #[test]
    fn exhausted_retries_surface_as_conflict() {
        let err: CommerceError = DispatchError::Concurrency("stale".into()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn ledger_shortfall_keeps_product() {
        let product = ProductId::generate();
        let err: CommerceError = LedgerError::InsufficientStock {
            product,
            requested: 2,
            available: 1,
        }
        .into();
        assert_eq!(
            err,
            CommerceError::InsufficientStock {
                product,
                requested: 2,
                available: 1
            }
        );
    }
}
