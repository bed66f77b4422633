//! Hosted payment page gateway boundary.
//!
//! Only session initialisation is an outbound call. Completion arrives later
//! through three inbound channels (browser redirect, gateway cancel, IPN) that
//! are parsed into [`GatewayRedirect`] / [`IpnNotification`] here and then
//! funnelled into a single outcome transition by the payments service.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockyard_sales::PaymentOutcome;

pub use http::HttpPaymentGateway;

/// Everything the gateway needs to open a hosted payment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRequest {
    pub tran_id: String,
    /// Smallest currency unit.
    pub total_amount: u64,
    pub currency: String,
    pub success_url: String,
    pub fail_url: String,
    pub cancel_url: String,
    pub ipn_url: String,
    /// Order id.
    pub value_a: String,
    /// Buyer id.
    pub value_b: String,
    /// Order lines as JSON.
    pub value_c: String,
    /// Shipping address as JSON.
    pub value_d: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySession {
    pub redirect_url: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway answered and said no (or answered with something unusable).
    #[error("gateway rejected the payment session: {0}")]
    Rejected(String),

    /// The request never reached the gateway.
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    #[error("gateway did not answer in time")]
    Timeout,

    /// The request may have been processed; the response was lost.
    #[error("gateway outcome unknown: {0}")]
    Indeterminate(String),
}

impl GatewayError {
    /// `true` when no session can exist on the gateway side, so reserved
    /// stock may be released immediately.
    pub fn outcome_known(&self) -> bool {
        matches!(self, GatewayError::Rejected(_) | GatewayError::Unreachable(_))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn init_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError>;
}

/// Browser redirect back from the hosted page (success / fail / cancel).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GatewayRedirect {
    #[serde(default)]
    pub tran_id: String,
    #[serde(default)]
    pub value_a: String,
}

/// Server-to-server instant payment notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IpnNotification {
    #[serde(default)]
    pub tran_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub value_a: String,
    #[serde(default)]
    pub value_b: String,
    #[serde(default)]
    pub value_c: String,
    #[serde(default)]
    pub value_d: String,
}

/// Map an IPN `status` field to an outcome; `None` for anything unrecognised.
pub fn outcome_from_ipn_status(status: &str) -> Option<PaymentOutcome> {
    match status.trim().to_ascii_uppercase().as_str() {
        "VALID" | "VALIDATED" => Some(PaymentOutcome::Paid),
        "FAILED" => Some(PaymentOutcome::Failed),
        "CANCELLED" => Some(PaymentOutcome::Cancelled),
        _ => None,
    }
}

/// Render an amount in the smallest unit as a two-decimal major-unit string.
pub fn format_amount(minor_units: u64) -> String {
    format!("{}.{:02}", minor_units / 100, minor_units % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipn_statuses_map_to_outcomes() {
        assert_eq!(outcome_from_ipn_status("VALID"), Some(PaymentOutcome::Paid));
        assert_eq!(outcome_from_ipn_status("failed"), Some(PaymentOutcome::Failed));
        assert_eq!(
            outcome_from_ipn_status("CANCELLED"),
            Some(PaymentOutcome::Cancelled)
        );
        assert_eq!(outcome_from_ipn_status("PENDING"), None);
    }

    #[test]
    fn only_rejection_and_unreachable_are_definite() {
        assert!(GatewayError::Rejected("no".into()).outcome_known());
        assert!(GatewayError::Unreachable("refused".into()).outcome_known());
        assert!(!GatewayError::Timeout.outcome_known());
        assert!(!GatewayError::Indeterminate("reset".into()).outcome_known());
    }

    #[test]
    fn amounts_render_with_two_decimals() {
        assert_eq!(format_amount(150_005), "1500.05");
        assert_eq!(format_amount(7), "0.07");
    }
}
