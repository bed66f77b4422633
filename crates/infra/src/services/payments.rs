//! Online payment reconciliation.
//!
//! The three completion channels (browser success/fail/cancel redirects, the
//! IPN callback and the stale-session sweep) all end in
//! [`PaymentService::apply_payment_outcome`]. The previous-status guard lives
//! in the order aggregate and runs inside the optimistic commit, so channels
//! racing on the same order release stock at most once.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use stockyard_core::UserId;
use stockyard_sales::{
    ApplyPaymentOutcome, Order, OrderCommand, OrderId, PaymentMethod, PaymentOutcome, PlaceOrder,
    online_transaction_id, order_total,
};

use crate::error::{CommerceError, CommerceResult};
use crate::gateway::{GatewayRedirect, IpnNotification, SessionRequest, outcome_from_ipn_status};

use super::{CheckoutRequest, OrderService, SharedGateway};

fn encode<T: Serialize>(value: &T) -> CommerceResult<String> {
    serde_json::to_string(value)
        .map_err(|e| CommerceError::Internal(format!("cannot encode session field: {e}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSettings {
    /// Base for the callback URLs handed to the gateway.
    pub public_base_url: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSession {
    pub order_id: OrderId,
    pub transaction_id: String,
    pub redirect_url: String,
}

#[derive(Clone)]
pub struct PaymentService {
    orders: OrderService,
    gateway: SharedGateway,
    settings: PaymentSettings,
}

impl PaymentService {
    pub fn new(orders: OrderService, gateway: SharedGateway, settings: PaymentSettings) -> Self {
        Self {
            orders,
            gateway,
            settings,
        }
    }

    fn session_request(
        &self,
        order_id: OrderId,
        buyer: UserId,
        transaction_id: &str,
        command: &PlaceOrder,
    ) -> CommerceResult<SessionRequest> {
        let base = &self.settings.public_base_url;

        Ok(SessionRequest {
            tran_id: transaction_id.to_string(),
            total_amount: order_total(&command.lines)?,
            currency: self.settings.currency.clone(),
            success_url: format!("{base}/payments/success"),
            fail_url: format!("{base}/payments/fail"),
            cancel_url: format!("{base}/payments/cancel"),
            ipn_url: format!("{base}/payments/ipn"),
            value_a: order_id.to_string(),
            value_b: buyer.to_string(),
            value_c: encode(&command.lines)?,
            value_d: encode(&command.shipping_address)?,
        })
    }

    /// Reserve, persist a pending online order and open a gateway session.
    ///
    /// A definite gateway failure cancels the order (releasing its stock). A
    /// timeout or lost response leaves it pending with stock held; the IPN or
    /// the stale-session sweep resolves it later.
    #[instrument(skip(self, request), fields(user = %buyer), err)]
    pub async fn initiate(&self, buyer: UserId, request: CheckoutRequest) -> CommerceResult<PaymentSession> {
        let lines = self.orders.resolve_lines(buyer, &request.source)?;
        let now = Utc::now();
        let order_id = OrderId::generate();
        let transaction_id = online_transaction_id(order_id, now);

        let command = PlaceOrder {
            order_id,
            buyer_id: buyer,
            lines,
            shipping_address: request.shipping_address,
            payment_method: PaymentMethod::OnlinePayment,
            transaction_id: transaction_id.clone(),
            occurred_at: now,
        };
        let session_request = self.session_request(order_id, buyer, &transaction_id, &command)?;

        self.orders.reserve_and_place(command).await?;
        info!(order = %order_id, %transaction_id, "online order placed, opening gateway session");

        match self.gateway.init_session(&session_request).await {
            Ok(session) => {
                self.orders.carts().clear_after_checkout(buyer).await;
                Ok(PaymentSession {
                    order_id,
                    transaction_id,
                    redirect_url: session.redirect_url,
                })
            }
            Err(err) if err.outcome_known() => {
                warn!(order = %order_id, "gateway refused session, failing order: {err}");
                self.apply_payment_outcome(order_id, PaymentOutcome::Failed).await?;
                Err(CommerceError::gateway(&err))
            }
            Err(err) => {
                warn!(order = %order_id, "gateway outcome unknown, order left pending: {err}");
                self.orders.carts().clear_after_checkout(buyer).await;
                Err(CommerceError::gateway(&err))
            }
        }
    }

    /// The single transition every completion channel goes through.
    #[instrument(skip(self), err)]
    pub async fn apply_payment_outcome(
        &self,
        order_id: OrderId,
        outcome: PaymentOutcome,
    ) -> CommerceResult<Order> {
        let committed = self
            .orders
            .transition(
                order_id,
                OrderCommand::ApplyPaymentOutcome(ApplyPaymentOutcome {
                    outcome,
                    occurred_at: Utc::now(),
                }),
            )
            .await?;

        if committed.events.is_empty() {
            info!(order = %order_id, ?outcome, "payment outcome already applied");
        } else {
            info!(
                order = %order_id,
                ?outcome,
                status = %committed.record.status(),
                "payment outcome applied"
            );
        }
        Ok(committed.record)
    }

    /// Find the order a callback refers to and check the transaction id.
    ///
    /// Every channel must echo the order's `tran_id`; an order id alone is not
    /// enough to settle it. The order id travels in `value_a`; if that is
    /// missing it is recovered from the `<order_id>_<timestamp>` transaction id.
    fn resolve_callback(&self, tran_id: &str, value_a: &str) -> CommerceResult<OrderId> {
        let tran_id = tran_id.trim();
        if tran_id.is_empty() {
            return Err(CommerceError::invalid_input("tran_id is required"));
        }
        let raw = if value_a.trim().is_empty() {
            tran_id.split_once('_').map(|(id, _)| id).unwrap_or(tran_id)
        } else {
            value_a.trim()
        };
        let order_id: OrderId = raw
            .parse()
            .map_err(|_| CommerceError::invalid_input("callback does not identify an order"))?;

        let order = self
            .orders
            .load(order_id)?
            .filter(Order::is_placed)
            .ok_or_else(|| CommerceError::not_found("order"))?;

        if order.transaction_id() != tran_id {
            return Err(CommerceError::invalid_input(
                "transaction id does not match the order",
            ));
        }
        Ok(order_id)
    }

    async fn redirect(&self, form: &GatewayRedirect, outcome: PaymentOutcome) -> CommerceResult<Order> {
        let order_id = self.resolve_callback(&form.tran_id, &form.value_a)?;
        self.apply_payment_outcome(order_id, outcome).await
    }

    pub async fn payment_success(&self, form: &GatewayRedirect) -> CommerceResult<Order> {
        self.redirect(form, PaymentOutcome::Paid).await
    }

    pub async fn payment_failure(&self, form: &GatewayRedirect) -> CommerceResult<Order> {
        self.redirect(form, PaymentOutcome::Failed).await
    }

    pub async fn payment_cancel(&self, form: &GatewayRedirect) -> CommerceResult<Order> {
        self.redirect(form, PaymentOutcome::Cancelled).await
    }

    /// Asynchronous notification from the gateway.
    #[instrument(skip(self, ipn), fields(tran_id = %ipn.tran_id, status = %ipn.status), err)]
    pub async fn payment_ipn(&self, ipn: &IpnNotification) -> CommerceResult<Order> {
        let outcome = outcome_from_ipn_status(&ipn.status).ok_or_else(|| {
            CommerceError::invalid_input(format!("unknown payment status {:?}", ipn.status))
        })?;
        let order_id = self.resolve_callback(&ipn.tran_id, &ipn.value_a)?;
        self.apply_payment_outcome(order_id, outcome).await
    }

    /// Cancel online orders whose session never resolved within `ttl`.
    /// Returns how many this call cancelled.
    #[instrument(skip(self), err)]
    pub async fn expire_stale_sessions(&self, ttl: Duration, now: DateTime<Utc>) -> CommerceResult<usize> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CommerceError::invalid_input(format!("session ttl out of range: {e}")))?;
        let cutoff = now - ttl;

        let mut expired = 0;
        for order_id in self.orders.stale_sessions(cutoff)? {
            let committed = self
                .orders
                .transition(
                    order_id,
                    OrderCommand::ApplyPaymentOutcome(ApplyPaymentOutcome {
                        outcome: PaymentOutcome::Cancelled,
                        occurred_at: now,
                    }),
                )
                .await;
            match committed {
                Ok(c) if !c.events.is_empty() => expired += 1,
                Ok(_) => {}
                // Paid by a racing callback in the meantime.
                Err(CommerceError::InvalidState(_)) => {}
                Err(err) => return Err(err),
            }
        }

        if expired > 0 {
            info!(expired, "stale payment sessions cancelled");
        }
        Ok(expired)
    }
}
