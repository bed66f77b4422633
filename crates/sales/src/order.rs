use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_catalog::ProductId;
use stockyard_core::{Aggregate, AggregateRoot, DomainError, UserId, typed_id};
use stockyard_events::Event;

typed_id!(OrderId);

/// Fulfillment lifecycle. Forward-only; `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Position along the fulfillment path. `Cancelled` sits outside it.
    fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Processing => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::invalid_state(format!(
                "unknown order status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    OnlinePayment,
}

/// Result reported by any payment completion channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Paid,
    Failed,
    Cancelled,
}

/// Who drove an order into `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    Seller,
    Buyer,
    PaymentFailed,
    PaymentCancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl ShippingAddress {
    fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            ("recipient", &self.recipient),
            ("phone", &self.phone),
            ("street", &self.street),
            ("city", &self.city),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::invalid_input(format!(
                    "shipping address {field} is required"
                )));
            }
        }
        Ok(())
    }
}

/// Immutable order line snapshot taken at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub quantity: u32,
    /// Price in smallest currency unit.
    pub unit_price: u64,
}

impl OrderLine {
    pub fn line_total(&self) -> Result<u64, DomainError> {
        u64::from(self.quantity)
            .checked_mul(self.unit_price)
            .ok_or_else(|| {
                DomainError::invalid_input(format!(
                    "line total for product {} overflows",
                    self.product_id
                ))
            })
    }
}

/// Sum of the line totals, or `InvalidInput` if it does not fit.
pub fn order_total(lines: &[OrderLine]) -> Result<u64, DomainError> {
    lines.iter().try_fold(0u64, |total, line| {
        total
            .checked_add(line.line_total()?)
            .ok_or_else(|| DomainError::invalid_input("order total overflows"))
    })
}

/// Synthetic transaction id for cash orders: `COD_<timestamp_ms>_<user>`.
pub fn cod_transaction_id(at: DateTime<Utc>, buyer: UserId) -> String {
    format!("COD_{}_{}", at.timestamp_millis(), buyer)
}

/// Gateway transaction id for online orders: `<order_id>_<timestamp_ms>`.
pub fn online_transaction_id(order_id: OrderId, at: DateTime<Utc>) -> String {
    format!("{}_{}", order_id, at.timestamp_millis())
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    buyer_id: Option<UserId>,
    lines: Vec<OrderLine>,
    total_price: u64,
    payment_method: PaymentMethod,
    status: OrderStatus,
    payment_status: PaymentStatus,
    transaction_id: String,
    shipping_address: Option<ShippingAddress>,
    paid_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-placed order instance.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            buyer_id: None,
            lines: Vec::new(),
            total_price: 0,
            payment_method: PaymentMethod::CashOnDelivery,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            transaction_id: String::new(),
            shipping_address: None,
            paid_at: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_price(&self) -> u64 {
        self.total_price
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn shipping_address(&self) -> Option<&ShippingAddress> {
        self.shipping_address.as_ref()
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn is_placed(&self) -> bool {
        self.created
    }

    pub fn is_buyer(&self, user: UserId) -> bool {
        self.buyer_id == Some(user)
    }

    /// Seller of at least one line.
    pub fn is_seller(&self, user: UserId) -> bool {
        self.lines.iter().any(|l| l.seller_id == user)
    }

    pub fn is_party(&self, user: UserId) -> bool {
        self.is_buyer(user) || self.is_seller(user)
    }

    /// Online order whose gateway session never resolved.
    pub fn awaiting_payment(&self) -> bool {
        self.created
            && self.payment_method == PaymentMethod::OnlinePayment
            && self.status == OrderStatus::Pending
            && self.payment_status == PaymentStatus::Pending
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder. Stock for `lines` must already be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub transaction_id: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus (seller-driven fulfillment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub actor: UserId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelByBuyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelByBuyer {
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyPaymentOutcome. Every payment channel funnels into this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPaymentOutcome {
    pub outcome: PaymentOutcome,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    ChangeStatus(ChangeStatus),
    CancelByBuyer(CancelByBuyer),
    ApplyPaymentOutcome(ApplyPaymentOutcome),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub lines: Vec<OrderLine>,
    pub total_price: u64,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub transaction_id: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStatusChanged (forward move along the fulfillment path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
///
/// Emitted only on the transition into `Cancelled`; `restock` lists the
/// quantities the committer must hand back to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub reason: CancelReason,
    pub payment_status: PaymentStatus,
    pub restock: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderStatusChanged(OrderStatusChanged),
    PaymentConfirmed(PaymentConfirmed),
    OrderCancelled(OrderCancelled),
}

impl OrderEvent {
    /// Lines to release if this event is a cancellation.
    pub fn restock(&self) -> Option<&[OrderLine]> {
        match self {
            OrderEvent::OrderCancelled(e) => Some(&e.restock),
            _ => None,
        }
    }
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "sales.order.placed",
            OrderEvent::OrderStatusChanged(_) => "sales.order.status_changed",
            OrderEvent::PaymentConfirmed(_) => "sales.order.payment_confirmed",
            OrderEvent::OrderCancelled(_) => "sales.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderStatusChanged(e) => e.occurred_at,
            OrderEvent::PaymentConfirmed(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.buyer_id = Some(e.buyer_id);
                self.lines = e.lines.clone();
                self.total_price = e.total_price;
                self.shipping_address = Some(e.shipping_address.clone());
                self.payment_method = e.payment_method;
                self.transaction_id = e.transaction_id.clone();
                self.status = OrderStatus::Pending;
                self.payment_status = PaymentStatus::Pending;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::OrderStatusChanged(e) => {
                self.status = e.to;
            }
            OrderEvent::PaymentConfirmed(e) => {
                self.status = e.status;
                self.payment_status = PaymentStatus::Paid;
                self.paid_at = Some(e.occurred_at);
            }
            OrderEvent::OrderCancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.payment_status = e.payment_status;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            OrderCommand::CancelByBuyer(cmd) => self.handle_cancel_by_buyer(cmd),
            OrderCommand::ApplyPaymentOutcome(cmd) => self.handle_payment_outcome(cmd),
        }
    }
}

impl Order {
    fn ensure_placed(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("order"));
        }
        Ok(())
    }

    fn cancelled(&self, reason: CancelReason, payment_status: PaymentStatus, at: DateTime<Utc>) -> OrderEvent {
        OrderEvent::OrderCancelled(OrderCancelled {
            order_id: self.id,
            reason,
            payment_status,
            restock: self.lines.clone(),
            occurred_at: at,
        })
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::invalid_input("order needs at least one line"));
        }
        if cmd.lines.iter().any(|l| l.quantity == 0) {
            return Err(DomainError::invalid_input("line quantity must be at least 1"));
        }
        cmd.shipping_address.validate()?;

        let total_price = order_total(&cmd.lines)?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            buyer_id: cmd.buyer_id,
            lines: cmd.lines.clone(),
            total_price,
            shipping_address: cmd.shipping_address.clone(),
            payment_method: cmd.payment_method,
            transaction_id: cmd.transaction_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        if !self.is_seller(cmd.actor) {
            return Err(DomainError::Unauthorized);
        }

        if cmd.status == self.status {
            return Ok(vec![]);
        }
        if self.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "order is already {}",
                self.status
            )));
        }

        if cmd.status == OrderStatus::Cancelled {
            return Ok(vec![self.cancelled(
                CancelReason::Seller,
                self.payment_status,
                cmd.occurred_at,
            )]);
        }

        match (self.status.rank(), cmd.status.rank()) {
            (Some(from), Some(to)) if to > from => {}
            _ => {
                return Err(DomainError::invalid_state(format!(
                    "cannot move order from {} to {}",
                    self.status, cmd.status
                )));
            }
        }

        Ok(vec![OrderEvent::OrderStatusChanged(OrderStatusChanged {
            order_id: self.id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel_by_buyer(&self, cmd: &CancelByBuyer) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        if !self.is_buyer(cmd.actor) {
            return Err(DomainError::Unauthorized);
        }

        match self.status {
            OrderStatus::Cancelled => Ok(vec![]),
            OrderStatus::Pending => {
                let payment_status = match self.payment_status {
                    PaymentStatus::Pending => PaymentStatus::Cancelled,
                    other => other,
                };
                Ok(vec![self.cancelled(
                    CancelReason::Buyer,
                    payment_status,
                    cmd.occurred_at,
                )])
            }
            other => Err(DomainError::invalid_state(format!(
                "buyer can only cancel a pending order (order is {other})"
            ))),
        }
    }

    fn handle_payment_outcome(
        &self,
        cmd: &ApplyPaymentOutcome,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        if self.payment_method != PaymentMethod::OnlinePayment {
            return Err(DomainError::invalid_state(
                "payment outcomes apply to online orders only",
            ));
        }

        match cmd.outcome {
            PaymentOutcome::Paid => {
                if self.payment_status == PaymentStatus::Paid {
                    return Ok(vec![]);
                }
                if self.status == OrderStatus::Cancelled {
                    return Err(DomainError::invalid_state(
                        "cannot mark a cancelled order as paid",
                    ));
                }
                let status = match self.status {
                    OrderStatus::Pending => OrderStatus::Processing,
                    other => other,
                };
                Ok(vec![OrderEvent::PaymentConfirmed(PaymentConfirmed {
                    order_id: self.id,
                    status,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PaymentOutcome::Failed | PaymentOutcome::Cancelled => {
                if self.status == OrderStatus::Cancelled {
                    return Ok(vec![]);
                }
                if self.payment_status == PaymentStatus::Paid {
                    return Err(DomainError::invalid_state("order is already paid"));
                }
                let (reason, payment_status) = if cmd.outcome == PaymentOutcome::Failed {
                    (CancelReason::PaymentFailed, PaymentStatus::Failed)
                } else {
                    (CancelReason::PaymentCancelled, PaymentStatus::Cancelled)
                };
                Ok(vec![self.cancelled(reason, payment_status, cmd.occurred_at)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            recipient: "Rahim".into(),
            phone: "01700000000".into(),
            street: "12 Lake Road".into(),
            city: "Dhaka".into(),
            postal_code: "1207".into(),
            country: "BD".into(),
        }
    }

    struct Fixture {
        order: Order,
        buyer: UserId,
        seller: UserId,
    }

    fn placed(method: PaymentMethod) -> Fixture {
        let buyer = UserId::new();
        let seller = UserId::new();
        let order_id = OrderId::generate();
        let mut order = Order::empty(order_id);
        let events = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                buyer_id: buyer,
                lines: vec![
                    OrderLine {
                        product_id: ProductId::generate(),
                        seller_id: seller,
                        quantity: 2,
                        unit_price: 300,
                    },
                    OrderLine {
                        product_id: ProductId::generate(),
                        seller_id: seller,
                        quantity: 1,
                        unit_price: 50,
                    },
                ],
                shipping_address: address(),
                payment_method: method,
                transaction_id: "tx".into(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order.apply(&events[0]);
        Fixture {
            order,
            buyer,
            seller,
        }
    }

    fn run(order: &mut Order, cmd: OrderCommand) -> Result<Vec<OrderEvent>, DomainError> {
        let events = order.handle(&cmd)?;
        for e in &events {
            order.apply(e);
        }
        Ok(events)
    }

    fn set_status(actor: UserId, status: OrderStatus) -> OrderCommand {
        OrderCommand::ChangeStatus(ChangeStatus {
            actor,
            status,
            occurred_at: Utc::now(),
        })
    }

    fn outcome(outcome: PaymentOutcome) -> OrderCommand {
        OrderCommand::ApplyPaymentOutcome(ApplyPaymentOutcome {
            outcome,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn place_order_computes_total_and_starts_pending() {
        let f = placed(PaymentMethod::CashOnDelivery);
        assert_eq!(f.order.total_price(), 650);
        assert_eq!(f.order.status(), OrderStatus::Pending);
        assert_eq!(f.order.payment_status(), PaymentStatus::Pending);
        assert!(f.order.is_buyer(f.buyer));
        assert!(f.order.is_seller(f.seller));
    }

    #[test]
    fn totals_that_do_not_fit_are_invalid_input() {
        let line = |quantity, unit_price| OrderLine {
            product_id: ProductId::generate(),
            seller_id: UserId::new(),
            quantity,
            unit_price,
        };
        assert!(matches!(
            line(2, u64::MAX / 2 + 1).line_total(),
            Err(DomainError::InvalidInput(_))
        ));
        assert!(matches!(
            order_total(&[line(1, u64::MAX), line(1, 1)]),
            Err(DomainError::InvalidInput(_))
        ));
        assert_eq!(order_total(&[line(2, 300), line(1, 50)]).unwrap(), 650);

        let order_id = OrderId::generate();
        let err = Order::empty(order_id)
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                buyer_id: UserId::new(),
                lines: vec![line(3, u64::MAX / 2)],
                shipping_address: address(),
                payment_method: PaymentMethod::CashOnDelivery,
                transaction_id: "tx".into(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn empty_lines_are_rejected() {
        let order_id = OrderId::generate();
        let err = Order::empty(order_id)
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                buyer_id: UserId::new(),
                lines: vec![],
                shipping_address: address(),
                payment_method: PaymentMethod::CashOnDelivery,
                transaction_id: "tx".into(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn seller_moves_order_forward() {
        let mut f = placed(PaymentMethod::CashOnDelivery);
        run(&mut f.order, set_status(f.seller, OrderStatus::Processing)).unwrap();
        run(&mut f.order, set_status(f.seller, OrderStatus::Delivered)).unwrap();
        assert_eq!(f.order.status(), OrderStatus::Delivered);

        let err = run(&mut f.order, set_status(f.seller, OrderStatus::Cancelled)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn backwards_transition_is_invalid_state() {
        let mut f = placed(PaymentMethod::CashOnDelivery);
        run(&mut f.order, set_status(f.seller, OrderStatus::Shipped)).unwrap();
        let err = run(&mut f.order, set_status(f.seller, OrderStatus::Processing)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn same_status_is_a_noop() {
        let mut f = placed(PaymentMethod::CashOnDelivery);
        let events = run(&mut f.order, set_status(f.seller, OrderStatus::Pending)).unwrap();
        assert!(events.is_empty());
        assert_eq!(f.order.version(), 1);
    }

    #[test]
    fn only_a_line_seller_may_change_status() {
        let mut f = placed(PaymentMethod::CashOnDelivery);
        let err = run(&mut f.order, set_status(f.buyer, OrderStatus::Shipped)).unwrap_err();
        assert_eq!(err, DomainError::Unauthorized);
    }

    #[test]
    fn unknown_status_string_is_invalid_state() {
        let err = "teleported".parse::<OrderStatus>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
    }

    #[test]
    fn seller_cancel_restocks_once() {
        let mut f = placed(PaymentMethod::CashOnDelivery);
        let first = run(&mut f.order, set_status(f.seller, OrderStatus::Cancelled)).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].restock().map(<[OrderLine]>::len), Some(2));

        let second = run(&mut f.order, set_status(f.seller, OrderStatus::Cancelled)).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn buyer_cancels_only_while_pending() {
        let mut f = placed(PaymentMethod::CashOnDelivery);
        run(&mut f.order, set_status(f.seller, OrderStatus::Processing)).unwrap();
        let err = run(
            &mut f.order,
            OrderCommand::CancelByBuyer(CancelByBuyer {
                actor: f.buyer,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));

        let mut g = placed(PaymentMethod::CashOnDelivery);
        let events = run(
            &mut g.order,
            OrderCommand::CancelByBuyer(CancelByBuyer {
                actor: g.buyer,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert!(events[0].restock().is_some());
        assert_eq!(g.order.status(), OrderStatus::Cancelled);
        assert_eq!(g.order.payment_status(), PaymentStatus::Cancelled);
    }

    #[test]
    fn payment_success_is_idempotent() {
        let mut f = placed(PaymentMethod::OnlinePayment);
        run(&mut f.order, outcome(PaymentOutcome::Paid)).unwrap();
        assert_eq!(f.order.status(), OrderStatus::Processing);
        assert_eq!(f.order.payment_status(), PaymentStatus::Paid);
        let paid_at = f.order.paid_at();
        assert!(paid_at.is_some());

        let again = run(&mut f.order, outcome(PaymentOutcome::Paid)).unwrap();
        assert!(again.is_empty());
        assert_eq!(f.order.paid_at(), paid_at);
    }

    #[test]
    fn failure_then_cancel_releases_once() {
        let mut f = placed(PaymentMethod::OnlinePayment);
        let failed = run(&mut f.order, outcome(PaymentOutcome::Failed)).unwrap();
        assert!(failed[0].restock().is_some());
        assert_eq!(f.order.payment_status(), PaymentStatus::Failed);

        let cancelled = run(&mut f.order, outcome(PaymentOutcome::Cancelled)).unwrap();
        assert!(cancelled.is_empty());
        assert_eq!(f.order.payment_status(), PaymentStatus::Failed);
    }

    #[test]
    fn paid_and_cancelled_do_not_cross() {
        let mut paid = placed(PaymentMethod::OnlinePayment);
        run(&mut paid.order, outcome(PaymentOutcome::Paid)).unwrap();
        assert!(matches!(
            run(&mut paid.order, outcome(PaymentOutcome::Failed)),
            Err(DomainError::InvalidState(_))
        ));

        let mut cancelled = placed(PaymentMethod::OnlinePayment);
        run(&mut cancelled.order, outcome(PaymentOutcome::Cancelled)).unwrap();
        assert!(matches!(
            run(&mut cancelled.order, outcome(PaymentOutcome::Paid)),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn cash_orders_reject_gateway_outcomes() {
        let mut f = placed(PaymentMethod::CashOnDelivery);
        assert!(matches!(
            run(&mut f.order, outcome(PaymentOutcome::Paid)),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn transaction_id_formats() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let user = UserId::new();
        assert_eq!(
            cod_transaction_id(at, user),
            format!("COD_1700000000123_{user}")
        );
        let order_id = OrderId::generate();
        assert_eq!(
            online_transaction_id(order_id, at),
            format!("{order_id}_1700000000123")
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(OrderStatus::Processing).unwrap(),
            "processing"
        );
        assert_eq!(
            serde_json::to_value(PaymentMethod::CashOnDelivery).unwrap(),
            "cash_on_delivery"
        );
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn outcome_strategy() -> impl Strategy<Value = PaymentOutcome> {
            prop_oneof![
                Just(PaymentOutcome::Paid),
                Just(PaymentOutcome::Failed),
                Just(PaymentOutcome::Cancelled),
            ]
        }

        proptest! {
            /// Property: however payment outcomes interleave, at most one
            /// cancellation (and therefore one restock) is ever emitted.
            #[test]
            fn at_most_one_restock(outcomes in proptest::collection::vec(outcome_strategy(), 1..12)) {
                let mut f = placed(PaymentMethod::OnlinePayment);
                let mut restocks = 0;
                for o in outcomes {
                    if let Ok(events) = run(&mut f.order, outcome(o)) {
                        restocks += events.iter().filter(|e| e.restock().is_some()).count();
                    }
                }
                prop_assert!(restocks <= 1);
                if f.order.status() == OrderStatus::Cancelled {
                    prop_assert_eq!(restocks, 1);
                }
            }
        }
    }
}
