//! Orders domain module.
//!
//! Business rules for orders and their payment state, implemented as
//! deterministic domain logic (no IO, no HTTP, no storage). Stock effects are
//! expressed as events; the infra layer performs the actual ledger calls.

pub mod order;

pub use order::{
    ApplyPaymentOutcome, CancelByBuyer, CancelReason, ChangeStatus, Order, OrderCancelled,
    OrderCommand, OrderEvent, OrderId, OrderLine, OrderPlaced, OrderStatus, OrderStatusChanged,
    PaymentConfirmed, PaymentMethod, PaymentOutcome, PaymentStatus, PlaceOrder, ShippingAddress,
    cod_transaction_id, online_transaction_id, order_total,
};
