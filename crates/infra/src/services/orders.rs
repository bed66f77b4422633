//! Order lifecycle: checkout through the reservation saga, seller-driven
//! fulfillment and buyer cancellation.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info, instrument};

use stockyard_catalog::{PriceMode, Product, ProductId};
use stockyard_core::UserId;
use stockyard_sales::{
    CancelByBuyer, ChangeStatus, Order, OrderCommand, OrderId, OrderLine, OrderStatus,
    PaymentMethod, PlaceOrder, ShippingAddress, cod_transaction_id, order_total,
};

use crate::dispatcher::Committed;
use crate::error::{CommerceError, CommerceResult};
use crate::saga::{ReservationSaga, ReservationStep};

use super::{CartService, ORDER_AGGREGATE, OrderDispatcher, SharedCatalog, SharedLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Where checkout takes its lines from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutSource {
    /// Explicit items, priced at the current purchase price.
    Items(Vec<OrderItemRequest>),
    /// The caller's cart, priced at the snapshot taken when each line was added.
    Cart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub source: CheckoutSource,
    pub shipping_address: ShippingAddress,
}

#[derive(Clone)]
pub struct OrderService {
    dispatcher: OrderDispatcher,
    carts: CartService,
    catalog: SharedCatalog,
    ledger: SharedLedger,
}

impl OrderService {
    pub fn new(
        dispatcher: OrderDispatcher,
        carts: CartService,
        catalog: SharedCatalog,
        ledger: SharedLedger,
    ) -> Self {
        Self {
            dispatcher,
            carts,
            catalog,
            ledger,
        }
    }

    pub(crate) fn carts(&self) -> &CartService {
        &self.carts
    }

    fn product(&self, id: ProductId) -> CommerceResult<Product> {
        self.catalog
            .get(id)?
            .ok_or_else(|| CommerceError::not_found(format!("product {id}")))
    }

    /// Turn a checkout source into priced order lines.
    ///
    /// The order total is checked here, before anything is reserved.
    pub(crate) fn resolve_lines(
        &self,
        buyer: UserId,
        source: &CheckoutSource,
    ) -> CommerceResult<Vec<OrderLine>> {
        let lines = self.price_lines(buyer, source)?;
        order_total(&lines)?;
        Ok(lines)
    }

    fn price_lines(&self, buyer: UserId, source: &CheckoutSource) -> CommerceResult<Vec<OrderLine>> {
        match source {
            CheckoutSource::Items(items) => {
                if items.is_empty() {
                    return Err(CommerceError::invalid_input("order needs at least one item"));
                }
                items
                    .iter()
                    .map(|item| {
                        if item.quantity == 0 {
                            return Err(CommerceError::invalid_input(
                                "quantity must be at least 1",
                            ));
                        }
                        let product = self.product(item.product_id)?;
                        Ok(OrderLine {
                            product_id: product.id,
                            seller_id: product.seller_id,
                            quantity: item.quantity,
                            unit_price: product.unit_price(PriceMode::Purchase)?,
                        })
                    })
                    .collect()
            }
            CheckoutSource::Cart => {
                let cart = self
                    .carts
                    .load(buyer)?
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| CommerceError::invalid_input("cart is empty"))?;
                if cart.items().iter().any(|i| i.is_rental) {
                    return Err(CommerceError::invalid_input(
                        "cart holds rental items; rent them through /rentals",
                    ));
                }
                cart.items()
                    .iter()
                    .map(|item| {
                        let product = self.product(item.product_id)?;
                        Ok(OrderLine {
                            product_id: item.product_id,
                            seller_id: product.seller_id,
                            quantity: item.quantity,
                            unit_price: item.unit_price,
                        })
                    })
                    .collect()
            }
        }
    }

    /// Reserve every line and persist the order. Either both happen or
    /// neither does: a failed write releases what was reserved.
    pub(crate) async fn reserve_and_place(&self, command: PlaceOrder) -> CommerceResult<Order> {
        let steps = command
            .lines
            .iter()
            .map(|l| ReservationStep {
                product: l.product_id,
                quantity: l.quantity,
            })
            .collect();
        let mut saga = ReservationSaga::new(self.ledger.clone());
        saga.reserve_all(steps).await?;

        let order_id = command.order_id;
        match self.dispatcher.dispatch(
            ORDER_AGGREGATE,
            order_id,
            &OrderCommand::PlaceOrder(command),
            || Order::empty(order_id),
        ) {
            Ok(committed) => {
                saga.commit();
                Ok(committed.record)
            }
            Err(err) => {
                saga.compensate().await;
                Err(err.into())
            }
        }
    }

    /// Commit a transition and release whatever the committed events restock.
    pub(crate) async fn transition(
        &self,
        order_id: OrderId,
        command: OrderCommand,
    ) -> CommerceResult<Committed<Order>> {
        let committed = self.dispatcher.dispatch(
            ORDER_AGGREGATE,
            order_id,
            &command,
            || Order::empty(order_id),
        )?;

        for event in &committed.events {
            let Some(lines) = event.restock() else {
                continue;
            };
            for line in lines {
                if let Err(err) = self.ledger.release(line.product_id, line.quantity).await {
                    error!(
                        order = %order_id,
                        product = %line.product_id,
                        quantity = line.quantity,
                        "restock after cancellation failed: {err}"
                    );
                }
            }
            info!(order = %order_id, lines = lines.len(), "order cancelled, stock released");
        }

        Ok(committed)
    }

    /// Cash-on-delivery checkout.
    #[instrument(skip(self, request), fields(user = %buyer), err)]
    pub async fn create_order(&self, buyer: UserId, request: CheckoutRequest) -> CommerceResult<Order> {
        let lines = self.resolve_lines(buyer, &request.source)?;
        let now = Utc::now();
        let order_id = OrderId::generate();

        let order = self
            .reserve_and_place(PlaceOrder {
                order_id,
                buyer_id: buyer,
                lines,
                shipping_address: request.shipping_address,
                payment_method: PaymentMethod::CashOnDelivery,
                transaction_id: cod_transaction_id(now, buyer),
                occurred_at: now,
            })
            .await?;

        self.carts.clear_after_checkout(buyer).await;
        info!(order = %order_id, total = order.total_price(), "cash order placed");
        Ok(order)
    }

    /// Seller-driven status change. `status` is the raw requested value.
    #[instrument(skip(self), fields(user = %actor), err)]
    pub async fn update_status(
        &self,
        actor: UserId,
        order_id: OrderId,
        status: &str,
    ) -> CommerceResult<Order> {
        let status: OrderStatus = status.parse()?;
        let committed = self
            .transition(
                order_id,
                OrderCommand::ChangeStatus(ChangeStatus {
                    actor,
                    status,
                    occurred_at: Utc::now(),
                }),
            )
            .await?;
        if !committed.events.is_empty() {
            info!(order = %order_id, %status, "order status changed");
        }
        Ok(committed.record)
    }

    #[instrument(skip(self), fields(user = %buyer), err)]
    pub async fn cancel_order(&self, buyer: UserId, order_id: OrderId) -> CommerceResult<Order> {
        let committed = self
            .transition(
                order_id,
                OrderCommand::CancelByBuyer(CancelByBuyer {
                    actor: buyer,
                    occurred_at: Utc::now(),
                }),
            )
            .await?;
        Ok(committed.record)
    }

    pub(crate) fn load(&self, order_id: OrderId) -> CommerceResult<Option<Order>> {
        Ok(self.dispatcher.load::<Order>(&order_id)?)
    }

    pub(crate) fn all(&self) -> CommerceResult<Vec<Order>> {
        Ok(self.dispatcher.store().list()?)
    }

    fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        orders
    }

    pub async fn user_orders(&self, buyer: UserId) -> CommerceResult<Vec<Order>> {
        let orders = self.all()?.into_iter().filter(|o| o.is_buyer(buyer)).collect();
        Ok(Self::newest_first(orders))
    }

    pub async fn received_orders(&self, seller: UserId) -> CommerceResult<Vec<Order>> {
        let orders = self.all()?.into_iter().filter(|o| o.is_seller(seller)).collect();
        Ok(Self::newest_first(orders))
    }

    pub async fn get_order(&self, actor: UserId, order_id: OrderId) -> CommerceResult<Order> {
        let order = self
            .load(order_id)?
            .filter(Order::is_placed)
            .ok_or_else(|| CommerceError::not_found("order"))?;
        if !order.is_party(actor) {
            return Err(CommerceError::Unauthorized);
        }
        Ok(order)
    }

    /// Online orders still awaiting payment that were placed before `cutoff`.
    pub(crate) fn stale_sessions(&self, cutoff: DateTime<Utc>) -> CommerceResult<Vec<OrderId>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|o| o.awaiting_payment() && o.created_at().is_some_and(|at| at < cutoff))
            .map(|o| o.id_typed())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::gateway::{GatewayError, GatewaySession, PaymentGateway, SessionRequest};
    use crate::services::{CommerceServices, PaymentSettings, RegisterProduct};
    use async_trait::async_trait;

    struct NoGateway;

    #[async_trait]
    impl PaymentGateway for NoGateway {
        async fn init_session(&self, _: &SessionRequest) -> Result<GatewaySession, GatewayError> {
            Err(GatewayError::Unreachable("not wired".into()))
        }
    }

    fn services() -> CommerceServices {
        CommerceServices::in_memory(
            Arc::new(NoGateway),
            PaymentSettings {
                public_base_url: "http://localhost".into(),
                currency: "BDT".into(),
            },
        )
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            recipient: "R".into(),
            phone: "017".into(),
            street: "1 Road".into(),
            city: "Dhaka".into(),
            postal_code: String::new(),
            country: String::new(),
        }
    }

    async fn product(svc: &CommerceServices, seller: UserId, stock: u32) -> ProductId {
        svc.catalog
            .register_product(
                seller,
                RegisterProduct {
                    name: "Kettle".into(),
                    price: Some(250),
                    rent_price: None,
                    stock,
                },
            )
            .await
            .unwrap()
            .product
            .id
    }

    fn items(product_id: ProductId, quantity: u32) -> CheckoutRequest {
        CheckoutRequest {
            source: CheckoutSource::Items(vec![OrderItemRequest {
                product_id,
                quantity,
            }]),
            shipping_address: address(),
        }
    }

    #[tokio::test]
    async fn cash_order_reserves_and_tags_transaction() {
        let svc = services();
        let buyer = UserId::new();
        let p = product(&svc, UserId::new(), 5).await;

        let order = svc.orders.create_order(buyer, items(p, 2)).await.unwrap();

        assert_eq!(order.total_price(), 500);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.transaction_id().starts_with("COD_"));
        assert!(order.transaction_id().ends_with(&buyer.to_string()));
        assert_eq!(svc.catalog.product_view(p).await.unwrap().stock, 3);
    }

    #[tokio::test]
    async fn cart_checkout_uses_snapshot_and_clears_cart() {
        let svc = services();
        let buyer = UserId::new();
        let p = product(&svc, UserId::new(), 5).await;
        svc.carts.add_item(buyer, p, 2, false).await.unwrap();

        let order = svc
            .orders
            .create_order(
                buyer,
                CheckoutRequest {
                    source: CheckoutSource::Cart,
                    shipping_address: address(),
                },
            )
            .await
            .unwrap();

        assert_eq!(order.lines().len(), 1);
        assert!(svc.carts.get(buyer).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn seller_cancel_restocks_once() {
        let svc = services();
        let seller = UserId::new();
        let p = product(&svc, seller, 5).await;
        let order = svc
            .orders
            .create_order(UserId::new(), items(p, 3))
            .await
            .unwrap();
        let id = order.id_typed();

        svc.orders.update_status(seller, id, "cancelled").await.unwrap();
        svc.orders.update_status(seller, id, "cancelled").await.unwrap();

        assert_eq!(svc.catalog.product_view(p).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn status_rules_surface_as_kinds() {
        let svc = services();
        let seller = UserId::new();
        let buyer = UserId::new();
        let p = product(&svc, seller, 5).await;
        let id = svc
            .orders
            .create_order(buyer, items(p, 1))
            .await
            .unwrap()
            .id_typed();

        let err = svc.orders.update_status(buyer, id, "shipped").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = svc.orders.update_status(seller, id, "lost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        svc.orders.update_status(seller, id, "shipped").await.unwrap();
        let err = svc
            .orders
            .update_status(seller, id, "processing")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = svc.orders.cancel_order(buyer, id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn reads_are_limited_to_parties() {
        let svc = services();
        let seller = UserId::new();
        let buyer = UserId::new();
        let p = product(&svc, seller, 5).await;
        let id = svc
            .orders
            .create_order(buyer, items(p, 1))
            .await
            .unwrap()
            .id_typed();

        assert!(svc.orders.get_order(seller, id).await.is_ok());
        assert_eq!(
            svc.orders.get_order(UserId::new(), id).await.unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(svc.orders.user_orders(buyer).await.unwrap().len(), 1);
        assert_eq!(svc.orders.received_orders(seller).await.unwrap().len(), 1);
        assert!(svc.orders.received_orders(buyer).await.unwrap().is_empty());
    }
}
