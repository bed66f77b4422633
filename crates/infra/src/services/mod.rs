//! Commerce services: the async boundary between HTTP handlers and the
//! domain aggregates.
//!
//! Each service loads/decides/commits through a [`RecordDispatcher`] and owns
//! the stock side effects of what it commits. Stock is only ever touched
//! through the [`StockLedger`]; releases are driven by the events a dispatch
//! returns, so a transition that lost a race never releases anything.

pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod rentals;

use std::sync::Arc;

use serde_json::Value as JsonValue;

use stockyard_cart::{Cart, CartId};
use stockyard_events::{EventEnvelope, InMemoryEventBus};
use stockyard_rentals::{Rental, RentalId};
use stockyard_sales::{Order, OrderId};

use crate::catalog::{InMemoryProductCatalog, ProductCatalog};
use crate::config::AppConfig;
use crate::dispatcher::RecordDispatcher;
use crate::gateway::PaymentGateway;
use crate::ledger::{InMemoryStockLedger, StockLedger};
use crate::store::{InMemoryRecordStore, RecordStore};

pub use cart::{CartLineView, CartService, CartView};
pub use catalog::{CatalogService, ProductView, RegisterProduct, UpdatePrices};
pub use orders::{CheckoutRequest, CheckoutSource, OrderItemRequest, OrderService};
pub use payments::{PaymentService, PaymentSession, PaymentSettings};
pub use rentals::{CreateRental, RentalService};

pub type SharedBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type SharedLedger = Arc<dyn StockLedger>;
pub type SharedCatalog = Arc<dyn ProductCatalog>;
pub type SharedGateway = Arc<dyn PaymentGateway>;

pub type CartDispatcher = Arc<RecordDispatcher<Arc<dyn RecordStore<CartId, Cart>>, SharedBus>>;
pub type OrderDispatcher = Arc<RecordDispatcher<Arc<dyn RecordStore<OrderId, Order>>, SharedBus>>;
pub type RentalDispatcher =
    Arc<RecordDispatcher<Arc<dyn RecordStore<RentalId, Rental>>, SharedBus>>;

pub(crate) const CART_AGGREGATE: &str = "commerce.cart";
pub(crate) const ORDER_AGGREGATE: &str = "sales.order";
pub(crate) const RENTAL_AGGREGATE: &str = "rentals.rental";

/// All services over one set of shared backends.
#[derive(Clone)]
pub struct CommerceServices {
    pub catalog: CatalogService,
    pub carts: CartService,
    pub orders: OrderService,
    pub rentals: RentalService,
    pub payments: PaymentService,
    pub bus: SharedBus,
}

impl CommerceServices {
    /// Wire services over the given ledger and gateway. Records (carts,
    /// orders, rentals) and the catalog live in memory.
    pub fn new(
        ledger: SharedLedger,
        gateway: SharedGateway,
        settings: PaymentSettings,
    ) -> Self {
        let bus: SharedBus = Arc::new(InMemoryEventBus::new());
        let catalog: SharedCatalog = Arc::new(InMemoryProductCatalog::new());

        let cart_store: Arc<dyn RecordStore<CartId, Cart>> = Arc::new(InMemoryRecordStore::new());
        let order_store: Arc<dyn RecordStore<OrderId, Order>> =
            Arc::new(InMemoryRecordStore::new());
        let rental_store: Arc<dyn RecordStore<RentalId, Rental>> =
            Arc::new(InMemoryRecordStore::new());

        let cart_dispatcher: CartDispatcher =
            Arc::new(RecordDispatcher::new(cart_store, bus.clone()));
        let order_dispatcher: OrderDispatcher =
            Arc::new(RecordDispatcher::new(order_store, bus.clone()));
        let rental_dispatcher: RentalDispatcher =
            Arc::new(RecordDispatcher::new(rental_store, bus.clone()));

        let carts = CartService::new(cart_dispatcher, catalog.clone(), ledger.clone());
        let orders = OrderService::new(
            order_dispatcher,
            carts.clone(),
            catalog.clone(),
            ledger.clone(),
        );
        let payments = PaymentService::new(orders.clone(), gateway, settings);

        Self {
            catalog: CatalogService::new(catalog.clone(), ledger.clone()),
            carts,
            orders,
            rentals: RentalService::new(rental_dispatcher, catalog, ledger),
            payments,
            bus,
        }
    }

    /// Everything in memory (tests, local dev).
    pub fn in_memory(gateway: SharedGateway, settings: PaymentSettings) -> Self {
        Self::new(Arc::new(InMemoryStockLedger::new()), gateway, settings)
    }
}

impl PaymentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            public_base_url: config.public_base_url.clone(),
            currency: config.currency.clone(),
        }
    }
}
