use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_catalog::ProductId;
use stockyard_core::UserId;
use stockyard_infra::services::{CheckoutRequest, CheckoutSource, OrderItemRequest};
use stockyard_rentals::{Rental, RentalDuration, RentalPaymentStatus, RentalStatus};
use stockyard_sales::{
    Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    pub name: String,
    pub price: Option<u64>,
    pub rent_price: Option<u64>,
    pub stock: u32,
}

/// Body of `PATCH /products/:id`: the full new offer.
#[derive(Debug, Deserialize)]
pub struct UpdatePricesRequest {
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default)]
    pub rent_price: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub is_rental: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemBody {
    pub product_id: String,
    pub quantity: u32,
}

/// Body of `POST /orders` and `POST /payments`. Without `items` the
/// caller's cart is checked out.
#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    #[serde(default)]
    pub items: Option<Vec<OrderItemBody>>,
    pub shipping_address: ShippingAddress,
}

impl CheckoutBody {
    pub fn into_request(self) -> Result<CheckoutRequest, axum::response::Response> {
        let source = match self.items {
            None => CheckoutSource::Cart,
            Some(items) => CheckoutSource::Items(
                items
                    .into_iter()
                    .map(|item| {
                        Ok(OrderItemRequest {
                            product_id: errors::parse_id(&item.product_id, "product")?,
                            quantity: item.quantity,
                        })
                    })
                    .collect::<Result<_, axum::response::Response>>()?,
            ),
        };
        Ok(CheckoutRequest {
            source,
            shipping_address: self.shipping_address,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRentalRequest {
    pub product_id: String,
    pub duration: RentalDuration,
}

#[derive(Debug, Deserialize)]
pub struct ExtendRentalRequest {
    pub duration: RentalDuration,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub buyer_id: Option<UserId>,
    pub lines: Vec<OrderLine>,
    pub total_price: u64,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub transaction_id: String,
    pub shipping_address: Option<ShippingAddress>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id_typed().to_string(),
            buyer_id: order.buyer_id(),
            lines: order.lines().to_vec(),
            total_price: order.total_price(),
            payment_method: order.payment_method(),
            status: order.status(),
            payment_status: order.payment_status(),
            transaction_id: order.transaction_id().to_string(),
            shipping_address: order.shipping_address().cloned(),
            paid_at: order.paid_at(),
            created_at: order.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RentalResponse {
    pub id: String,
    pub product_id: ProductId,
    pub renter_id: UserId,
    pub seller_id: UserId,
    pub duration: RentalDuration,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub daily_rate: u64,
    pub total_price: u64,
    pub status: RentalStatus,
    pub payment_status: RentalPaymentStatus,
    pub returned_at: Option<DateTime<Utc>>,
    pub late_fees: u64,
}

impl From<&Rental> for RentalResponse {
    fn from(rental: &Rental) -> Self {
        Self {
            id: rental.id_typed().to_string(),
            product_id: rental.product_id(),
            renter_id: rental.renter_id(),
            seller_id: rental.seller_id(),
            duration: rental.duration(),
            start_date: rental.start_date(),
            end_date: rental.end_date(),
            daily_rate: rental.daily_rate(),
            total_price: rental.total_price(),
            status: rental.status(),
            payment_status: rental.payment_status(),
            returned_at: rental.returned_at(),
            late_fees: rental.late_fees(),
        }
    }
}
