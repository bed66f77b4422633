use axum::{Router, routing::get};

pub mod cart;
pub mod common;
pub mod orders;
pub mod payments;
pub mod products;
pub mod rentals;
pub mod system;

/// Router for all bearer-authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/products", products::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/rentals", rentals::router())
        .merge(payments::checkout_router())
}
