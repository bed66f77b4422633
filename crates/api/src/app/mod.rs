//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: backend selection (ledger, gateway) from configuration
//! - `background.rs`: audit log subscriber and the payment session sweeper
//! - `routes/`: HTTP handlers, one file per area
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::auth::Hs256JwtValidator;
use crate::middleware;

pub mod background;
pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, BuildError, build_services};

/// Build the full HTTP router.
pub fn build_app(services: Arc<AppServices>, jwt_secret: &str) -> Router {
    let jwt = Arc::new(Hs256JwtValidator::new(jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Bearer-authenticated routes.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    // Gateway callbacks are unauthenticated form posts.
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::payments::callback_router())
        .merge(protected)
        .layer(Extension(services))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
