//! Online checkout and the gateway's completion callbacks.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::Extension,
    http::StatusCode,
    routing::post,
};

use stockyard_infra::error::CommerceResult;
use stockyard_infra::gateway::{GatewayRedirect, IpnNotification};
use stockyard_sales::Order;

use crate::app::routes::common::respond;
use crate::app::{AppServices, dto};
use crate::context::UserContext;

/// `POST /payments`, bearer-authenticated.
pub fn checkout_router() -> Router {
    Router::new().route("/payments", post(initiate_payment))
}

/// Gateway callbacks: unauthenticated form posts.
pub fn callback_router() -> Router {
    Router::new()
        .route("/payments/success", post(payment_success))
        .route("/payments/fail", post(payment_fail))
        .route("/payments/cancel", post(payment_cancel))
        .route("/payments/ipn", post(payment_ipn))
}

fn outcome(result: CommerceResult<Order>) -> CommerceResult<dto::OrderResponse> {
    result.map(|o| dto::OrderResponse::from(&o))
}

pub async fn initiate_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<dto::CheckoutBody>,
) -> axum::response::Response {
    let request = match body.into_request() {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let result = services
        .commerce
        .payments
        .initiate(user.user_id(), request)
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn payment_success(
    Extension(services): Extension<Arc<AppServices>>,
    Form(form): Form<GatewayRedirect>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        outcome(services.commerce.payments.payment_success(&form).await),
    )
}

pub async fn payment_fail(
    Extension(services): Extension<Arc<AppServices>>,
    Form(form): Form<GatewayRedirect>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        outcome(services.commerce.payments.payment_failure(&form).await),
    )
}

pub async fn payment_cancel(
    Extension(services): Extension<Arc<AppServices>>,
    Form(form): Form<GatewayRedirect>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        outcome(services.commerce.payments.payment_cancel(&form).await),
    )
}

pub async fn payment_ipn(
    Extension(services): Extension<Arc<AppServices>>,
    Form(form): Form<IpnNotification>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        outcome(services.commerce.payments.payment_ipn(&form).await),
    )
}
