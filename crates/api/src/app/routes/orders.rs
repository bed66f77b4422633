use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, patch, post},
};

use stockyard_infra::error::CommerceResult;
use stockyard_sales::{Order, OrderId};

use crate::app::routes::common::respond;
use crate::app::{AppServices, dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order))
        .route("/mine", get(my_orders))
        .route("/received", get(received_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", patch(update_status))
        .route("/:id/cancel", post(cancel_order))
}

fn one(result: CommerceResult<Order>) -> CommerceResult<dto::OrderResponse> {
    result.map(|o| dto::OrderResponse::from(&o))
}

fn many(result: CommerceResult<Vec<Order>>) -> CommerceResult<Vec<dto::OrderResponse>> {
    result.map(|orders| orders.iter().map(dto::OrderResponse::from).collect())
}

/// Cash-on-delivery checkout of explicit items or the caller's cart.
pub async fn create_order(
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
        .orders
        .create_order(user.user_id(), request)
        .await;
    respond(StatusCode::CREATED, one(result))
}

pub async fn my_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    let result = services.commerce.orders.user_orders(user.user_id()).await;
    respond(StatusCode::OK, many(result))
}

pub async fn received_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    let result = services.commerce.orders.received_orders(user.user_id()).await;
    respond(StatusCode::OK, many(result))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.commerce.orders.get_order(user.user_id(), id).await;
    respond(StatusCode::OK, one(result))
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::StatusRequest>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .commerce
        .orders
        .update_status(user.user_id(), id, &body.status)
        .await;
    respond(StatusCode::OK, one(result))
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.commerce.orders.cancel_order(user.user_id(), id).await;
    respond(StatusCode::OK, one(result))
}
