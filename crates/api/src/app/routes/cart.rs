use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
};

use stockyard_cart::CartItemId;
use stockyard_catalog::ProductId;

use crate::app::routes::common::respond;
use crate::app::{AppServices, dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(add_item).get(get_cart).delete(clear_cart))
        .route("/:item_id", put(update_item).delete(remove_item))
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<dto::AddCartItemRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&body.product_id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .commerce
        .carts
        .add_item(user.user_id(), product_id, body.quantity, body.is_rental)
        .await;
    respond(StatusCode::OK, result)
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.commerce.carts.get(user.user_id()).await)
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(item_id): Path<String>,
    Json(body): Json<dto::UpdateCartItemRequest>,
) -> axum::response::Response {
    let item_id: CartItemId = match errors::parse_id(&item_id, "cart item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .commerce
        .carts
        .update_item(user.user_id(), item_id, body.quantity)
        .await;
    respond(StatusCode::OK, result)
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(item_id): Path<String>,
) -> axum::response::Response {
    let item_id: CartItemId = match errors::parse_id(&item_id, "cart item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .commerce
        .carts
        .remove_item(user.user_id(), item_id)
        .await;
    respond(StatusCode::OK, result)
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match services.commerce.carts.clear(user.user_id()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::commerce_error_to_response(e),
    }
}
