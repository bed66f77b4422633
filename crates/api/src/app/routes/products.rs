use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};

use stockyard_catalog::ProductId;
use stockyard_infra::services::{RegisterProduct, UpdatePrices};

use crate::app::routes::common::respond;
use crate::app::{AppServices, dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_product))
        .route("/:id", get(get_product).patch(update_prices))
}

/// The caller becomes the product's seller.
pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<dto::RegisterProductRequest>,
) -> axum::response::Response {
    let result = services
        .commerce
        .catalog
        .register_product(
            user.user_id(),
            RegisterProduct {
                name: body.name,
                price: body.price,
                rent_price: body.rent_price,
                stock: body.stock,
            },
        )
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.commerce.catalog.product_view(id).await)
}

/// Seller-only repricing.
pub async fn update_prices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdatePricesRequest>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .commerce
        .catalog
        .update_prices(
            user.user_id(),
            id,
            UpdatePrices {
                price: body.price,
                rent_price: body.rent_price,
            },
        )
        .await;
    respond(StatusCode::OK, result)
}
