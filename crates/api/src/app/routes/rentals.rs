use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, patch, post},
};
use chrono::Utc;

use stockyard_catalog::ProductId;
use stockyard_infra::error::CommerceResult;
use stockyard_infra::services::CreateRental;
use stockyard_rentals::{Rental, RentalId};

use crate::app::routes::common::respond;
use crate::app::{AppServices, dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_rental))
        .route("/mine", get(my_rentals))
        .route("/received", get(received_rentals))
        .route("/:id", get(get_rental))
        .route("/:id/status", patch(update_status))
        .route("/:id/extend", post(extend_rental))
        .route("/:id/cancel", post(cancel_rental))
        .route("/:id/complete", post(complete_rental))
        .route("/:id/late-fees", post(assess_late_fees))
}

fn one(result: CommerceResult<Rental>) -> CommerceResult<dto::RentalResponse> {
    result.map(|r| dto::RentalResponse::from(&r))
}

fn many(result: CommerceResult<Vec<Rental>>) -> CommerceResult<Vec<dto::RentalResponse>> {
    result.map(|rentals| rentals.iter().map(dto::RentalResponse::from).collect())
}

fn rental_id(raw: &str) -> Result<RentalId, axum::response::Response> {
    errors::parse_id(raw, "rental")
}

pub async fn create_rental(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<dto::CreateRentalRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&body.product_id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .commerce
        .rentals
        .create_rental(
            user.user_id(),
            CreateRental {
                product_id,
                duration: body.duration,
            },
        )
        .await;
    respond(StatusCode::CREATED, one(result))
}

pub async fn my_rentals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    let result = services.commerce.rentals.user_rentals(user.user_id()).await;
    respond(StatusCode::OK, many(result))
}

pub async fn received_rentals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    let result = services.commerce.rentals.received_rentals(user.user_id()).await;
    respond(StatusCode::OK, many(result))
}

pub async fn get_rental(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match rental_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.commerce.rentals.get_rental(user.user_id(), id).await;
    respond(StatusCode::OK, one(result))
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::StatusRequest>,
) -> axum::response::Response {
    let id = match rental_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .commerce
        .rentals
        .update_status(user.user_id(), id, &body.status)
        .await;
    respond(StatusCode::OK, one(result))
}

pub async fn extend_rental(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ExtendRentalRequest>,
) -> axum::response::Response {
    let id = match rental_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .commerce
        .rentals
        .extend_rental(user.user_id(), id, body.duration)
        .await;
    respond(StatusCode::OK, one(result))
}

pub async fn cancel_rental(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match rental_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.commerce.rentals.cancel_rental(user.user_id(), id).await;
    respond(StatusCode::OK, one(result))
}

pub async fn complete_rental(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match rental_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.commerce.rentals.complete_rental(user.user_id(), id).await;
    respond(StatusCode::OK, one(result))
}

pub async fn assess_late_fees(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match rental_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .commerce
        .rentals
        .assess_late_fees(user.user_id(), id, Utc::now())
        .await;
    respond(StatusCode::OK, one(result))
}
