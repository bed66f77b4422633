use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use stockyard_infra::error::CommerceResult;

use crate::app::errors;

/// `status` + JSON body on success, mapped error otherwise.
pub fn respond<T: Serialize>(status: StatusCode, result: CommerceResult<T>) -> axum::response::Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::commerce_error_to_response(e),
    }
}
