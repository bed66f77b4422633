use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockyard_infra::error::{CommerceError, ErrorKind};

pub fn commerce_error_to_response(err: CommerceError) -> axum::response::Response {
    let status = match (&err, err.kind()) {
        (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        (_, ErrorKind::Unauthorized) => StatusCode::FORBIDDEN,
        (_, ErrorKind::InsufficientStock) => StatusCode::CONFLICT,
        (_, ErrorKind::InvalidState) => StatusCode::UNPROCESSABLE_ENTITY,
        (_, ErrorKind::InvalidInput) => StatusCode::BAD_REQUEST,
        (
            CommerceError::ExternalGateway {
                outcome_unknown: true,
                ..
            },
            _,
        ) => StatusCode::GATEWAY_TIMEOUT,
        (_, ErrorKind::ExternalGateway) => StatusCode::BAD_GATEWAY,
        (_, ErrorKind::Conflict) => StatusCode::CONFLICT,
        (_, ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, err.kind().as_str(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path or body id, answering `400 InvalidInput` when malformed.
pub fn parse_id<T: core::str::FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            ErrorKind::InvalidInput.as_str(),
            format!("invalid {what} id"),
        )
    })
}
