//! Bearer authentication for the protected routes.
//!
//! Identity comes only from the verified token subject; nothing in a request
//! body can name the acting user.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::app::errors::json_error;
use crate::auth::JwtValidator;
use crate::context::UserContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return unauthenticated("missing bearer token");
    };

    let claims = match state.jwt.validate(token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(method = %req.method(), path = req.uri().path(), "rejected bearer token: {e}");
            return unauthenticated("invalid or expired token");
        }
    };

    req.extensions_mut().insert(UserContext::new(claims.sub));
    next.run(req).await
}

fn unauthenticated(message: &str) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "Unauthenticated", message)
}

/// Token from `Authorization: Bearer <token>`, if present and non-empty.
pub(crate) fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let token = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim();
    (!token.is_empty()).then_some(token)
}
