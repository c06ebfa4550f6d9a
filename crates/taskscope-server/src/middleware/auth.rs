//! Authentication middleware for taskscope-server.
//!
//! Accepts the access token as `Authorization: Bearer <token>`, as an
//! `X-Taskscope-Token` header, or as a `token` query parameter (browsers
//! can't set headers on WebSocket upgrades).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::ErrorResponse;
use crate::state::AppState;

pub const TOKEN_HEADER: &str = "X-Taskscope-Token";

/// Authentication error
#[derive(Debug, PartialEq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (error, code) = match self {
            AuthError::MissingToken => ("Missing authentication token", "MISSING_TOKEN"),
            AuthError::InvalidToken => ("Invalid authentication token", "INVALID_TOKEN"),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        });

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Pull the presented token out of a request, header first
pub fn presented_token(request: &Request<Body>) -> Result<String, AuthError> {
    let headers = request.headers();
    if let Some(value) = headers.get(TOKEN_HEADER) {
        let token = value.to_str().map_err(|_| AuthError::InvalidToken)?;
        return Ok(token.trim().to_string());
    }
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidToken)?;
        return Ok(token.trim().to_string());
    }

    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .map_err(|_| AuthError::InvalidToken)?;
    match params.get("token") {
        // An unescaped '+' in a query string decodes to a space
        Some(token) => Ok(token.trim().replace(' ', "+")),
        None => Err(AuthError::MissingToken),
    }
}

/// Authentication middleware for axum
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = presented_token(&request)?;
    if !state.access_token.verify_encoded(&token) {
        debug!(path = %request.uri().path(), "Rejected request with invalid token");
        return Err(AuthError::InvalidToken);
    }
    Ok(next.run(request).await)
}
