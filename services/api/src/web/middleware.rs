//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use flashcards_core::ports::PortError;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

/// The caller behind a validated bearer token, stored in request extensions.
///
/// Only the id is trusted from the token; the plan is read from storage where needed.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// The credentials of an `Authorization` value using the `Bearer` scheme, in any case.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim_start().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Middleware that validates the `Authorization: Bearer <token>` header.
///
/// If valid, inserts an [`AuthenticatedUser`] into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the authorization header
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(PortError::Unauthorized)?;

    // 2. Strip the scheme
    let token = bearer_token(header).ok_or_else(|| {
        debug!("Rejected authorization header with a non-bearer scheme");
        PortError::Unauthorized
    })?;

    // 3. Validate the token
    let claims = state.sessions.validate(token)?;

    // 4. Insert the caller into request extensions
    req.extensions_mut().insert(AuthenticatedUser {
        user_id: claims.user_id,
    });

    // 5. Continue to the handler
    Ok(next.run(req).await)
}
