//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for registration, login, and the current user.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use flashcards_core::domain::User;
use flashcards_core::ports::PortError;
use flashcards_core::validation;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::middleware::AuthenticatedUser;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A user as shown to clients. Never carries the password hash.
#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    /// One of `free`, `pro`, `admin`.
    pub plan: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            plan: user.plan.as_str().to_string(),
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token for the `Authorization` header.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new user account on the free plan
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created successfully", body = UserResponse),
        (status = 400, description = "Invalid email or password", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(req) = payload?;

    // 1. Validate the credentials
    validation::email(&req.email)?;
    validation::password(&req.password)?;

    // 2. Hash the password
    let password_hash = state.credentials.hash_password(&req.password)?;

    // 3. Create the user
    let user = state.db.create_user(&req.email, &password_hash).await?;
    info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /auth/login - Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;

    // 1. Get user by email. Unknown emails look exactly like wrong passwords.
    let credentials = match state.db.get_user_by_email(&req.email).await {
        Ok(credentials) => credentials,
        Err(PortError::NotFound(_)) => {
            state.credentials.verify_unknown(&req.password);
            warn!("Login attempt for an unknown email");
            return Err(PortError::Unauthorized.into());
        }
        Err(e) => return Err(e.into()),
    };

    // 2. Verify password
    if !state
        .credentials
        .verify_password(&req.password, &credentials.password_hash)?
    {
        warn!(user_id = %credentials.user.id, "Login attempt with a wrong password");
        return Err(PortError::Unauthorized.into());
    }

    // 3. Issue the token
    let session = state.sessions.issue(&credentials.user)?;
    info!(user_id = %credentials.user.id, "user logged in");

    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user: credentials.user.into(),
    }))
}

/// GET /auth/me - The authenticated user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "The user no longer exists", body = ErrorBody)
    )
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.db.get_user(caller.user_id).await?;
    Ok(Json(user.into()))
}
