//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each kind
//! is presented to clients.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use flashcards_core::ports::PortError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the core or one of its ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure to apply the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A request body that could not be parsed.
    #[error("Invalid request body: {0}")]
    Body(#[from] JsonRejection),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The JSON body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub error: String,
    pub message: String,
}

impl ApiError {
    /// Status, stable code and client-safe message.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Port(PortError::NotFound(m)) => (StatusCode::NOT_FOUND, "not_found", m.clone()),
            ApiError::Port(PortError::Forbidden(m)) => (StatusCode::FORBIDDEN, "forbidden", m.clone()),
            ApiError::Port(PortError::Conflict(m)) => (StatusCode::CONFLICT, "conflict", m.clone()),
            ApiError::Port(PortError::InvalidInput(m)) => {
                (StatusCode::BAD_REQUEST, "invalid_input", m.clone())
            }
            ApiError::Port(PortError::InvalidRecipient(id)) => (
                StatusCode::BAD_REQUEST,
                "invalid_recipient",
                format!("user {} does not exist", id),
            ),
            ApiError::Port(PortError::Unauthorized) => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "missing, invalid or expired credentials".to_string(),
            ),
            ApiError::Port(PortError::RateLimited(m)) => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limited", m.clone())
            }
            ApiError::Port(PortError::Unavailable(m)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", m.clone())
            }
            ApiError::Body(rejection) => (
                StatusCode::BAD_REQUEST,
                "invalid_input",
                rejection.body_text(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:?}", self);
        }
        let body = ErrorBody {
            error: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_stable_codes() {
        let cases = [
            (PortError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (PortError::Forbidden("x".into()), StatusCode::FORBIDDEN, "forbidden"),
            (PortError::Conflict("x".into()), StatusCode::CONFLICT, "conflict"),
            (PortError::InvalidInput("x".into()), StatusCode::BAD_REQUEST, "invalid_input"),
            (PortError::Unauthorized, StatusCode::UNAUTHORIZED, "unauthenticated"),
            (PortError::RateLimited("x".into()), StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            (PortError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            (PortError::ShareCodeTaken, StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        ];
        for (err, status, code) in cases {
            let (got_status, got_code, _) = ApiError::from(err).parts();
            assert_eq!(got_status, status);
            assert_eq!(got_code, code);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let (_, _, message) = ApiError::from(PortError::Unexpected("pool timed out".into())).parts();
        assert_eq!(message, "Internal server error");
    }
}
