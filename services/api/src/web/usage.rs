//! services/api/src/web/usage.rs
//!
//! Assisted card generation and its daily budget.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use flashcards_core::domain::GenerationRequest;
use flashcards_core::GenerationUsage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::flashcards::FlashcardResponse;
use crate::web::middleware::AuthenticatedUser;
use crate::web::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct GenerationUsageResponse {
    /// The UTC day the count belongs to.
    pub date: NaiveDate,
    pub generated_today: i32,
    pub daily_limit: i32,
    pub remaining: i32,
}

impl From<GenerationUsage> for GenerationUsageResponse {
    fn from(u: GenerationUsage) -> Self {
        Self {
            date: u.date,
            generated_today: u.generated_today,
            daily_limit: u.daily_limit,
            remaining: u.remaining,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// `text` to extract cards from the content, `topic` to write cards about it.
    pub input_type: String,
    pub content: String,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateResponse {
    pub flashcards: Vec<FlashcardResponse>,
    pub count: usize,
    pub usage: GenerationUsageResponse,
}

/// The caller's generation budget for today (UTC).
#[utoipa::path(
    get,
    path = "/usage/generations",
    tag = "usage",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Today's generation budget", body = GenerationUsageResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn generations(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<GenerationUsageResponse>, ApiError> {
    let usage = state
        .generation
        .usage(caller.user_id, Utc::now().date_naive())
        .await?;
    Ok(Json(usage.into()))
}

/// Generates cards into the collection. Counts as one generation.
#[utoipa::path(
    post,
    path = "/collections/{id}/generate",
    tag = "usage",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Collection id")),
    request_body = GenerateRequest,
    responses(
        (status = 201, description = "Cards generated", body = GenerateResponse),
        (status = 400, description = "Invalid input type or empty content", body = ErrorBody),
        (status = 403, description = "Read-only share", body = ErrorBody),
        (status = 404, description = "Unknown or not visible to the caller", body = ErrorBody),
        (status = 409, description = "Collection is full", body = ErrorBody),
        (status = 429, description = "Daily generation limit reached", body = ErrorBody),
        (status = 503, description = "Generation is not available", body = ErrorBody)
    )
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(collection_id): Path<Uuid>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GenerateResponse>), ApiError> {
    let Json(req) = payload?;
    let request = GenerationRequest {
        input: req.input_type.parse()?,
        content: req.content,
    };
    let generation = state
        .generation
        .generate(
            caller.user_id,
            collection_id,
            request,
            Utc::now().date_naive(),
        )
        .await?;
    let flashcards: Vec<FlashcardResponse> =
        generation.flashcards.into_iter().map(Into::into).collect();
    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            count: flashcards.len(),
            flashcards,
            usage: generation.usage.into(),
        }),
    ))
}
