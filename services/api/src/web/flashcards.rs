//! services/api/src/web/flashcards.rs
//!
//! Flashcard endpoints, nested under their collection.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use flashcards_core::domain::{Flashcard, FlashcardChanges, NewFlashcard};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::middleware::AuthenticatedUser;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateFlashcardRequest {
    pub front: String,
    pub back: String,
    /// A youtube.com, youtu.be or vimeo.com link.
    pub video_url: Option<String>,
    /// Free-form JSON object stored alongside the card.
    #[schema(value_type = Option<Object>)]
    pub extra: Option<Map<String, Value>>,
}

/// Partial update; omitted fields keep their value.
#[derive(Deserialize, ToSchema)]
pub struct UpdateFlashcardRequest {
    pub front: Option<String>,
    pub back: Option<String>,
    pub video_url: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub extra: Option<Map<String, Value>>,
}

#[derive(Serialize, ToSchema)]
pub struct FlashcardResponse {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub front: String,
    pub back: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub extra: Option<Map<String, Value>>,
    pub created_by_generation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Flashcard> for FlashcardResponse {
    fn from(f: Flashcard) -> Self {
        Self {
            id: f.id,
            collection_id: f.collection_id,
            front: f.front,
            back: f.back,
            video_url: f.video_url,
            extra: f.extra,
            created_by_generation: f.created_by_generation,
            created_at: f.created_at,
            updated_at: f.updated_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/collections/{id}/flashcards",
    tag = "flashcards",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Collection id")),
    request_body = CreateFlashcardRequest,
    responses(
        (status = 201, description = "Flashcard created", body = FlashcardResponse),
        (status = 400, description = "Invalid field", body = ErrorBody),
        (status = 403, description = "Read-only share", body = ErrorBody),
        (status = 404, description = "Unknown or not visible to the caller", body = ErrorBody),
        (status = 409, description = "Collection is full", body = ErrorBody)
    )
)]
pub async fn create_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(collection_id): Path<Uuid>,
    payload: Result<Json<CreateFlashcardRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FlashcardResponse>), ApiError> {
    let Json(req) = payload?;
    let flashcard = state
        .library
        .create_flashcard(
            caller.user_id,
            collection_id,
            NewFlashcard {
                front: req.front,
                back: req.back,
                video_url: req.video_url.filter(|u| !u.is_empty()),
                extra: req.extra,
                created_by_generation: false,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(flashcard.into())))
}

/// Newest first.
#[utoipa::path(
    get,
    path = "/collections/{id}/flashcards",
    tag = "flashcards",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Flashcards of the collection", body = [FlashcardResponse]),
        (status = 404, description = "Unknown or not visible to the caller", body = ErrorBody)
    )
)]
pub async fn list_flashcards(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(collection_id): Path<Uuid>,
) -> Result<Json<Vec<FlashcardResponse>>, ApiError> {
    let flashcards = state
        .library
        .list_flashcards(caller.user_id, collection_id)
        .await?;
    Ok(Json(flashcards.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/collections/{id}/flashcards/{card_id}",
    tag = "flashcards",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Collection id"),
        ("card_id" = Uuid, Path, description = "Flashcard id")
    ),
    responses(
        (status = 200, description = "The flashcard", body = FlashcardResponse),
        (status = 404, description = "Unknown flashcard or collection", body = ErrorBody)
    )
)]
pub async fn get_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path((collection_id, flashcard_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<FlashcardResponse>, ApiError> {
    let flashcard = state
        .library
        .get_flashcard(caller.user_id, collection_id, flashcard_id)
        .await?;
    Ok(Json(flashcard.into()))
}

#[utoipa::path(
    put,
    path = "/collections/{id}/flashcards/{card_id}",
    tag = "flashcards",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Collection id"),
        ("card_id" = Uuid, Path, description = "Flashcard id")
    ),
    request_body = UpdateFlashcardRequest,
    responses(
        (status = 200, description = "Updated flashcard", body = FlashcardResponse),
        (status = 400, description = "Invalid field", body = ErrorBody),
        (status = 403, description = "Read-only share", body = ErrorBody),
        (status = 404, description = "Unknown flashcard or collection", body = ErrorBody)
    )
)]
pub async fn update_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path((collection_id, flashcard_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<UpdateFlashcardRequest>, JsonRejection>,
) -> Result<Json<FlashcardResponse>, ApiError> {
    let Json(req) = payload?;
    let changes = FlashcardChanges {
        front: req.front,
        back: req.back,
        video_url: req.video_url.filter(|u| !u.is_empty()),
        extra: req.extra,
    };
    let flashcard = state
        .library
        .update_flashcard(caller.user_id, collection_id, flashcard_id, changes)
        .await?;
    Ok(Json(flashcard.into()))
}

#[utoipa::path(
    delete,
    path = "/collections/{id}/flashcards/{card_id}",
    tag = "flashcards",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Collection id"),
        ("card_id" = Uuid, Path, description = "Flashcard id")
    ),
    responses(
        (status = 204, description = "Flashcard deleted"),
        (status = 403, description = "Read-only share", body = ErrorBody),
        (status = 404, description = "Unknown flashcard or collection", body = ErrorBody)
    )
)]
pub async fn delete_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path((collection_id, flashcard_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .library
        .delete_flashcard(caller.user_id, collection_id, flashcard_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
