//! services/api/src/web/collections.rs
//!
//! Collection endpoints. Access rules live in `flashcards_core::access`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use flashcards_core::domain::{Collection, CollectionChanges, NewCollection};
use flashcards_core::validation::DEFAULT_MAX_CARDS;
use serde::{Deserialize, Serialize};
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
pub struct CreateCollectionRequest {
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    /// Defaults to 10.
    pub max_cards: Option<i32>,
}

/// Partial update; omitted fields keep their value.
#[derive(Deserialize, ToSchema)]
pub struct UpdateCollectionRequest {
    pub name: Option<String>,
    pub is_public: Option<bool>,
    pub max_cards: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct CollectionResponse {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub is_public: bool,
    pub max_cards: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Collection> for CollectionResponse {
    fn from(c: Collection) -> Self {
        Self {
            id: c.id,
            owner_user_id: c.owner_user_id,
            name: c.name,
            is_public: c.is_public,
            max_cards: c.max_cards,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/collections",
    tag = "collections",
    security(("bearer_auth" = [])),
    request_body = CreateCollectionRequest,
    responses(
        (status = 201, description = "Collection created", body = CollectionResponse),
        (status = 400, description = "Invalid name or max_cards", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn create_collection(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateCollectionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CollectionResponse>), ApiError> {
    let Json(req) = payload?;
    let collection = state
        .library
        .create_collection(
            caller.user_id,
            NewCollection {
                name: req.name,
                is_public: req.is_public,
                max_cards: req.max_cards.unwrap_or(DEFAULT_MAX_CARDS),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(collection.into())))
}

/// The caller's own collections, newest first.
#[utoipa::path(
    get,
    path = "/collections",
    tag = "collections",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Owned collections", body = [CollectionResponse]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn list_collections(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<CollectionResponse>>, ApiError> {
    let collections = state.library.list_collections(caller.user_id).await?;
    Ok(Json(collections.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/collections/{id}",
    tag = "collections",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Collection id")),
    responses(
        (status = 200, description = "The collection", body = CollectionResponse),
        (status = 404, description = "Unknown or not visible to the caller", body = ErrorBody)
    )
)]
pub async fn get_collection(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(collection_id): Path<Uuid>,
) -> Result<Json<CollectionResponse>, ApiError> {
    let collection = state
        .library
        .get_collection(caller.user_id, collection_id)
        .await?;
    Ok(Json(collection.into()))
}

#[utoipa::path(
    put,
    path = "/collections/{id}",
    tag = "collections",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Collection id")),
    request_body = UpdateCollectionRequest,
    responses(
        (status = 200, description = "Updated collection", body = CollectionResponse),
        (status = 400, description = "Invalid field", body = ErrorBody),
        (status = 403, description = "Read-only share", body = ErrorBody),
        (status = 404, description = "Unknown or not visible to the caller", body = ErrorBody)
    )
)]
pub async fn update_collection(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(collection_id): Path<Uuid>,
    payload: Result<Json<UpdateCollectionRequest>, JsonRejection>,
) -> Result<Json<CollectionResponse>, ApiError> {
    let Json(req) = payload?;
    let changes = CollectionChanges {
        name: req.name,
        is_public: req.is_public,
        max_cards: req.max_cards,
    };
    let collection = state
        .library
        .update_collection(caller.user_id, collection_id, changes)
        .await?;
    Ok(Json(collection.into()))
}

/// Owner only. Removes the collection's flashcards and shares too.
#[utoipa::path(
    delete,
    path = "/collections/{id}",
    tag = "collections",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Collection id")),
    responses(
        (status = 204, description = "Collection deleted"),
        (status = 403, description = "Shared users cannot delete", body = ErrorBody),
        (status = 404, description = "Unknown or not visible to the caller", body = ErrorBody)
    )
)]
pub async fn delete_collection(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(collection_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .library
        .delete_collection(caller.user_id, collection_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
