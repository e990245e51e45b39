//! services/api/src/web/shares.rs
//!
//! Share management for collection owners, and the recipient's view of what
//! has been shared with them.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use flashcards_core::domain::{Share, SharePermission, SharedCollection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::collections::CollectionResponse;
use crate::web::middleware::AuthenticatedUser;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateShareRequest {
    /// The recipient's user id.
    pub shared_with_id: Uuid,
    /// `read` or `write`.
    pub permissions: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateShareRequest {
    /// `read` or `write`.
    pub permissions: String,
}

#[derive(Serialize, ToSchema)]
pub struct ShareResponse {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub recipient_user_id: Uuid,
    pub permission: String,
    pub share_code: String,
    pub created_at: DateTime<Utc>,
}

impl From<Share> for ShareResponse {
    fn from(s: Share) -> Self {
        Self {
            id: s.id,
            collection_id: s.collection_id,
            recipient_user_id: s.recipient_user_id,
            permission: s.permission.as_str().to_string(),
            share_code: s.share_code,
            created_at: s.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SharedCollectionResponse {
    pub share: ShareResponse,
    pub collection: CollectionResponse,
}

impl From<SharedCollection> for SharedCollectionResponse {
    fn from(s: SharedCollection) -> Self {
        Self {
            share: s.share.into(),
            collection: s.collection.into(),
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/collections/{id}/shares",
    tag = "shares",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Collection id")),
    request_body = CreateShareRequest,
    responses(
        (status = 201, description = "Share created", body = ShareResponse),
        (status = 400, description = "Bad permission, self-share or unknown recipient", body = ErrorBody),
        (status = 403, description = "Caller does not own the collection", body = ErrorBody),
        (status = 404, description = "Unknown collection", body = ErrorBody),
        (status = 409, description = "Already shared with this recipient", body = ErrorBody)
    )
)]
pub async fn create_share(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(collection_id): Path<Uuid>,
    payload: Result<Json<CreateShareRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShareResponse>), ApiError> {
    let Json(req) = payload?;
    let permission: SharePermission = req.permissions.parse()?;
    let share = state
        .sharing
        .create_share(caller.user_id, collection_id, req.shared_with_id, permission)
        .await?;
    Ok((StatusCode::CREATED, Json(share.into())))
}

#[utoipa::path(
    get,
    path = "/collections/{id}/shares",
    tag = "shares",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Grants on the collection", body = [ShareResponse]),
        (status = 403, description = "Caller does not own the collection", body = ErrorBody),
        (status = 404, description = "Unknown collection", body = ErrorBody)
    )
)]
pub async fn list_collection_shares(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(collection_id): Path<Uuid>,
) -> Result<Json<Vec<ShareResponse>>, ApiError> {
    let shares = state
        .sharing
        .list_shares_for_collection(caller.user_id, collection_id)
        .await?;
    Ok(Json(shares.into_iter().map(Into::into).collect()))
}

/// Collections other users have shared with the caller.
#[utoipa::path(
    get,
    path = "/shares",
    tag = "shares",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Shares addressed to the caller", body = [SharedCollectionResponse]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn list_my_shares(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<SharedCollectionResponse>>, ApiError> {
    let shares = state.sharing.list_shares_for_user(caller.user_id).await?;
    Ok(Json(shares.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    put,
    path = "/collections/{id}/shares/{share_id}",
    tag = "shares",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Collection id"),
        ("share_id" = Uuid, Path, description = "Share id")
    ),
    request_body = UpdateShareRequest,
    responses(
        (status = 200, description = "Updated share", body = ShareResponse),
        (status = 400, description = "Bad permission", body = ErrorBody),
        (status = 403, description = "Caller does not own the collection", body = ErrorBody),
        (status = 404, description = "Unknown collection or share", body = ErrorBody)
    )
)]
pub async fn update_share(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path((collection_id, share_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<UpdateShareRequest>, JsonRejection>,
) -> Result<Json<ShareResponse>, ApiError> {
    let Json(req) = payload?;
    let permission: SharePermission = req.permissions.parse()?;
    let share = state
        .sharing
        .update_permission(caller.user_id, collection_id, share_id, permission)
        .await?;
    Ok(Json(share.into()))
}

#[utoipa::path(
    delete,
    path = "/collections/{id}/shares/{share_id}",
    tag = "shares",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Collection id"),
        ("share_id" = Uuid, Path, description = "Share id")
    ),
    responses(
        (status = 204, description = "Share revoked"),
        (status = 403, description = "Caller does not own the collection", body = ErrorBody),
        (status = 404, description = "Unknown collection or share", body = ErrorBody)
    )
)]
pub async fn delete_share(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path((collection_id, share_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .sharing
        .revoke_share(caller.user_id, collection_id, share_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
