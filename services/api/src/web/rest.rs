//! services/api/src/web/rest.rs
//!
//! The health endpoint and the master definition for the OpenAPI specification.

use axum::Json;
use serde::Serialize;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};

use crate::error::ErrorBody;
use crate::web::{auth, collections, flashcards, shares, subscriptions, usage};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        auth::register,
        auth::login,
        auth::me,
        collections::create_collection,
        collections::list_collections,
        collections::get_collection,
        collections::update_collection,
        collections::delete_collection,
        flashcards::create_flashcard,
        flashcards::list_flashcards,
        flashcards::get_flashcard,
        flashcards::update_flashcard,
        flashcards::delete_flashcard,
        shares::create_share,
        shares::list_collection_shares,
        shares::list_my_shares,
        shares::update_share,
        shares::delete_share,
        subscriptions::current,
        subscriptions::upgrade,
        subscriptions::cancel,
        subscriptions::history,
        subscriptions::checkout,
        subscriptions::confirm,
        usage::generations,
        usage::generate,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorBody,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::UserResponse,
            auth::LoginResponse,
            collections::CreateCollectionRequest,
            collections::UpdateCollectionRequest,
            collections::CollectionResponse,
            flashcards::CreateFlashcardRequest,
            flashcards::UpdateFlashcardRequest,
            flashcards::FlashcardResponse,
            shares::CreateShareRequest,
            shares::UpdateShareRequest,
            shares::ShareResponse,
            shares::SharedCollectionResponse,
            subscriptions::CurrentPlanResponse,
            subscriptions::UpgradeRequest,
            subscriptions::CheckoutRequest,
            subscriptions::ConfirmRequest,
            subscriptions::PeriodResponse,
            subscriptions::PlanChangeResponse,
            usage::GenerationUsageResponse,
            usage::GenerateRequest,
            usage::GenerateResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Flashcards API", description = "Collections, flashcards, sharing and subscription plans.")
    )
)]
pub struct ApiDoc;

/// Registers the bearer scheme referenced by the protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
