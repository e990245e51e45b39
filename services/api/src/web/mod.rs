pub mod auth;
pub mod collections;
pub mod flashcards;
pub mod middleware;
pub mod rest;
pub mod shares;
pub mod state;
pub mod subscriptions;
pub mod usage;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
pub use middleware::{require_auth, AuthenticatedUser};
pub use rest::ApiDoc;
pub use state::AppState;

/// Builds the complete application: public and protected routes, CORS,
/// request tracing and the Swagger UI.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(rest::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route(
            "/collections",
            post(collections::create_collection).get(collections::list_collections),
        )
        .route(
            "/collections/{id}",
            get(collections::get_collection)
                .put(collections::update_collection)
                .delete(collections::delete_collection),
        )
        .route(
            "/collections/{id}/flashcards",
            post(flashcards::create_flashcard).get(flashcards::list_flashcards),
        )
        .route(
            "/collections/{id}/flashcards/{card_id}",
            get(flashcards::get_flashcard)
                .put(flashcards::update_flashcard)
                .delete(flashcards::delete_flashcard),
        )
        .route(
            "/collections/{id}/shares",
            post(shares::create_share).get(shares::list_collection_shares),
        )
        .route(
            "/collections/{id}/shares/{share_id}",
            axum::routing::put(shares::update_share).delete(shares::delete_share),
        )
        .route("/shares", get(shares::list_my_shares))
        .route("/subscriptions/current", get(subscriptions::current))
        .route("/subscriptions/upgrade", post(subscriptions::upgrade))
        .route("/subscriptions/cancel", post(subscriptions::cancel))
        .route("/subscriptions/history", get(subscriptions::history))
        .route("/subscriptions/checkout", post(subscriptions::checkout))
        .route(
            "/subscriptions/{period_id}/confirm",
            post(subscriptions::confirm),
        )
        .route("/collections/{id}/generate", post(usage::generate))
        .route("/usage/generations", get(usage::generations))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

/// CORS for the configured origins. A `*` entry allows any origin.
fn cors_layer(config: &Config) -> CorsLayer {
    let allow_origin = if config.cors_allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(%origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
}
