//! Integration tests: build the router over the in-memory store and drive it
//! with `tower::ServiceExt::oneshot`.

use api_lib::adapters::{Argon2Credentials, JwtSessionIssuer};
use async_trait::async_trait;
use api_lib::config::Config;
use api_lib::web::{router, AppState};
use argon2::Params;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use flashcards_core::{
    FlashcardGenerator, GeneratedCard, GenerationRequest, InMemoryDatabase, PortResult,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Two cards per request, derived from the content.
struct EchoGenerator;

#[async_trait]
impl FlashcardGenerator for EchoGenerator {
    async fn generate(&self, request: &GenerationRequest) -> PortResult<Vec<GeneratedCard>> {
        Ok(vec![
            GeneratedCard {
                front: format!("What is {}?", request.content),
                back: "A term".to_string(),
            },
            GeneratedCard {
                front: format!("Define {}", request.content),
                back: "A definition".to_string(),
            },
        ])
    }
}

fn test_app() -> Router {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("memory://".to_string()),
        "JWT_SECRET" => Some("test-secret".to_string()),
        _ => None,
    })
    .expect("test config");
    let config = Arc::new(config);
    let credentials = Arc::new(Argon2Credentials::with_params(
        Params::new(1024, 1, 1, None).expect("argon2 params"),
    ));
    let sessions = Arc::new(JwtSessionIssuer::new(
        config.jwt_secret.as_bytes(),
        config.jwt_expiration_secs,
    ));
    let state = AppState::new(
        config,
        Arc::new(InMemoryDatabase::new()),
        credentials,
        sessions,
        Arc::new(EchoGenerator),
    );
    router(Arc::new(state))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(request).await.expect("request");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    (status, json)
}

/// Registers and logs in; returns `(user_id, token)`.
async fn sign_up(app: &Router, email: &str) -> (String, String) {
    let credentials = json!({ "email": email, "password": "password1" });
    let (status, user) = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(credentials.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {email}: {user}");
    assert_eq!(user["plan"], "free");

    let (status, login) = send(app, Method::POST, "/auth/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::OK, "login {email}: {login}");
    (
        user["id"].as_str().unwrap().to_string(),
        login["token"].as_str().unwrap().to_string(),
    )
}

async fn create_collection(app: &Router, token: &str, name: &str, max_cards: i32) -> String {
    let (status, collection) = send(
        app,
        Method::POST,
        "/collections",
        Some(token),
        Some(json!({ "name": name, "max_cards": max_cards })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{collection}");
    collection["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn shared_reader_scenario() {
    let app = test_app();
    let (_a_id, a_token) = sign_up(&app, "a@x.com").await;
    let (b_id, b_token) = sign_up(&app, "b@x.com").await;

    let collection_id = create_collection(&app, &a_token, "Biology", 50).await;

    let (status, card) = send(
        &app,
        Method::POST,
        &format!("/collections/{collection_id}/flashcards"),
        Some(&a_token),
        Some(json!({ "front": "mitosis", "back": "cell division process" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{card}");
    assert_eq!(card["created_by_generation"], false);
    let card_id = card["id"].as_str().unwrap().to_string();

    let (status, share) = send(
        &app,
        Method::POST,
        &format!("/collections/{collection_id}/shares"),
        Some(&a_token),
        Some(json!({ "shared_with_id": b_id, "permissions": "read" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{share}");
    assert_eq!(share["permission"], "read");
    assert_eq!(share["share_code"].as_str().unwrap().len(), 8);

    let (status, collection) = send(
        &app,
        Method::GET,
        &format!("/collections/{collection_id}"),
        Some(&b_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(collection["name"], "Biology");
    assert_eq!(collection["max_cards"], 50);

    let (status, cards) = send(
        &app,
        Method::GET,
        &format!("/collections/{collection_id}/flashcards"),
        Some(&b_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cards.as_array().unwrap().len(), 1);
    assert_eq!(cards[0]["front"], "mitosis");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/collections/{collection_id}/flashcards/{card_id}"),
        Some(&b_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, error) = send(
        &app,
        Method::PUT,
        &format!("/collections/{collection_id}/flashcards/{card_id}"),
        Some(&b_token),
        Some(json!({ "back": "rewritten" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["error"], "forbidden");

    let (status, shared) = send(&app, Method::GET, "/shares", Some(&b_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shared[0]["collection"]["id"], collection_id.as_str());

    let (status, upgraded) = send(
        &app,
        Method::POST,
        "/subscriptions/upgrade",
        Some(&a_token),
        Some(json!({ "plan": "pro", "months": 1, "payment_id": "pay_123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{upgraded}");
    assert_eq!(upgraded["period"]["status"], "active");

    let (status, current) =
        send(&app, Method::GET, "/subscriptions/current", Some(&a_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current, json!({ "plan": "pro" }));
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = test_app();

    let (status, body) = send(&app, Method::GET, "/collections", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, _) = send(&app, Method::GET, "/auth/me", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, health) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn registration_and_login_errors() {
    let app = test_app();
    let (_, token) = sign_up(&app, "a@x.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": "a@x.com", "password": "password1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": "c@x.com", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (wrong_password, wrong_password_body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "a@x.com", "password": "password2" })),
    )
    .await;
    let (unknown_email, unknown_email_body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@x.com", "password": "password1" })),
    )
    .await;
    assert_eq!(wrong_password, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password_body, unknown_email_body);

    let (status, me) = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@x.com");
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn strangers_see_not_found_and_cannot_manage_shares() {
    let app = test_app();
    let (_, a_token) = sign_up(&app, "a@x.com").await;
    let (c_id, c_token) = sign_up(&app, "c@x.com").await;
    let collection_id = create_collection(&app, &a_token, "Private", 10).await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/collections/{collection_id}"),
        Some(&c_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/collections/{collection_id}"),
        Some(&c_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/collections/{collection_id}/shares"),
        Some(&c_token),
        Some(json!({ "shared_with_id": c_id, "permissions": "write" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/collections/{collection_id}/shares"),
        Some(&a_token),
        Some(json!({ "shared_with_id": uuid::Uuid::new_v4(), "permissions": "read" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_recipient");
}

#[tokio::test]
async fn writers_can_edit_until_revoked() {
    let app = test_app();
    let (_, a_token) = sign_up(&app, "a@x.com").await;
    let (b_id, b_token) = sign_up(&app, "b@x.com").await;
    let collection_id = create_collection(&app, &a_token, "Chemistry", 10).await;

    let (_, share) = send(
        &app,
        Method::POST,
        &format!("/collections/{collection_id}/shares"),
        Some(&a_token),
        Some(json!({ "shared_with_id": b_id, "permissions": "write" })),
    )
    .await;
    let share_id = share["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/collections/{collection_id}/flashcards"),
        Some(&b_token),
        Some(json!({ "front": "H2O", "back": "water", "video_url": "https://youtu.be/abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/collections/{collection_id}"),
        Some(&b_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/collections/{collection_id}/shares/{share_id}"),
        Some(&a_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/collections/{collection_id}/shares/{share_id}"),
        Some(&a_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/collections/{collection_id}/flashcards"),
        Some(&b_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_collections_reject_new_cards() {
    let app = test_app();
    let (_, token) = sign_up(&app, "a@x.com").await;
    let collection_id = create_collection(&app, &token, "Tiny", 1).await;
    let uri = format!("/collections/{collection_id}/flashcards");

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(&token),
        Some(json!({ "front": "one", "back": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&token),
        Some(json!({ "front": "two", "back": "2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&token),
        Some(json!({ "front": "no back" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn subscription_lifecycle() {
    let app = test_app();
    let (_, token) = sign_up(&app, "a@x.com").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/subscriptions/upgrade",
        Some(&token),
        Some(json!({ "plan": "free", "months": 1, "payment_id": "p" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/subscriptions/upgrade",
        Some(&token),
        Some(json!({ "plan": "pro", "months": 0, "payment_id": "p" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for uri in ["/subscriptions/upgrade", "/subscriptions/checkout"] {
        let (status, body) = send(
            &app,
            Method::POST,
            uri,
            Some(&token),
            Some(json!({ "plan": "admin", "months": 1, "payment_id": "pay_0" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {body}");
    }

    let (status, pending) = send(
        &app,
        Method::POST,
        "/subscriptions/checkout",
        Some(&token),
        Some(json!({ "plan": "pro", "payment_id": "pay_1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pending["status"], "pending");
    let period_id = pending["id"].as_str().unwrap().to_string();

    let (_, current) = send(&app, Method::GET, "/subscriptions/current", Some(&token), None).await;
    assert_eq!(current["plan"], "free");

    let (status, confirmed) = send(
        &app,
        Method::POST,
        &format!("/subscriptions/{period_id}/confirm"),
        Some(&token),
        Some(json!({ "months": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{confirmed}");
    assert_eq!(confirmed["plan"], "pro");

    let (status, canceled) =
        send(&app, Method::POST, "/subscriptions/cancel", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(canceled["plan"], "free");
    assert_eq!(canceled["period"]["status"], "canceled");

    let (status, _) = send(&app, Method::POST, "/subscriptions/cancel", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, history) =
        send(&app, Method::GET, "/subscriptions/history", Some(&token), None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, usage) =
        send(&app, Method::GET, "/usage/generations", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(usage["generated_today"], 0);
    assert_eq!(usage["daily_limit"], 6);
    assert_eq!(usage["remaining"], 6);
}

#[tokio::test]
async fn generation_is_metered_by_the_stored_plan() {
    let app = test_app();
    let (_, token) = sign_up(&app, "a@x.com").await;
    let collection_id = create_collection(&app, &token, "Biology", 100).await;
    let uri = format!("/collections/{collection_id}/generate");

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&token),
        Some(json!({ "input_type": "essay", "content": "cells" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    for round in 1..=6 {
        let (status, body) = send(
            &app,
            Method::POST,
            &uri,
            Some(&token),
            Some(json!({ "input_type": "topic", "content": "mitosis" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "round {round}: {body}");
        assert_eq!(body["count"], 2);
        assert_eq!(body["flashcards"][0]["created_by_generation"], true);
        assert_eq!(body["usage"]["remaining"], 6 - round);
    }

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&token),
        Some(json!({ "input_type": "text", "content": "mitosis" })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");

    let (_, cards) = send(
        &app,
        Method::GET,
        &format!("/collections/{collection_id}/flashcards"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(cards.as_array().unwrap().len(), 12);

    // The token was issued on the free plan; the upgrade applies to it at once.
    let (status, _) = send(
        &app,
        Method::POST,
        "/subscriptions/upgrade",
        Some(&token),
        Some(json!({ "plan": "pro", "months": 1, "payment_id": "pay_1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, usage) = send(&app, Method::GET, "/usage/generations", Some(&token), None).await;
    assert_eq!(usage["generated_today"], 6);
    assert_eq!(usage["daily_limit"], 999);
    assert_eq!(usage["remaining"], 993);

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(&token),
        Some(json!({ "input_type": "text", "content": "mitosis" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn empty_video_url_is_ignored_on_update() {
    let app = test_app();
    let (_, token) = sign_up(&app, "a@x.com").await;
    let collection_id = create_collection(&app, &token, "Physics", 10).await;

    let (status, card) = send(
        &app,
        Method::POST,
        &format!("/collections/{collection_id}/flashcards"),
        Some(&token),
        Some(json!({ "front": "f", "back": "b", "video_url": "https://vimeo.com/1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let card_id = card["id"].as_str().unwrap();

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/collections/{collection_id}/flashcards/{card_id}"),
        Some(&token),
        Some(json!({ "back": "b2", "video_url": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["back"], "b2");
    assert_eq!(updated["video_url"], "https://vimeo.com/1");
}

#[tokio::test]
async fn bearer_scheme_is_matched_case_insensitively() {
    let app = test_app();
    let (_, token) = sign_up(&app, "a@x.com").await;

    for scheme in ["bearer", "BEARER", "Bearer"] {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/auth/me")
            .header(header::AUTHORIZATION, format!("{scheme} {token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{scheme}");
    }

    let request = Request::builder()
        .method(Method::GET)
        .uri("/auth/me")
        .header(header::AUTHORIZATION, format!("Basic {token}"))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
