//! API Integration Tests
//!
//! Every test runs against the in-memory identity store, so no database is
//! needed.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use keyward_api::{create_router, state::AppState};
use keyward_core::{AppConfig, InMemoryIdentityRepository, PasswordConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Router backed by a fresh in-memory store and cheap Argon2 parameters
fn create_router_for_testing() -> Router {
    let mut config = AppConfig::default();
    config.auth.token_secret = Some("integration-test-secret".to_string());
    config.password = PasswordConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
        output_len: Some(32),
    };

    let state = AppState::new(config, Arc::new(InMemoryIdentityRepository::new()))
        .expect("test state");
    create_router(Arc::new(state))
}

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn bearer_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let mut request = create_json_request(method, uri, body);
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn register(app: &Router, username: &str, email: &str, password: &str) -> (StatusCode, Value) {
    send_json(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({ "username": username, "email": email, "password": password })),
        ),
    )
    .await
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Vec<u8>) {
    send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "username": username, "password": password })),
        ),
    )
    .await
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert!(json["uptime_seconds"].is_number());
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/v1/auth/login"].is_object());
}

// =============================================================================
// Registration Tests
// =============================================================================

#[tokio::test]
async fn test_register_returns_created_identity_and_token() {
    let app = create_router_for_testing();

    let (status, json) = register(&app, "alice", "alice@example.com", "password").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user"]["username"], "alice");
    assert_eq!(json["user"]["email"], "alice@example.com");
    assert!(json["user"]["id"].is_string());
    assert!(json["user"].get("secret_hash").is_none());
    assert!(json["access_token"].is_string());
    assert_eq!(json["token_type"], "Bearer");
}

#[tokio::test]
async fn test_register_duplicate_username_conflict() {
    let app = create_router_for_testing();

    let (status, _) = register(&app, "alice", "alice@example.com", "password").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = register(&app, "alice", "other@example.com", "password").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "DUPLICATE_USERNAME");
    assert_eq!(json["message"], "The username has been used");
}

#[tokio::test]
async fn test_register_duplicate_email_conflict() {
    let app = create_router_for_testing();

    register(&app, "alice", "alice@example.com", "password").await;

    let (status, json) = register(&app, "bob", "alice@example.com", "password").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "DUPLICATE_EMAIL");
    assert_eq!(json["message"], "The email has been used");
}

#[tokio::test]
async fn test_register_missing_fields_rejected() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({ "username": "bob" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

// =============================================================================
// Login Tests
// =============================================================================

#[tokio::test]
async fn test_login_returns_token_for_identity() {
    let app = create_router_for_testing();

    let (_, registered) = register(&app, "alice", "alice@example.com", "password").await;

    let (status, body) = login(&app, "alice", "password").await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    let token = json["access_token"].as_str().unwrap();
    assert_eq!(json["token_type"], "Bearer");

    let (status, me) = send_json(&app, bearer_request("GET", "/api/v1/auth", token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], registered["user"]["id"]);
    assert_eq!(me["username"], "alice");
    assert!(me.get("secret_hash").is_none());
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = create_router_for_testing();

    register(&app, "alice", "alice@example.com", "password").await;

    let (wrong_status, wrong_body) = login(&app, "alice", "not-the-password").await;
    let (unknown_status, unknown_body) = login(&app, "mallory", "password").await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);

    let json: Value = serde_json::from_slice(&wrong_body).unwrap();
    assert_eq!(json["code"], "INVALID_CREDENTIALS");
    assert_eq!(json["message"], "Incorrect username or password");
}

#[tokio::test]
async fn test_login_missing_password_rejected() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "username": "alice" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

// =============================================================================
// Protected Route Tests
// =============================================================================

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = create_router_for_testing();

    let (status, json) = send_json(&app, create_json_request("GET", "/api/v1/auth", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_protected_route_with_garbage_token() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        bearer_request("GET", "/api/v1/auth", "not.a.token", None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_protected_route_with_tampered_token() {
    let app = create_router_for_testing();

    let (_, registered) = register(&app, "alice", "alice@example.com", "password").await;
    let token = registered["access_token"].as_str().unwrap();

    // Flip one character inside the signature segment
    let mut bytes = token.as_bytes().to_vec();
    let index = bytes.len() - 10;
    bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(bytes).unwrap();

    let (status, _) = send_json(&app, bearer_request("GET", "/api/v1/auth", &tampered, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_from_other_deployment_rejected() {
    let app = create_router_for_testing();

    let mut config = AppConfig::default();
    config.auth.token_secret = Some("some-other-secret".to_string());
    config.password.memory_cost = 1024;
    config.password.time_cost = 1;
    config.password.parallelism = 1;
    let other = create_router(Arc::new(
        AppState::new(config, Arc::new(InMemoryIdentityRepository::new())).unwrap(),
    ));

    let (_, registered) = register(&other, "alice", "alice@example.com", "password").await;
    let token = registered["access_token"].as_str().unwrap();

    let (status, _) = send_json(&app, bearer_request("GET", "/api/v1/auth", token, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Credential Rotation Tests
// =============================================================================

#[tokio::test]
async fn test_change_password_flow() {
    let app = create_router_for_testing();

    let (_, registered) = register(&app, "alice", "alice@example.com", "password").await;
    let token = registered["access_token"].as_str().unwrap();

    let (status, json) = send_json(
        &app,
        bearer_request(
            "POST",
            "/api/v1/auth/change-password",
            token,
            Some(json!({ "password": "a-new-password" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Password successfully changed");

    let (status, _) = login(&app, "alice", "password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = login(&app, "alice", "a-new-password").await;
    assert_eq!(status, StatusCode::OK);

    // Tokens issued before the change keep working
    let (status, _) = send_json(&app, bearer_request("GET", "/api/v1/auth", token, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_requires_token() {
    let app = create_router_for_testing();

    let (status, _) = send_json(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/change-password",
            Some(json!({ "password": "a-new-password" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_empty_rejected() {
    let app = create_router_for_testing();

    let (_, registered) = register(&app, "alice", "alice@example.com", "password").await;
    let token = registered["access_token"].as_str().unwrap();

    let (status, json) = send_json(
        &app,
        bearer_request(
            "POST",
            "/api/v1/auth/change-password",
            token,
            Some(json!({ "password": "" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}
