//! Authentication API handlers
//!
//! Provides HTTP endpoints for registration, login, the current identity,
//! and credential rotation.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::{
    AuthenticatedIdentity, ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse,
};
use crate::error::AuthError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use keyward_core::IdentityPublic;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Plain confirmation message
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Register a new identity
///
/// Creates an account and returns it together with an access token.
///
/// # Responses
///
/// * `201 Created` - Identity registered
/// * `400 Bad Request` - Missing field or malformed email
/// * `409 Conflict` - Username or email already in use
/// * `500 Internal Server Error` - Server error
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = RegisterResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Username or email already used", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);
    let username = request.username.clone();

    match state.auth.register(request).await {
        Ok(response) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                user_id: response.user.id,
                username,
                ip_address,
                user_agent,
            });
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                username,
                reason: e.code().to_string(),
                ip_address,
                user_agent,
            });
            Err(e)
        }
    }
}

/// Login with username and password
///
/// Returns an access token. Unknown usernames and wrong passwords produce
/// the same response.
///
/// # Responses
///
/// * `200 OK` - Authentication successful
/// * `400 Bad Request` - Missing field
/// * `401 Unauthorized` - Invalid credentials
/// * `500 Internal Server Error` - Server error
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);
    let username = request.username.clone();

    match state.auth.login(request).await {
        Ok(response) => {
            // Subject comes from the token we just issued
            if let Ok(user_id) = state.auth.tokens().validate(&response.access_token) {
                audit_log(&AuditEvent::LoginSuccess {
                    user_id,
                    username,
                    ip_address,
                    user_agent,
                });
            }
            Ok(Json(response))
        }
        Err(e) => {
            audit_log(&AuditEvent::LoginFailure {
                username,
                reason: e.code().to_string(),
                ip_address,
                user_agent,
            });
            Err(e)
        }
    }
}

/// Get the current identity
///
/// Requires valid authentication.
#[utoipa::path(
    get,
    path = "/api/v1/auth",
    tag = "auth",
    responses(
        (status = 200, description = "Current identity", body = IdentityPublic),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "Identity no longer exists", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedIdentity>,
) -> Result<impl IntoResponse, AuthError> {
    let identity = state.auth.lookup(caller.subject_id).await?;
    Ok(Json(identity))
}

/// Change the current identity's password
///
/// Requires valid authentication. The current password is not required and
/// existing tokens stay valid.
#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "Identity no longer exists", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedIdentity>,
    headers: HeaderMap,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .auth
        .rotate_credential(caller.subject_id, request)
        .await?;

    audit_log(&AuditEvent::CredentialRotated {
        user_id: caller.subject_id,
        ip_address: extract_ip_address(&headers),
        user_agent: extract_user_agent(&headers),
    });

    Ok(Json(MessageResponse {
        message: "Password successfully changed".to_string(),
    }))
}
