//! Authentication middleware for protecting routes
//!
//! Extracts and validates bearer tokens from the Authorization header.
//! On success, adds the authenticated subject to request extensions.

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AuthError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// Caller identity extracted from a validated token
///
/// This is added to request extensions by the auth middleware
/// and can be extracted in handlers using `Extension<AuthenticatedIdentity>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    /// Identity the token was issued for
    pub subject_id: Uuid,
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware that requires a valid bearer token
///
/// This middleware:
/// 1. Extracts the Bearer token from the Authorization header
/// 2. Validates the signature with the application's token issuer
/// 3. Adds `AuthenticatedIdentity` to request extensions
///
/// # Usage
///
/// ```ignore
/// use axum::{Router, routing::get, middleware};
/// use keyward_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let ip_address = extract_ip_address(request.headers());
    let user_agent = extract_user_agent(request.headers());

    let Some(token) = bearer_token(request.headers()) else {
        audit_log(&AuditEvent::InvalidToken {
            ip_address,
            user_agent,
            reason: "Missing or malformed Authorization header".to_string(),
        });
        return Err(AuthError::InvalidToken);
    };

    let subject_id = match state.auth.tokens().validate(token) {
        Ok(id) => id,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                ip_address,
                user_agent,
                reason: e.to_string(),
            });
            return Err(AuthError::InvalidToken);
        }
    };

    request
        .extensions_mut()
        .insert(AuthenticatedIdentity { subject_id });

    Ok(next.run(request).await)
}
