//! OpenAPI document for the HTTP surface
//!
//! Author: hephaex@gmail.com

use crate::auth::{ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::error::ApiError;
use crate::handlers::{auth, health};
use keyward_core::IdentityPublic;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness_check,
        auth::register_handler,
        auth::login_handler,
        auth::me_handler,
        auth::change_password_handler,
    ),
    components(schemas(
        RegisterRequest,
        RegisterResponse,
        LoginRequest,
        LoginResponse,
        ChangePasswordRequest,
        IdentityPublic,
        ApiError,
        auth::MessageResponse,
        health::HealthResponse,
        health::ReadinessResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration, login and credential management"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
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

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
