//! Keyward API - credential and session service
//!
//! Provides HTTP endpoints for registering identities, logging in with a
//! username and password, and acting on behalf of a bearer token.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa_swagger_ui::SwaggerUi;

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .merge(routes::health_routes())
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
