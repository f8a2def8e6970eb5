//! API error handling
//!
//! Author: hephaex@gmail.com

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keyward_core::{RepositoryError, UniqueField};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Outcome of a failed authentication operation
///
/// Infrastructure failures collapse into `Internal` after being logged, so no
/// storage or hashing detail reaches the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("The username has been used")]
    DuplicateUsername,

    #[error("The email has been used")]
    DuplicateEmail,

    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("User not found")]
    NotFound,

    #[error("Internal server error")]
    Internal,
}

impl AuthError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::DuplicateUsername => "DUPLICATE_USERNAME",
            AuthError::DuplicateEmail => "DUPLICATE_EMAIL",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::NotFound => "NOT_FOUND",
            AuthError::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::DuplicateUsername | AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log an infrastructure failure and hide it behind `Internal`
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "{context}");
        AuthError::Internal
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateKey(UniqueField::Username) => AuthError::DuplicateUsername,
            RepositoryError::DuplicateKey(UniqueField::Email) => AuthError::DuplicateEmail,
            RepositoryError::NotFound => AuthError::NotFound,
            RepositoryError::Database(msg) => AuthError::internal("Identity store failure", msg),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = ApiError::new(self.code(), self.to_string());

        (status, Json(error)).into_response()
    }
}
