//! Authentication service layer
//!
//! Provides business logic for registration, login, identity lookup, and
//! credential rotation on top of an [`IdentityRepository`].
//!
//! Operations that need "the current caller" take a subject id that the
//! transport has already extracted from a validated bearer token.

use super::jwt::TokenIssuer;
use super::password::{hash_password, validate_password_strength, verify_password};
use crate::error::AuthError;
use keyward_core::{AuthConfig, Identity, IdentityPublic, IdentityRepository, PasswordConfig};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use utoipa::ToSchema;
use uuid::Uuid;

/// Returned from both failing branches of login so that an unknown username
/// and a wrong password are indistinguishable.
const INVALID_CREDENTIALS: AuthError = AuthError::InvalidCredentials;

/// Verified against when the username does not exist, to keep login timing flat
const DUMMY_SECRET: &str = "keyward-dummy-secret";

/// User registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// User login request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Credential rotation request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub password: String,
}

/// Registration result: the new identity and a token for it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub user: IdentityPublic,
    pub access_token: String,
    pub token_type: String,
}

/// Login result
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    repository: Arc<dyn IdentityRepository>,
    tokens: TokenIssuer,
    password_config: PasswordConfig,
    enforce_password_strength: bool,
    dummy_hash: Arc<OnceLock<String>>,
}

impl AuthService {
    /// Create a new authentication service
    ///
    /// # Arguments
    ///
    /// * `repository` - Identity storage
    /// * `tokens` - Token issuer holding the signing secret
    /// * `password_config` - Argon2 parameters for new hashes
    /// * `auth` - Credential policy
    pub fn new(
        repository: Arc<dyn IdentityRepository>,
        tokens: TokenIssuer,
        password_config: PasswordConfig,
        auth: &AuthConfig,
    ) -> Self {
        Self {
            repository,
            tokens,
            password_config,
            enforce_password_strength: auth.enforce_password_strength,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Token issuer used by this service
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Register a new identity
    ///
    /// # Returns
    ///
    /// * `Ok(RegisterResponse)` - Public view of the new identity and its token
    /// * `Err(AuthError)` - `Validation`, `DuplicateUsername`, `DuplicateEmail`, or `Internal`
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AuthError> {
        if is_blank(&request.username) || is_blank(&request.email) || request.password.is_empty()
        {
            return Err(AuthError::Validation(
                "Please fill in username, email and password".to_string(),
            ));
        }

        if !request.email.contains('@') {
            return Err(AuthError::Validation("Invalid email format".to_string()));
        }

        self.check_strength(&request.password)?;

        // Not atomic with the insert below; a concurrent registration is
        // caught by the repository's unique constraint instead.
        if self
            .repository
            .find_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(AuthError::DuplicateUsername);
        }
        if self.repository.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let secret_hash = self.hash_secret(request.password).await?;
        let identity = Identity::new(request.username, request.email, secret_hash);

        let id = self.repository.insert(&identity).await?;
        let access_token = self.issue_token(id)?;

        tracing::info!(user_id = %id, username = %identity.username, "Identity registered");

        Ok(RegisterResponse {
            user: identity.to_public(),
            access_token,
            token_type: "Bearer".to_string(),
        })
    }

    /// Login with username and password
    ///
    /// # Returns
    ///
    /// * `Ok(LoginResponse)` - A fresh access token
    /// * `Err(AuthError)` - `Validation`, `InvalidCredentials`, or `Internal`
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        if is_blank(&request.username) || request.password.is_empty() {
            return Err(AuthError::Validation(
                "Please fill in username and password".to_string(),
            ));
        }

        let Some(identity) = self.repository.find_by_username(&request.username).await? else {
            self.burn_verification(request.password).await?;
            return Err(INVALID_CREDENTIALS);
        };

        if !self
            .verify_secret(request.password, identity.secret_hash.clone())
            .await?
        {
            return Err(INVALID_CREDENTIALS);
        }

        let access_token = self.issue_token(identity.id)?;
        tracing::debug!(user_id = %identity.id, "Login succeeded");

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
        })
    }

    /// Get the public view of an identity
    pub async fn lookup(&self, subject_id: Uuid) -> Result<IdentityPublic, AuthError> {
        self.repository
            .find_by_id(subject_id)
            .await?
            .map(IdentityPublic::from)
            .ok_or(AuthError::NotFound)
    }

    /// Replace the caller's secret
    ///
    /// The current secret is not asked for, no new token is issued, and
    /// tokens issued before the change remain valid.
    pub async fn rotate_credential(
        &self,
        subject_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        if request.password.is_empty() {
            return Err(AuthError::Validation("Please fill in password".to_string()));
        }
        self.check_strength(&request.password)?;

        let secret_hash = self.hash_secret(request.password).await?;
        self.repository
            .update_secret_hash(subject_id, &secret_hash)
            .await?;

        tracing::info!(user_id = %subject_id, "Credential rotated");
        Ok(())
    }

    fn check_strength(&self, password: &str) -> Result<(), AuthError> {
        if self.enforce_password_strength {
            validate_password_strength(password).map_err(AuthError::Validation)?;
        }
        Ok(())
    }

    fn issue_token(&self, subject_id: Uuid) -> Result<String, AuthError> {
        self.tokens
            .issue(subject_id)
            .map_err(|e| AuthError::internal("Failed to issue access token", e))
    }

    async fn hash_secret(&self, secret: String) -> Result<String, AuthError> {
        let config = self.password_config.clone();
        tokio::task::spawn_blocking(move || hash_password(&secret, &config))
            .await
            .map_err(|e| AuthError::internal("Hashing task failed", e))?
            .map_err(|e| AuthError::internal("Failed to hash password", e))
    }

    async fn verify_secret(&self, secret: String, hash: String) -> Result<bool, AuthError> {
        tokio::task::spawn_blocking(move || verify_password(&secret, &hash))
            .await
            .map_err(|e| AuthError::internal("Verification task failed", e))
    }

    async fn burn_verification(&self, secret: String) -> Result<(), AuthError> {
        let dummy_hash = self.dummy_hash.clone();
        let config = self.password_config.clone();
        tokio::task::spawn_blocking(move || {
            let hash = dummy_hash
                .get_or_init(|| hash_password(DUMMY_SECRET, &config).unwrap_or_default());
            verify_password(&secret, hash);
        })
        .await
        .map_err(|e| AuthError::internal("Verification task failed", e))
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
