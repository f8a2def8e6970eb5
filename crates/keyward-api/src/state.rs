//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::{AuthService, JwtConfig, TokenIssuer};
use keyward_core::{AppConfig, ConfigError, IdentityRepository};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Authentication service
    pub auth: AuthService,
}

impl AppState {
    /// Create application state on top of an identity store
    ///
    /// Fails when no token signing secret is configured.
    pub fn new(
        config: AppConfig,
        repository: Arc<dyn IdentityRepository>,
    ) -> Result<Self, ConfigError> {
        let jwt_config = JwtConfig::from_auth_config(&config.auth)
            .ok_or_else(|| ConfigError::MissingRequired("AUTH_TOKEN_SECRET".to_string()))?;

        let auth = AuthService::new(
            repository,
            TokenIssuer::new(jwt_config),
            config.password.clone(),
            &config.auth,
        );

        Ok(Self {
            config,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
            auth,
        })
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
