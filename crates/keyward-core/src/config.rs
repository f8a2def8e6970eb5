//! Keyward Configuration Management
//!
//! Handles configuration from environment variables and TOML files,
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Identity store connection
    pub database: DatabaseConfig,

    /// Token issuing and credential policy
    pub auth: AuthConfig,

    /// Argon2 hashing parameters
    pub password: PasswordConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    /// Check that everything needed to serve requests is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.auth.token_secret.as_deref() {
            None | Some("") => Err(ConfigError::MissingRequired(
                "AUTH_TOKEN_SECRET".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env("API_PORT")? {
            self.server.port = port;
        }

        // Identity store
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(size) = parse_env("DATABASE_POOL_SIZE")? {
            self.database.pool_size = size;
        }

        // Tokens
        if let Ok(secret) = std::env::var("AUTH_TOKEN_SECRET") {
            self.auth.token_secret = Some(secret);
        }
        if let Ok(issuer) = std::env::var("AUTH_TOKEN_ISSUER") {
            self.auth.token_issuer = issuer;
        }
        if let Some(secs) = parse_env("AUTH_TOKEN_EXPIRATION_SECS")? {
            self.auth.token_expiration_secs = Some(secs);
        }
        if let Some(enforce) = parse_env("AUTH_ENFORCE_PASSWORD_STRENGTH")? {
            self.auth.enforce_password_strength = enforce;
        }

        // Argon2
        if let Some(memory) = parse_env("ARGON2_MEMORY_KIB")? {
            self.password.memory_cost = memory;
        }
        if let Some(iterations) = parse_env("ARGON2_ITERATIONS")? {
            self.password.time_cost = iterations;
        }
        if let Some(threads) = parse_env("ARGON2_PARALLELISM")? {
            self.password.parallelism = threads;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_env("LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Identity store configuration
///
/// Without a URL the server keeps identities in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: Option<String>,

    /// PostgreSQL connection pool size
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
        }
    }
}

/// Token and credential policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret for bearer tokens (required)
    pub token_secret: Option<String>,

    /// Value written to and required in the `iss` claim
    pub token_issuer: String,

    /// Token lifetime; `None` issues tokens without an `exp` claim
    pub token_expiration_secs: Option<u64>,

    /// Reject weak secrets at registration and rotation
    pub enforce_password_strength: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_issuer: "keyward".to_string(),
            token_expiration_secs: None,
            enforce_password_strength: false,
        }
    }
}

/// Password hashing configuration
///
/// These parameters are tuned for security while maintaining acceptable performance.
/// Increasing memory or iterations improves security but slows down hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (threads, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
