//! Keyward Core - Identity model, storage traits, and configuration
//!
//! This crate defines the pieces of the authentication system that do not
//! depend on any transport:
//! - The persisted `Identity` record and its public view
//! - The `IdentityRepository` storage interface
//! - An in-memory repository and a PostgreSQL repository
//! - Configuration management

pub mod config;
pub mod identity;
pub mod postgres;
pub mod repository;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, PasswordConfig,
    ServerConfig,
};
pub use identity::{Identity, IdentityPublic};
pub use postgres::PgIdentityRepository;
pub use repository::{
    IdentityRepository, InMemoryIdentityRepository, RepositoryError, UniqueField,
};
