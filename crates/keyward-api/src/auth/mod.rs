//! Authentication module
//!
//! This module provides bearer-token authentication with the following components:
//! - Password hashing with Argon2
//! - JWT issuance and validation
//! - Authentication service for registration, login, lookup and credential rotation
//! - Middleware that gates protected routes on a valid token

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use jwt::{Claims, JwtConfig, JwtError, TokenIssuer};
pub use middleware::{auth_middleware, AuthenticatedIdentity};
pub use password::{hash_password, validate_password_strength, verify_password, PasswordError};
pub use service::{
    AuthService, ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse,
};
