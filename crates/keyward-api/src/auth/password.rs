//! Password hashing and verification using Argon2id
//!
//! Implements secure password hashing following OWASP recommendations:
//! - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
//! - Memory: 64 MB
//! - Iterations: 3
//! - Parallelism: 4 threads
//! - Salt: 16 bytes random
//! - Output: 32 bytes hash
//!
//! The parameters are taken from [`PasswordConfig`] so deployments and tests
//! can tune them.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use keyward_core::PasswordConfig;
use thiserror::Error;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),
}

/// Create Argon2 parameters from a configuration
fn argon2_params(config: &PasswordConfig) -> Result<Params, PasswordError> {
    Params::new(
        config.memory_cost,
        config.time_cost,
        config.parallelism,
        config.output_len,
    )
    .map_err(|e| PasswordError::InvalidParams(e.to_string()))
}

/// Hash a plaintext password using Argon2id
///
/// # Arguments
///
/// * `password` - The plaintext password to hash
/// * `config` - Argon2 parameters
///
/// # Returns
///
/// * `Ok(String)` - PHC string format hash (includes algorithm, parameters, salt, and hash)
/// * `Err(PasswordError)` - If the parameters are rejected or hashing fails
///
/// # Example
///
/// ```no_run
/// use keyward_api::auth::password::hash_password;
/// use keyward_core::PasswordConfig;
///
/// let hash = hash_password("s3cret1", &PasswordConfig::default()).expect("Failed to hash password");
/// // Output: $argon2id$v=19$m=65536,t=3,p=4$...
/// ```
pub fn hash_password(password: &str, config: &PasswordConfig) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = argon2_params(config)?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored hash
///
/// Parameters are read from the PHC string, so hashes produced under an older
/// configuration keep verifying.
///
/// Returns `false` when the password does not match and also when the stored
/// hash cannot be parsed; a corrupt hash is a failed verification, not an error.
///
/// # Example
///
/// ```no_run
/// use keyward_api::auth::password::{hash_password, verify_password};
/// use keyward_core::PasswordConfig;
///
/// let hash = hash_password("s3cret1", &PasswordConfig::default()).unwrap();
///
/// assert!(verify_password("s3cret1", &hash));
/// assert!(!verify_password("wrong", &hash));
/// ```
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            return false;
        }
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => true,
        Err(argon2::password_hash::Error::Password) => false,
        Err(e) => {
            tracing::warn!(error = %e, "Password verification failed");
            false
        }
    }
}

/// Validate password strength
///
/// Checks if a password meets minimum security requirements:
/// - At least 8 characters
/// - At least 1 uppercase letter
/// - At least 1 lowercase letter
/// - At least 1 digit
/// - At least 1 special character
///
/// # Example
///
/// ```no_run
/// use keyward_api::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("SecureP@ssw0rd!").is_ok());
/// assert!(validate_password_strength("weak").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }

    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err("Password must contain at least one special character".to_string());
    }

    Ok(())
}

#[cfg(test)]
pub(crate) fn test_config() -> PasswordConfig {
    PasswordConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
        output_len: Some(32),
    }
}
