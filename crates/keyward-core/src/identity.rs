//! Identity records
//!
//! An `Identity` is the one persisted entity of the authentication system.
//! Only `IdentityPublic` ever leaves the service boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Persisted account record
///
/// This maps to the `identities` table in PostgreSQL.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    /// Unique identifier, assigned at creation
    pub id: Uuid,

    /// Login name (unique, immutable)
    pub username: String,

    /// Contact address (unique, immutable)
    pub email: String,

    /// Argon2id PHC string of the current secret.
    /// This field is never serialized.
    #[serde(skip_serializing)]
    pub secret_hash: String,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last time the secret hash changed
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Create a new identity with a freshly assigned id
    ///
    /// # Arguments
    ///
    /// * `username` - Unique login name
    /// * `email` - Unique email address
    /// * `secret_hash` - Hashed secret (never the plaintext)
    pub fn new(username: String, email: String, secret_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            secret_hash,
            created_at: now,
            updated_at: now,
        }
    }

    /// Convert to the public representation (without the secret hash)
    pub fn to_public(&self) -> IdentityPublic {
        IdentityPublic {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public identity representation (safe for API responses)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IdentityPublic {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for IdentityPublic {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username,
            email: identity.email,
            created_at: identity.created_at,
        }
    }
}
