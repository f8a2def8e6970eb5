//! Identity storage interface
//!
//! The authentication service only talks to storage through
//! `IdentityRepository`. Implementations must enforce uniqueness of
//! `username` and `email` on insert and report a violation as
//! `RepositoryError::DuplicateKey`, since the service's existence checks
//! are not atomic with the insert.

use crate::identity::Identity;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Unique-constrained identity fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Username => write!(f, "username"),
            Self::Email => write!(f, "email"),
        }
    }
}

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Duplicate {0}")]
    DuplicateKey(UniqueField),

    #[error("Identity not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for identity storage
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Find an identity by its login name
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, RepositoryError>;

    /// Find an identity by its email address
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, RepositoryError>;

    /// Find an identity by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, RepositoryError>;

    /// Persist a new identity
    async fn insert(&self, identity: &Identity) -> Result<Uuid, RepositoryError>;

    /// Replace the stored secret hash
    async fn update_secret_hash(&self, id: Uuid, secret_hash: &str)
        -> Result<(), RepositoryError>;
}

/// In-memory identity store
///
/// Uniqueness is checked and the record inserted under a single write lock.
#[derive(Debug, Default)]
pub struct InMemoryIdentityRepository {
    identities: RwLock<HashMap<Uuid, Identity>>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored identities
    pub async fn len(&self) -> usize {
        self.identities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.identities.read().await.is_empty()
    }
}

#[async_trait]
impl IdentityRepository for InMemoryIdentityRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, RepositoryError> {
        let identities = self.identities.read().await;
        Ok(identities
            .values()
            .find(|identity| identity.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, RepositoryError> {
        let identities = self.identities.read().await;
        Ok(identities
            .values()
            .find(|identity| identity.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, RepositoryError> {
        Ok(self.identities.read().await.get(&id).cloned())
    }

    async fn insert(&self, identity: &Identity) -> Result<Uuid, RepositoryError> {
        let mut identities = self.identities.write().await;

        for existing in identities.values() {
            if existing.username == identity.username {
                return Err(RepositoryError::DuplicateKey(UniqueField::Username));
            }
            if existing.email == identity.email {
                return Err(RepositoryError::DuplicateKey(UniqueField::Email));
            }
        }

        // Primary key collision is not expected with v4 ids
        if identities.contains_key(&identity.id) {
            return Err(RepositoryError::Database(format!(
                "Identity {} already exists",
                identity.id
            )));
        }

        identities.insert(identity.id, identity.clone());
        Ok(identity.id)
    }

    async fn update_secret_hash(
        &self,
        id: Uuid,
        secret_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut identities = self.identities.write().await;
        let identity = identities.get_mut(&id).ok_or(RepositoryError::NotFound)?;

        identity.secret_hash = secret_hash.to_string();
        identity.updated_at = Utc::now();
        Ok(())
    }
}
