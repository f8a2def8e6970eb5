//! PostgreSQL identity store
//!
//! Stores identities with SQLx. Uniqueness of `username` and `email` is
//! enforced by named constraints, and a violation on insert is reported as
//! `RepositoryError::DuplicateKey` for the violated field.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::identity::Identity;
use crate::repository::{IdentityRepository, RepositoryError, UniqueField};

const USERNAME_CONSTRAINT: &str = "identities_username_key";
const EMAIL_CONSTRAINT: &str = "identities_email_key";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS identities (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL CONSTRAINT identities_username_key UNIQUE,
        email TEXT NOT NULL CONSTRAINT identities_email_key UNIQUE,
        secret_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

/// PostgreSQL identity store
#[derive(Clone)]
pub struct PgIdentityRepository {
    pool: PgPool,
}

impl PgIdentityRepository {
    /// Create a new store connection
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::Database(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `identities` table if it does not exist
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to create schema: {e}")))?;

        Ok(())
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Identity>, RepositoryError> {
        let query = format!(
            "SELECT id, username, email, secret_hash, created_at, updated_at \
             FROM identities WHERE {column} = $1"
        );

        sqlx::query_as::<_, Identity>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to fetch identity: {e}")))
    }
}

/// Map a violated constraint name to the identity field it guards
fn unique_field_for_constraint(constraint: &str) -> Option<UniqueField> {
    match constraint {
        USERNAME_CONSTRAINT => Some(UniqueField::Username),
        EMAIL_CONSTRAINT => Some(UniqueField::Email),
        _ => None,
    }
}

fn map_insert_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            if let Some(field) = db_err.constraint().and_then(unique_field_for_constraint) {
                return RepositoryError::DuplicateKey(field);
            }
        }
    }
    RepositoryError::Database(format!("Failed to insert identity: {err}"))
}

#[async_trait]
impl IdentityRepository for PgIdentityRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, RepositoryError> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, RepositoryError> {
        self.find_one("email", email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, RepositoryError> {
        sqlx::query_as::<_, Identity>(
            "SELECT id, username, email, secret_hash, created_at, updated_at FROM identities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to fetch identity: {e}")))
    }

    async fn insert(&self, identity: &Identity) -> Result<Uuid, RepositoryError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO identities (id, username, email, secret_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(identity.id)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.secret_hash)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(row.0)
    }

    async fn update_secret_hash(
        &self,
        id: Uuid,
        secret_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE identities SET secret_hash = $1, updated_at = NOW() WHERE id = $2")
                .bind(secret_hash)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    RepositoryError::Database(format!("Failed to update secret hash: {e}"))
                })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
