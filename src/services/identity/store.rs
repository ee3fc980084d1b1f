// src/services/identity/store.rs
//! Narrow storage contract for identities and its SQLite implementation

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::error;

use super::{Identity, IdentityProvider, NewIdentity};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    fn from_write(e: sqlx::Error) -> Self {
        let unique = e
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);
        if unique {
            StoreError::UniqueViolation
        } else {
            StoreError::Database(e)
        }
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_by_external(
        &self,
        provider: IdentityProvider,
        external_id: &str,
    ) -> Result<Option<Identity>, StoreError>;

    /// Local account lookup by an already normalized email
    async fn find_local_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    /// Whether any identity, local or social, already holds this normalized email
    async fn email_registered(&self, email: &str) -> Result<bool, StoreError>;

    /// Insert a new identity; `UniqueViolation` when `(provider, external_id)` exists
    async fn insert(&self, identity: &NewIdentity) -> Result<Identity, StoreError>;

    /// Insert, or refresh the profile of the row holding `(provider, external_id)`.
    ///
    /// One statement, so concurrent first logins converge on a single row.
    async fn upsert_external(&self, identity: &NewIdentity) -> Result<Identity, StoreError>;

    async fn touch(&self, id: &str, authenticated_at: &str) -> Result<(), StoreError>;

    /// Attach a password credential to a local identity
    async fn insert_credential(
        &self,
        identity_id: &str,
        email: &str,
        password_digest: &str,
    ) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

const SELECT_IDENTITY: &str = r#"
    SELECT i.id, i.provider, i.external_id, i.nickname, i.email, i.photo_url,
           c.password_digest, i.last_authenticated_at, i.created_at
    FROM identities i
    LEFT JOIN local_credentials c ON c.identity_id = i.id
"#;

#[derive(Debug, Clone)]
pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

impl SqliteIdentityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, clause: &str, binds: &[&str]) -> Result<Option<Identity>, StoreError> {
        let sql = format!("{} WHERE {}", SELECT_IDENTITY, clause);
        let mut query = sqlx::query_as::<_, Identity>(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        query.fetch_optional(&self.pool).await.map_err(|e| {
            error!(error = %e, "Database error during identity lookup");
            StoreError::Database(e)
        })
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        self.fetch_one_where("i.id = ?", &[id]).await
    }

    async fn find_by_external(
        &self,
        provider: IdentityProvider,
        external_id: &str,
    ) -> Result<Option<Identity>, StoreError> {
        self.fetch_one_where(
            "i.provider = ? AND i.external_id = ?",
            &[provider.as_str(), external_id],
        )
        .await
    }

    async fn find_local_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        self.fetch_one_where(
            "i.provider = ? AND c.email = ?",
            &[IdentityProvider::Local.as_str(), email],
        )
        .await
    }

    async fn email_registered(&self, email: &str) -> Result<bool, StoreError> {
        let hit: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT 1 FROM identities WHERE lower(trim(email)) = ?
            UNION ALL
            SELECT 1 FROM local_credentials WHERE email = ?
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hit.is_some())
    }

    async fn insert(&self, identity: &NewIdentity) -> Result<Identity, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO identities
                (id, provider, external_id, nickname, email, photo_url, last_authenticated_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&identity.id)
        .bind(identity.provider.as_str())
        .bind(&identity.external_id)
        .bind(&identity.nickname)
        .bind(identity.email.as_deref())
        .bind(identity.photo_url.as_deref())
        .bind(&identity.authenticated_at)
        .bind(&identity.authenticated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_write)?;

        self.find_by_id(&identity.id).await?.ok_or(StoreError::NotFound)
    }

    async fn upsert_external(&self, identity: &NewIdentity) -> Result<Identity, StoreError> {
        // email and photo are kept when a later login omits them
        sqlx::query(
            r#"
            INSERT INTO identities
                (id, provider, external_id, nickname, email, photo_url, last_authenticated_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (provider, external_id) DO UPDATE SET
                nickname = excluded.nickname,
                email = COALESCE(excluded.email, identities.email),
                photo_url = COALESCE(excluded.photo_url, identities.photo_url),
                last_authenticated_at = excluded.last_authenticated_at
            "#,
        )
        .bind(&identity.id)
        .bind(identity.provider.as_str())
        .bind(&identity.external_id)
        .bind(&identity.nickname)
        .bind(identity.email.as_deref())
        .bind(identity.photo_url.as_deref())
        .bind(&identity.authenticated_at)
        .bind(&identity.authenticated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_write)?;

        self.find_by_external(identity.provider, &identity.external_id)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn touch(&self, id: &str, authenticated_at: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE identities SET last_authenticated_at = ? WHERE id = ?")
            .bind(authenticated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_credential(
        &self,
        identity_id: &str,
        email: &str,
        password_digest: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO local_credentials (identity_id, email, password_digest) VALUES (?, ?, ?)",
        )
        .bind(identity_id)
        .bind(email)
        .bind(password_digest)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_write)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM local_credentials WHERE identity_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM identities WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
