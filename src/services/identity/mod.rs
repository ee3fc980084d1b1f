// src/services/identity/mod.rs
//! Identity resolution
//!
//! Maps an external `(provider, external_id)` pair, or a local email, to the
//! canonical [`Identity`] record. OAuth logins go through a single
//! insert-or-update keyed on `(provider, external_id)`, so concurrent first
//! logins for the same account end up on one row.

pub mod store;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::common::{generate_identity_id, safe_email_log};
use crate::services::providers::{ExternalProfile, Provider};
pub use store::{IdentityStore, SqliteIdentityStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum IdentityProvider {
    Kakao,
    Naver,
    Local,
}

impl IdentityProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityProvider::Kakao => "kakao",
            IdentityProvider::Naver => "naver",
            IdentityProvider::Local => "local",
        }
    }
}

impl From<Provider> for IdentityProvider {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Kakao => IdentityProvider::Kakao,
            Provider::Naver => IdentityProvider::Naver,
        }
    }
}

/// Canonical user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Identity {
    pub id: String,
    pub provider: IdentityProvider,
    pub external_id: String,
    pub nickname: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    #[serde(skip_serializing)]
    pub password_digest: Option<String>,
    pub last_authenticated_at: String,
    pub created_at: String,
}

/// Row to insert for a first-time login or signup
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub id: String,
    pub provider: IdentityProvider,
    pub external_id: String,
    pub nickname: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub authenticated_at: String,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("email already registered")]
    DuplicateAccount,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Lower-cased, trimmed email used for every local-account lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// External id for a local account
pub fn local_external_id(email: &str) -> String {
    format!("local_{}", normalize_email(email))
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Create-or-update the identity behind an OAuth login
    pub async fn resolve_oauth(
        &self,
        provider: Provider,
        profile: &ExternalProfile,
    ) -> Result<Identity, ResolveError> {
        let new = NewIdentity {
            id: generate_identity_id(),
            provider: IdentityProvider::from(provider),
            external_id: profile.external_id.clone(),
            nickname: profile.nickname.clone(),
            email: profile.email.clone(),
            photo_url: profile.photo_url.clone(),
            authenticated_at: now_rfc3339(),
        };

        let identity = self.store.upsert_external(&new).await?;
        if identity.id == new.id {
            info!(user_id = %identity.id, provider = %provider, "Created identity");
        } else {
            debug!(user_id = %identity.id, provider = %provider, "Refreshed existing identity");
        }
        Ok(identity)
    }

    /// Local account for `email`, with its password digest populated
    pub async fn resolve_local(&self, email: &str) -> Result<Option<Identity>, ResolveError> {
        Ok(self.store.find_local_by_email(&normalize_email(email)).await?)
    }

    /// Register a local account.
    ///
    /// Fails with `DuplicateAccount` when any identity, including a Kakao or
    /// Naver one, already holds the email.
    ///
    /// The identity row and the credential row are written separately; if
    /// the credential write fails the identity row is deleted again.
    pub async fn create_local(
        &self,
        email: &str,
        nickname: &str,
        password_digest: &str,
    ) -> Result<Identity, ResolveError> {
        let email = normalize_email(email);
        if self.store.email_registered(&email).await? {
            debug!(email = %safe_email_log(&email), "Signup email already registered");
            return Err(ResolveError::DuplicateAccount);
        }

        let new = NewIdentity {
            id: generate_identity_id(),
            provider: IdentityProvider::Local,
            external_id: local_external_id(&email),
            nickname: nickname.to_string(),
            email: Some(email.clone()),
            photo_url: None,
            authenticated_at: now_rfc3339(),
        };

        let identity = match self.store.insert(&new).await {
            Ok(identity) => identity,
            Err(StoreError::UniqueViolation) => return Err(ResolveError::DuplicateAccount),
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self
            .store
            .insert_credential(&identity.id, &email, password_digest)
            .await
        {
            warn!(user_id = %identity.id, error = %e, "Credential write failed, removing identity");
            if let Err(cleanup) = self.store.delete(&identity.id).await {
                error!(user_id = %identity.id, error = %cleanup, "Failed to remove orphaned identity");
            }
            return Err(match e {
                StoreError::UniqueViolation => ResolveError::DuplicateAccount,
                other => other.into(),
            });
        }

        info!(user_id = %identity.id, email = %safe_email_log(&email), "Created local account");
        Ok(Identity {
            password_digest: Some(password_digest.to_string()),
            ..identity
        })
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, ResolveError> {
        Ok(self.store.find_by_id(id).await?)
    }

    /// Record a successful authentication
    pub async fn touch(&self, id: &str) -> Result<(), ResolveError> {
        Ok(self.store.touch(id, &now_rfc3339()).await?)
    }
}

#[cfg(test)]
mod tests;
