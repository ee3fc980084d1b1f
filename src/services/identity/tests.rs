//! Tests for identity resolution

use super::*;
use crate::test_support::memory_pool;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

fn profile(external_id: &str, nickname: &str, email: Option<&str>) -> ExternalProfile {
    ExternalProfile {
        external_id: external_id.to_string(),
        nickname: nickname.to_string(),
        email: email.map(str::to_string),
        photo_url: None,
    }
}

async fn resolver() -> (IdentityResolver, Arc<SqliteIdentityStore>) {
    let store = Arc::new(SqliteIdentityStore::new(memory_pool().await));
    (IdentityResolver::new(store.clone()), store)
}

#[tokio::test]
async fn test_resolve_oauth_is_idempotent() {
    let (resolver, _) = resolver().await;

    let first = resolver
        .resolve_oauth(Provider::Kakao, &profile("123", "Old", None))
        .await
        .unwrap();
    let profile_a = ExternalProfile {
        photo_url: Some("http://img/a.png".to_string()),
        ..profile("123", "Minji", Some("minji@kakao.com"))
    };
    let second = resolver.resolve_oauth(Provider::Kakao, &profile_a).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.provider, IdentityProvider::Kakao);
    assert_eq!(second.nickname, "Minji");
    assert_eq!(second.email.as_deref(), Some("minji@kakao.com"));
    assert_eq!(second.photo_url.as_deref(), Some("http://img/a.png"));
    assert_eq!(second.created_at, first.created_at);
    assert!(second.last_authenticated_at >= first.last_authenticated_at);
}

#[tokio::test]
async fn test_same_external_id_different_providers() {
    let (resolver, _) = resolver().await;
    let kakao = resolver
        .resolve_oauth(Provider::Kakao, &profile("1", "A", None))
        .await
        .unwrap();
    let naver = resolver
        .resolve_oauth(Provider::Naver, &profile("1", "B", None))
        .await
        .unwrap();
    assert_ne!(kakao.id, naver.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_login_creates_one_identity() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("identities.db").display());
    let options = SqliteConnectOptions::from_str(&url).unwrap().create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .unwrap();
    crate::common::migrations::create_tables(&pool).await.unwrap();
    let resolver = IdentityResolver::new(Arc::new(SqliteIdentityStore::new(pool.clone())));

    let p = profile("never-seen", "Racer", None);
    let (a, b) = tokio::join!(
        resolver.resolve_oauth(Provider::Kakao, &p),
        resolver.resolve_oauth(Provider::Kakao, &p)
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id, b.id);

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM identities WHERE provider = 'kakao' AND external_id = 'never-seen'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

/// Delegates to SQLite but can refuse credential writes
struct FailingCredentialStore {
    inner: SqliteIdentityStore,
}

#[async_trait]
impl IdentityStore for FailingCredentialStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_external(
        &self,
        provider: IdentityProvider,
        external_id: &str,
    ) -> Result<Option<Identity>, StoreError> {
        self.inner.find_by_external(provider, external_id).await
    }

    async fn find_local_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        self.inner.find_local_by_email(email).await
    }

    async fn email_registered(&self, email: &str) -> Result<bool, StoreError> {
        self.inner.email_registered(email).await
    }

    async fn insert(&self, identity: &NewIdentity) -> Result<Identity, StoreError> {
        self.inner.insert(identity).await
    }

    async fn upsert_external(&self, identity: &NewIdentity) -> Result<Identity, StoreError> {
        self.inner.upsert_external(identity).await
    }

    async fn touch(&self, id: &str, authenticated_at: &str) -> Result<(), StoreError> {
        self.inner.touch(id, authenticated_at).await
    }

    async fn insert_credential(
        &self,
        _identity_id: &str,
        _email: &str,
        _password_digest: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::Protocol(
            "credential table unavailable".to_string(),
        )))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
}

#[tokio::test]
async fn test_later_login_without_email_keeps_it() {
    let (resolver, _) = resolver().await;
    let first = resolver
        .resolve_oauth(Provider::Naver, &profile("n-1", "First", Some("n@naver.com")))
        .await
        .unwrap();
    let second = resolver
        .resolve_oauth(Provider::Naver, &profile("n-1", "Second", None))
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.nickname, "Second");
    assert_eq!(second.email.as_deref(), Some("n@naver.com"));
}

#[tokio::test]
async fn test_insert_reports_unique_violation() {
    let (resolver, store) = resolver().await;
    let existing = resolver
        .resolve_oauth(Provider::Kakao, &profile("9", "K", None))
        .await
        .unwrap();

    let duplicate = NewIdentity {
        id: "U_OTHER".to_string(),
        provider: IdentityProvider::Kakao,
        external_id: existing.external_id.clone(),
        nickname: "K2".to_string(),
        email: None,
        photo_url: None,
        authenticated_at: existing.last_authenticated_at.clone(),
    };
    assert!(matches!(
        store.insert(&duplicate).await,
        Err(StoreError::UniqueViolation)
    ));
}

#[tokio::test]
async fn test_create_and_resolve_local() {
    let (resolver, _) = resolver().await;
    let created = resolver
        .create_local("  A@B.com ", "Ann", "salt:digest")
        .await
        .unwrap();
    assert_eq!(created.provider, IdentityProvider::Local);
    assert_eq!(created.external_id, "local_a@b.com");
    assert_eq!(created.email.as_deref(), Some("a@b.com"));

    let found = resolver.resolve_local("a@B.COM").await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.password_digest.as_deref(), Some("salt:digest"));

    assert!(resolver.resolve_local("nobody@b.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_local_account() {
    let (resolver, _) = resolver().await;
    resolver.create_local("a@b.com", "Ann", "d1").await.unwrap();
    let err = resolver.create_local("A@b.com", "Other", "d2").await.unwrap_err();
    assert!(matches!(err, ResolveError::DuplicateAccount));
}

#[tokio::test]
async fn test_social_email_blocks_local_signup() {
    let (resolver, store) = resolver().await;
    resolver
        .resolve_oauth(Provider::Kakao, &profile("5", "K", Some("A@b.com")))
        .await
        .unwrap();
    assert!(resolver.resolve_local("a@b.com").await.unwrap().is_none());

    let err = resolver.create_local("a@B.com", "Ann", "d").await.unwrap_err();
    assert!(matches!(err, ResolveError::DuplicateAccount));
    assert!(store
        .find_by_external(IdentityProvider::Local, "local_a@b.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_email_registered() {
    let (resolver, store) = resolver().await;
    assert!(!store.email_registered("n@naver.com").await.unwrap());
    resolver
        .resolve_oauth(Provider::Naver, &profile("n", "N", Some("n@naver.com")))
        .await
        .unwrap();
    assert!(store.email_registered("n@naver.com").await.unwrap());
    assert!(!store.email_registered("other@naver.com").await.unwrap());
}

#[tokio::test]
async fn test_failed_credential_write_removes_identity() {
    let sqlite = SqliteIdentityStore::new(memory_pool().await);
    let resolver = IdentityResolver::new(Arc::new(FailingCredentialStore {
        inner: sqlite.clone(),
    }));

    let err = resolver.create_local("x@y.com", "X", "d").await.unwrap_err();
    assert!(matches!(err, ResolveError::Store(StoreError::Database(_))));

    let orphan = sqlite
        .find_by_external(IdentityProvider::Local, "local_x@y.com")
        .await
        .unwrap();
    assert!(orphan.is_none());
}

#[tokio::test]
async fn test_touch_bumps_last_authenticated_at() {
    let (resolver, store) = resolver().await;
    let created = resolver.create_local("t@t.com", "T", "d").await.unwrap();

    store.touch(&created.id, "2999-01-01T00:00:00.000Z").await.unwrap();
    let after = resolver.find_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(after.last_authenticated_at, "2999-01-01T00:00:00.000Z");

    resolver.touch(&created.id).await.unwrap();
    let bumped = resolver.find_by_id(&created.id).await.unwrap().unwrap();
    assert!(bumped.last_authenticated_at < after.last_authenticated_at);
}

#[test]
fn test_identity_never_serializes_digest() {
    let identity = Identity {
        id: "U_1".to_string(),
        provider: IdentityProvider::Local,
        external_id: "local_a@b.com".to_string(),
        nickname: "Ann".to_string(),
        email: Some("a@b.com".to_string()),
        photo_url: None,
        password_digest: Some("secret".to_string()),
        last_authenticated_at: "now".to_string(),
        created_at: "now".to_string(),
    };
    let json = serde_json::to_value(&identity).unwrap();
    assert!(json.get("password_digest").is_none());
    assert_eq!(json["provider"], "local");
}
