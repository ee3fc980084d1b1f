// Test-only helpers: in-process HTTP servers and a scriptable OAuth provider

use axum::{
    extract::{Form, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use crate::common::config::ProviderCredentials;
use crate::services::providers::ProviderEndpoints;

pub const FAKE_ACCESS_TOKEN: &str = "fake-access-token";
pub const FAKE_CALLBACK: &str = "https://api.example.com/auth/kakao/callback";

/// Serve `router` on an ephemeral loopback port and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Canned responses for the token and profile endpoints
#[derive(Clone)]
pub struct FakeProvider {
    pub token_status: StatusCode,
    pub token_body: String,
    pub profile_status: StatusCode,
    pub profile_body: String,
    /// Delay before the token endpoint answers
    pub token_delay: Duration,
    pub token_requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub profile_auth: Arc<Mutex<Vec<String>>>,
}

impl FakeProvider {
    pub fn ok(profile_body: &str) -> Self {
        Self {
            token_status: StatusCode::OK,
            token_body: format!(r#"{{"access_token":"{}","token_type":"bearer"}}"#, FAKE_ACCESS_TOKEN),
            profile_status: StatusCode::OK,
            profile_body: profile_body.to_string(),
            token_delay: Duration::ZERO,
            token_requests: Arc::default(),
            profile_auth: Arc::default(),
        }
    }

    pub fn kakao_user(id: i64, nickname: &str) -> Self {
        Self::ok(&format!(
            r#"{{"id":{},"kakao_account":{{"email":"k{}@kakao.com","profile":{{"nickname":"{}"}}}}}}"#,
            id, id, nickname
        ))
    }

    pub fn last_token_request(&self) -> Option<HashMap<String, String>> {
        self.token_requests.lock().unwrap().last().cloned()
    }

    pub async fn start(&self) -> String {
        let router = Router::new()
            .route("/oauth/authorize", get(|| async { "authorize" }))
            .route("/oauth/token", post(token))
            .route("/me", get(profile))
            .with_state(self.clone());
        serve(router).await
    }
}

async fn token(
    State(fake): State<FakeProvider>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, String) {
    fake.token_requests.lock().unwrap().push(form);
    if !fake.token_delay.is_zero() {
        tokio::time::sleep(fake.token_delay).await;
    }
    (fake.token_status, fake.token_body.clone())
}

async fn profile(State(fake): State<FakeProvider>, headers: HeaderMap) -> (StatusCode, String) {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    fake.profile_auth.lock().unwrap().push(auth);
    (fake.profile_status, fake.profile_body.clone())
}

/// Credentials pointing at a fake provider started on `base`
pub fn credentials_for(base: &str) -> ProviderCredentials {
    ProviderCredentials {
        client_id: "client-123".to_string(),
        client_secret: Some("shh".to_string()),
        redirect_uri: FAKE_CALLBACK.to_string(),
        endpoints: ProviderEndpoints {
            authorize_url: format!("{}/oauth/authorize", base),
            token_url: format!("{}/oauth/token", base),
            profile_url: format!("{}/me", base),
        },
    }
}

/// Single-connection in-memory database with the identity schema
pub async fn memory_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crate::common::migrations::create_tables(&pool).await.unwrap();
    pool
}
