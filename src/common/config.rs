// Process configuration, read once at start-up and passed down by parameter

use std::env;
use thiserror::Error;

use crate::services::providers::{Provider, ProviderEndpoints};

pub const DEFAULT_STATE_TTL_SECS: i64 = 600;
pub const DEFAULT_SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 30;
const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Credentials and canonical callback URL for one OAuth provider.
///
/// `redirect_uri` is the single source of truth for the callback URL: the
/// authorize request and the code exchange both send exactly this string.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub endpoints: ProviderEndpoints,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub auth_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub kakao: Option<ProviderCredentials>,
    pub naver: Option<ProviderCredentials>,
    pub cors_origins: Vec<String>,
    pub app_redirect_default: String,
    pub database_url: String,
    pub port: u16,
    pub session_ttl_secs: i64,
    pub state_ttl_secs: i64,
    pub provider_timeout_secs: u64,
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth_secret = env::var("AUTH_SECRET").map_err(|_| ConfigError::Missing("AUTH_SECRET"))?;
        if auth_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "AUTH_SECRET",
                reason: format!("must be at least {} bytes", MIN_SECRET_LEN),
            });
        }

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            auth_secret,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "crew-auth".to_string()),
            jwt_audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "crew-app".to_string()),
            kakao: provider_from_env(Provider::Kakao, "KAKAO"),
            naver: provider_from_env(Provider::Naver, "NAVER"),
            cors_origins,
            app_redirect_default: env::var("APP_REDIRECT_DEFAULT")
                .unwrap_or_else(|_| "http://localhost:5173/app".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://crew_auth.db".to_string()),
            port: parse_var("PORT", 8787)?,
            session_ttl_secs: positive(
                "SESSION_TTL_SECS",
                parse_var("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            )?,
            state_ttl_secs: positive(
                "STATE_TTL_SECS",
                parse_var("STATE_TTL_SECS", DEFAULT_STATE_TTL_SECS)?,
            )?,
            provider_timeout_secs: parse_var("PROVIDER_TIMEOUT_SECS", 10)?,
        })
    }

    pub fn provider(&self, provider: Provider) -> Option<&ProviderCredentials> {
        match provider {
            Provider::Kakao => self.kakao.as_ref(),
            Provider::Naver => self.naver.as_ref(),
        }
    }
}

/// A provider is enabled only when both its client id and callback URL are set.
fn provider_from_env(provider: Provider, prefix: &str) -> Option<ProviderCredentials> {
    let client_id = non_empty(&format!("{}_CLIENT_ID", prefix))?;
    let redirect_uri = non_empty(&format!("{}_REDIRECT_URI", prefix))?;

    Some(ProviderCredentials {
        client_id,
        client_secret: non_empty(&format!("{}_CLIENT_SECRET", prefix)),
        redirect_uri,
        endpoints: ProviderEndpoints::default_for(provider),
    })
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Token lifetimes must be at least one second
fn positive(name: &'static str, secs: i64) -> Result<i64, ConfigError> {
    if secs > 0 {
        Ok(secs)
    } else {
        Err(ConfigError::Invalid {
            name,
            reason: format!("must be a positive number of seconds, got {}", secs),
        })
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AuthConfig {
    AuthConfig {
        auth_secret: "test-secret-which-is-long-enough".to_string(),
        jwt_issuer: "crew-auth-test".to_string(),
        jwt_audience: "crew-app-test".to_string(),
        kakao: None,
        naver: None,
        cors_origins: vec!["https://app.example.com".to_string()],
        app_redirect_default: "https://app.example.com/app".to_string(),
        database_url: "sqlite::memory:".to_string(),
        port: 0,
        session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        state_ttl_secs: DEFAULT_STATE_TTL_SECS,
        provider_timeout_secs: 5,
    }
}
