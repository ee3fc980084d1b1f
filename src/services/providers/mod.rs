// src/services/providers/mod.rs
//! OAuth2 provider adapters
//!
//! Every provider exposes the same three capabilities:
//! - build the authorize URL for a signed `state`
//! - exchange an authorization code for an access token
//! - fetch the user profile and normalize it into [`ExternalProfile`]
//!
//! Provider specifics (endpoints, scopes, profile schema) live in one module
//! per variant. Adding a provider means adding a [`Provider`] variant and its
//! module.

pub mod kakao;
pub mod naver;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::common::config::ProviderCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Kakao,
    Naver,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Kakao => "kakao",
            Provider::Naver => "naver",
        }
    }

    /// Human readable name used in diagnostics
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Kakao => "Kakao",
            Provider::Naver => "Naver",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kakao" => Ok(Provider::Kakao),
            "naver" => Ok(Provider::Naver),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
}

impl ProviderEndpoints {
    pub fn default_for(provider: Provider) -> Self {
        match provider {
            Provider::Kakao => kakao::endpoints(),
            Provider::Naver => naver::endpoints(),
        }
    }
}

/// Profile shape shared by all providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalProfile {
    pub external_id: String,
    pub nickname: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// Nickname used when a provider returns none
pub const DEFAULT_NICKNAME: &str = "Runner";

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-success upstream status, timeout or transport failure
    #[error("{} error: {} {body}", .provider.display_name(), status_label(.status))]
    Upstream {
        provider: Provider,
        status: Option<u16>,
        body: String,
    },

    #[error("{} response parse error", .provider.display_name())]
    Malformed { provider: Provider, detail: String },
}

fn status_label(status: &Option<u16>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unreachable".to_string())
}

impl ProviderError {
    fn malformed(provider: Provider, detail: impl Into<String>) -> Self {
        ProviderError::Malformed {
            provider,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// Configured adapter for one provider
#[derive(Debug, Clone)]
pub struct ProviderClient {
    provider: Provider,
    credentials: ProviderCredentials,
    http: Client,
}

impl ProviderClient {
    pub fn new(provider: Provider, credentials: ProviderCredentials, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(provider = %provider, error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        Self {
            provider,
            credentials,
            http,
        }
    }

    /// Canonical callback URL shared by the authorize request and the exchange
    pub fn callback_url(&self) -> &str {
        &self.credentials.redirect_uri
    }

    pub fn authorization_url(&self, state: &str) -> String {
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&state={}",
            self.credentials.endpoints.authorize_url,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(self.callback_url()),
            urlencoding::encode(state),
        );

        let scopes = match self.provider {
            Provider::Kakao => kakao::SCOPES,
            Provider::Naver => naver::SCOPES,
        };
        if !scopes.is_empty() {
            url.push_str("&scope=");
            url.push_str(&urlencoding::encode(&scopes.join(" ")));
        }

        url
    }

    /// Exchange an authorization code for an access token.
    ///
    /// Codes are single use, so failures are reported and never retried.
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<String, ProviderError> {
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.credentials.client_id.as_str()),
            ("redirect_uri", self.callback_url()),
            ("code", code),
        ];
        if let Some(secret) = &self.credentials.client_secret {
            params.push(("client_secret", secret.as_str()));
        }
        if self.provider == Provider::Naver {
            params.push(("state", state));
        }

        debug!(provider = %self.provider, "Exchanging authorization code for access token");

        let response = self
            .http
            .post(&self.credentials.endpoints.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            error!(provider = %self.provider, status = %status, body = %body, "Token exchange failed");
            return Err(ProviderError::Upstream {
                provider: self.provider,
                status: Some(status.as_u16()),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::malformed(self.provider, e.to_string()))?;

        match (parsed.access_token, parsed.error) {
            (Some(token), _) if !token.is_empty() => Ok(token),
            (_, Some(err)) => {
                error!(provider = %self.provider, error = %err, "Token endpoint returned an error");
                Err(ProviderError::Upstream {
                    provider: self.provider,
                    status: Some(status.as_u16()),
                    body,
                })
            }
            _ => Err(ProviderError::malformed(self.provider, "missing access_token")),
        }
    }

    /// Fetch and normalize the profile of the token's owner
    pub async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, ProviderError> {
        let response = self
            .http
            .get(&self.credentials.endpoints.profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            error!(provider = %self.provider, status = %status, body = %body, "Profile fetch failed");
            return Err(ProviderError::Upstream {
                provider: self.provider,
                status: Some(status.as_u16()),
                body,
            });
        }

        let profile = match self.provider {
            Provider::Kakao => kakao::normalize_profile(&body),
            Provider::Naver => naver::normalize_profile(&body),
        }?;

        debug!(
            provider = %self.provider,
            external_id = %profile.external_id,
            has_email = profile.email.is_some(),
            "Fetched provider profile"
        );
        Ok(profile)
    }

    fn transport_error(&self, e: reqwest::Error) -> ProviderError {
        error!(provider = %self.provider, error = %e, timeout = e.is_timeout(), "Provider request failed");
        ProviderError::Upstream {
            provider: self.provider,
            status: e.status().map(|s| s.as_u16()),
            body: if e.is_timeout() {
                "request timed out".to_string()
            } else {
                "request failed".to_string()
            },
        }
    }
}

/// First non-blank candidate, trimmed
pub(crate) fn first_non_blank<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
