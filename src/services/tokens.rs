// src/services/tokens.rs
//! HMAC-signed, time-bound tokens
//!
//! One primitive serves two purposes:
//! - the short-lived OAuth `state` value carrying the post-login redirect
//! - the long-lived session token (`sub`, `nickname`, `iss`, `aud`)
//!
//! Tokens use the compact JWS layout (`header.payload.signature`, HS256).
//! Expiry is checked against an injected [`Clock`] rather than wall time so
//! verification stays a pure function of (token, secret, clock).

use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::common::config::AuthConfig;
use crate::services::identity::Identity;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token claims do not match")]
    ClaimMismatch,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Source of the current time in seconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually driven clock for tests
#[cfg(test)]
#[derive(Debug)]
pub struct FixedClock(std::sync::atomic::AtomicI64);

#[cfg(test)]
impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self(std::sync::atomic::AtomicI64::new(now))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Issuer/audience pair bound into session tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimBinding {
    pub issuer: String,
    pub audience: String,
}

/// Claims carried by the OAuth state token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateClaims {
    pub redirect: String,
}

/// Claims carried by the session token (besides `iss`/`aud`/`iat`/`exp`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String,
    pub nickname: String,
}

/// A successfully verified payload together with its validity window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified<T> {
    pub payload: T,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    #[serde(flatten)]
    payload: T,
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
}

#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    clock: Arc<dyn Clock>,
    binding: ClaimBinding,
    state_ttl_secs: i64,
    session_ttl_secs: i64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"<redacted>")
            .field("binding", &self.binding)
            .field("state_ttl_secs", &self.state_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: &[u8], binding: ClaimBinding, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            clock,
            binding,
            state_ttl_secs: crate::common::config::DEFAULT_STATE_TTL_SECS,
            session_ttl_secs: crate::common::config::DEFAULT_SESSION_TTL_SECS,
        }
    }

    pub fn from_config(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let binding = ClaimBinding {
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
        };
        Self::new(config.auth_secret.as_bytes(), binding, clock).with_ttls(
            config.state_ttl_secs,
            config.session_ttl_secs,
        )
    }

    pub fn with_ttls(mut self, state_ttl_secs: i64, session_ttl_secs: i64) -> Self {
        self.state_ttl_secs = state_ttl_secs;
        self.session_ttl_secs = session_ttl_secs;
        self
    }

    pub fn session_ttl_secs(&self) -> i64 {
        self.session_ttl_secs
    }

    /// Sign `payload` with `iat = now` and `exp = now + ttl_secs`.
    ///
    /// When `binding` is given, `iss` and `aud` are embedded and must be
    /// presented again at verification.
    pub fn sign<T: Serialize>(
        &self,
        payload: T,
        ttl_secs: i64,
        binding: Option<&ClaimBinding>,
    ) -> Result<String, TokenError> {
        if ttl_secs <= 0 {
            return Err(TokenError::Encoding("ttl must be positive".to_string()));
        }

        let now = self.clock.now();
        let envelope = Envelope {
            payload,
            iat: now,
            exp: now + ttl_secs,
            iss: binding.map(|b| b.issuer.clone()),
            aud: binding.map(|b| b.audience.clone()),
        };

        encode(&Header::new(Algorithm::HS256), &envelope, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature, issuer/audience (when required) and expiry.
    pub fn verify<T: DeserializeOwned>(
        &self,
        token: &str,
        binding: Option<&ClaimBinding>,
    ) -> Result<Verified<T>, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is checked below against the injected clock
        validation.validate_exp = false;
        validation.leeway = 0;
        match binding {
            Some(b) => {
                validation.set_issuer(&[b.issuer.as_str()]);
                validation.set_audience(&[b.audience.as_str()]);
                validation.set_required_spec_claims(&["exp", "iss", "aud"]);
            }
            None => validation.set_required_spec_claims(&["exp"]),
        }

        let data = decode::<Envelope<serde_json::Value>>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::MissingRequiredClaim(_) => TokenError::ClaimMismatch,
                _ => TokenError::InvalidSignature,
            })?;

        let envelope = data.claims;
        if self.clock.now() >= envelope.exp {
            return Err(TokenError::Expired);
        }

        let payload =
            serde_json::from_value::<T>(envelope.payload).map_err(|_| TokenError::ClaimMismatch)?;

        Ok(Verified {
            payload,
            issued_at: envelope.iat,
            expires_at: envelope.exp,
        })
    }

    pub fn issue_state(&self, redirect: &str) -> Result<String, TokenError> {
        let claims = StateClaims {
            redirect: redirect.to_string(),
        };
        self.sign(claims, self.state_ttl_secs, None)
    }

    pub fn verify_state(&self, token: &str) -> Result<StateClaims, TokenError> {
        self.verify::<StateClaims>(token, None).map(|v| v.payload)
    }

    pub fn issue_session(&self, identity: &Identity) -> Result<String, TokenError> {
        let claims = SessionClaims {
            sub: identity.id.clone(),
            nickname: identity.nickname.clone(),
        };
        self.sign(claims, self.session_ttl_secs, Some(&self.binding))
    }

    pub fn verify_session(&self, token: &str) -> Result<Verified<SessionClaims>, TokenError> {
        self.verify::<SessionClaims>(token, Some(&self.binding))
    }
}
