//! Session extractor for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::request::Parts,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::common::{safe_token_log, AppState, AuthError};
use crate::services::cookies::session_from_headers;
use crate::services::tokens::{SessionClaims, Verified};

/// Session presented with the request, if any.
///
/// `None` when neither a bearer token nor the session cookie is sent.
/// A token that is present but fails verification rejects with 401.
#[derive(Debug)]
pub struct MaybeSession(pub Option<Verified<SessionClaims>>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app): Extension<Arc<AppState>> = Extension::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthError::ServerMisconfiguration("missing app state".to_string()))?;

        let Some(token) = session_from_headers(&parts.headers) else {
            debug!("No session token presented");
            return Ok(MaybeSession(None));
        };

        match app.signer.verify_session(&token) {
            Ok(verified) => {
                debug!(user_id = %verified.payload.sub, "Session token verified");
                Ok(MaybeSession(Some(verified)))
            }
            Err(e) => {
                warn!(token = %safe_token_log(&token), error = %e, "Session verification failed");
                Err(AuthError::Unauthorized(e.to_string()))
            }
        }
    }
}
