// Error types returned at the HTTP boundary

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::fmt;
use tracing::error;

use super::validation::ValidationResult;
use crate::services::identity::{ResolveError, StoreError};
use crate::services::providers::ProviderError;

/// Every failure a handler can surface.
///
/// Responses are plain text; secrets never appear in them.
#[derive(Debug)]
pub enum AuthError {
    BadRequest(String),
    InvalidState,
    Provider(ProviderError),
    InvalidCredentials,
    DuplicateAccount,
    WeakPassword(String),
    Unauthorized(String),
    BackingStore(StoreError),
    ServerMisconfiguration(String),
}

impl AuthError {
    /// Label of the error kind, used when a flow terminates
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::BadRequest(_) => "BadRequest",
            AuthError::InvalidState => "InvalidState",
            AuthError::Provider(ProviderError::Upstream { .. }) => "ProviderError",
            AuthError::Provider(ProviderError::Malformed { .. }) => "MalformedProviderResponse",
            AuthError::InvalidCredentials => "InvalidCredentials",
            AuthError::DuplicateAccount => "DuplicateAccount",
            AuthError::WeakPassword(_) => "WeakPassword",
            AuthError::Unauthorized(_) => "Unauthorized",
            AuthError::BackingStore(_) => "BackingStoreError",
            AuthError::ServerMisconfiguration(_) => "ServerMisconfiguration",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::BadRequest(_) | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidState | AuthError::InvalidCredentials | AuthError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Provider(_) => StatusCode::BAD_GATEWAY,
            AuthError::DuplicateAccount => StatusCode::CONFLICT,
            AuthError::BackingStore(_) | AuthError::ServerMisconfiguration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AuthError::InvalidState => write!(f, "Unauthorized: bad state"),
            AuthError::Provider(e) => write!(f, "{}", e),
            AuthError::InvalidCredentials => write!(f, "Unauthorized: invalid email or password"),
            AuthError::DuplicateAccount => write!(f, "Conflict: email already registered"),
            AuthError::WeakPassword(reason) => write!(f, "Bad Request: {}", reason),
            AuthError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AuthError::BackingStore(_) => write!(f, "Store error"),
            AuthError::ServerMisconfiguration(msg) => write!(f, "Server misconfiguration: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::BackingStore(e) => error!(error = %e, "Identity store error"),
            AuthError::Provider(ProviderError::Malformed { provider, detail }) => {
                error!(provider = %provider, detail = %detail, "Malformed provider response")
            }
            AuthError::ServerMisconfiguration(msg) => error!(detail = %msg, "Server misconfiguration"),
            _ => {}
        }

        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

impl From<ProviderError> for AuthError {
    fn from(e: ProviderError) -> Self {
        AuthError::Provider(e)
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::BackingStore(e)
    }
}

impl From<ResolveError> for AuthError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::DuplicateAccount => AuthError::DuplicateAccount,
            ResolveError::Store(e) => AuthError::BackingStore(e),
        }
    }
}

/// Convert a failed ValidationResult into a 400
impl From<ValidationResult> for AuthError {
    fn from(result: ValidationResult) -> Self {
        let messages: Vec<String> = result
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        AuthError::BadRequest(messages.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::Provider;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::InvalidState.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::DuplicateAccount.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::WeakPassword("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::BackingStore(StoreError::NotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::ServerMisconfiguration("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_provider_error_kinds() {
        let upstream = AuthError::from(ProviderError::Upstream {
            provider: Provider::Kakao,
            status: Some(401),
            body: "nope".to_string(),
        });
        assert_eq!(upstream.kind(), "ProviderError");
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(upstream.to_string(), "Kakao error: 401 nope");

        let malformed = AuthError::from(ProviderError::Malformed {
            provider: Provider::Naver,
            detail: "eof".to_string(),
        });
        assert_eq!(malformed.kind(), "MalformedProviderResponse");
        assert_eq!(malformed.to_string(), "Naver response parse error");
    }

    #[test]
    fn test_store_detail_not_exposed() {
        let err = AuthError::BackingStore(StoreError::Database(sqlx::Error::Protocol(
            "disk I/O error at /var/db".to_string(),
        )));
        assert_eq!(err.to_string(), "Store error");
    }

    #[test]
    fn test_bad_state_text() {
        assert_eq!(AuthError::InvalidState.to_string(), "Unauthorized: bad state");
    }
}
