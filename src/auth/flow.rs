//! Per-request login flow tracking
//!
//! OAuth: `Start -> AwaitingCallback -> StateVerified -> TokenExchanged ->
//! ProfileFetched -> IdentityResolved -> SessionIssued`.
//! Local: `Start -> CredentialsVerified -> IdentityResolved -> SessionIssued`.
//! Any stage may terminate with an [`AuthError`]; nothing is retried.

use axum::http::HeaderValue;
use tracing::{debug, info, warn};

use crate::common::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Start,
    AwaitingCallback,
    StateVerified,
    TokenExchanged,
    ProfileFetched,
    CredentialsVerified,
    IdentityResolved,
    SessionIssued,
}

impl FlowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStage::Start => "start",
            FlowStage::AwaitingCallback => "awaiting_callback",
            FlowStage::StateVerified => "state_verified",
            FlowStage::TokenExchanged => "token_exchanged",
            FlowStage::ProfileFetched => "profile_fetched",
            FlowStage::CredentialsVerified => "credentials_verified",
            FlowStage::IdentityResolved => "identity_resolved",
            FlowStage::SessionIssued => "session_issued",
        }
    }

    fn can_advance_to(&self, next: FlowStage) -> bool {
        use FlowStage::*;
        matches!(
            (self, next),
            (Start, AwaitingCallback)
                | (AwaitingCallback, StateVerified)
                | (StateVerified, TokenExchanged)
                | (TokenExchanged, ProfileFetched)
                | (ProfileFetched, IdentityResolved)
                | (Start, CredentialsVerified)
                | (Start, IdentityResolved)
                | (CredentialsVerified, IdentityResolved)
                | (IdentityResolved, SessionIssued)
        )
    }
}

/// One login attempt, labelled by provider name or `local`
#[derive(Debug)]
pub struct Flow {
    label: &'static str,
    stage: FlowStage,
}

impl Flow {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            stage: FlowStage::Start,
        }
    }

    /// Pick up an OAuth flow when the provider redirects back
    pub fn resume_callback(label: &'static str) -> Self {
        Self {
            label,
            stage: FlowStage::AwaitingCallback,
        }
    }

    #[cfg(test)]
    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    pub fn advance(&mut self, next: FlowStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal flow transition {:?} -> {:?}",
            self.stage,
            next
        );
        debug!(flow = self.label, from = self.stage.as_str(), to = next.as_str(), "Auth flow advanced");
        self.stage = next;
        if next == FlowStage::SessionIssued {
            info!(flow = self.label, "Session issued");
        }
    }

    /// Log the terminal failure and hand the error back
    pub fn fail(&self, err: AuthError) -> AuthError {
        warn!(
            flow = self.label,
            stage = self.stage.as_str(),
            kind = err.kind(),
            error = %err,
            "Auth flow failed"
        );
        err
    }
}

/// Where to send the browser after an OAuth login.
///
/// Only absolute http(s) URLs that fit in a `Location` header are honoured;
/// anything else falls back to the configured default.
pub fn resolve_destination(redirect: Option<&str>, fallback: &str) -> String {
    redirect
        .map(str::trim)
        .filter(|r| is_absolute_http(r))
        .filter(|r| HeaderValue::from_str(r).is_ok())
        .unwrap_or(fallback)
        .to_string()
}

fn is_absolute_http(url: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        url.get(..scheme.len())
            .map(|prefix| prefix.eq_ignore_ascii_case(scheme) && url.len() > scheme.len())
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: &str = "https://app.example.com/app";

    #[test]
    fn test_absolute_redirect_kept() {
        assert_eq!(
            resolve_destination(Some("https://app.example.com/home"), FALLBACK),
            "https://app.example.com/home"
        );
        assert_eq!(
            resolve_destination(Some("http://localhost:5173/app"), FALLBACK),
            "http://localhost:5173/app"
        );
    }

    #[test]
    fn test_relative_or_odd_redirect_falls_back() {
        for redirect in ["/", "/dashboard", "javascript:alert(1)", "//evil.example", "https://", "", "https://a.com/\nx"] {
            assert_eq!(resolve_destination(Some(redirect), FALLBACK), FALLBACK, "{:?}", redirect);
        }
        assert_eq!(resolve_destination(None, FALLBACK), FALLBACK);
    }

    #[test]
    fn test_oauth_transitions() {
        let mut flow = Flow::resume_callback("kakao");
        for stage in [
            FlowStage::StateVerified,
            FlowStage::TokenExchanged,
            FlowStage::ProfileFetched,
            FlowStage::IdentityResolved,
            FlowStage::SessionIssued,
        ] {
            flow.advance(stage);
        }
        assert_eq!(flow.stage(), FlowStage::SessionIssued);
    }

    #[test]
    fn test_transition_table() {
        assert!(FlowStage::Start.can_advance_to(FlowStage::CredentialsVerified));
        assert!(!FlowStage::Start.can_advance_to(FlowStage::SessionIssued));
        assert!(!FlowStage::AwaitingCallback.can_advance_to(FlowStage::TokenExchanged));
    }

    #[test]
    fn test_fail_returns_error() {
        let flow = Flow::start("local");
        let err = flow.fail(AuthError::InvalidCredentials);
        assert_eq!(err.kind(), "InvalidCredentials");
    }
}
