//! Authentication handlers

use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use super::extractors::MaybeSession;
use super::flow::{resolve_destination, Flow, FlowStage};
use super::models::{
    AuthResponse, AuthStartQuery, CallbackQuery, LoginRequest, SessionResponse, SignupInput,
    SignupRequest, UserSummary,
};
use crate::common::{safe_email_log, AppState, AuthError, Validator};
use crate::services::cookies::{clear_cookie, session_cookie, OriginClass};
use crate::services::identity::Identity;
use crate::services::password::{hash_password, validate_strength, verify_password};
use crate::services::providers::{Provider, ProviderClient};

/// GET /
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "name": env!("CARGO_PKG_NAME") }))
}

fn parse_provider(raw: &str) -> Result<Provider, AuthError> {
    raw.parse::<Provider>().map_err(AuthError::BadRequest)
}

fn provider_client(state: &AppState, provider: Provider) -> Result<&ProviderClient, AuthError> {
    state.providers.get(&provider).ok_or_else(|| {
        AuthError::ServerMisconfiguration(format!("{} login is not configured", provider.display_name()))
    })
}

fn header_value(value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value)
        .map_err(|_| AuthError::ServerMisconfiguration("unencodable header value".to_string()))
}

/// 302 to `location`, optionally setting a cookie
fn found(location: &str, cookie: Option<String>) -> Result<Response, AuthError> {
    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, header_value(location)?);
    if let Some(cookie) = cookie {
        headers.insert(SET_COOKIE, header_value(&cookie)?);
    }
    Ok((StatusCode::FOUND, headers).into_response())
}

fn with_cookie(cookie: String, body: impl IntoResponse) -> Result<Response, AuthError> {
    Ok(([(SET_COOKIE, header_value(&cookie)?)], body).into_response())
}

/// Sign a session for `identity` and render the matching `Set-Cookie` value
fn issue_session_cookie(
    state: &AppState,
    identity: &Identity,
    headers: &HeaderMap,
) -> Result<String, AuthError> {
    let token = state
        .signer
        .issue_session(identity)
        .map_err(|e| AuthError::ServerMisconfiguration(e.to_string()))?;
    Ok(session_cookie(
        &token,
        state.signer.session_ttl_secs(),
        OriginClass::from_headers(headers),
    ))
}

/// Run CPU-heavy password work off the async workers
async fn blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::ServerMisconfiguration(format!("password worker failed: {}", e)))
}

/// Digest compared against when the email is unknown, so a miss costs the same as a hit
fn decoy_digest() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| hash_password("decoy-password-0"))
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// GET /auth/{provider}?redirect=<url>
///
/// Signs the redirect into a state token and sends the browser to the
/// provider's consent page.
pub async fn oauth_start(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<AuthStartQuery>,
) -> Result<Response, AuthError> {
    let provider = parse_provider(&provider)?;
    let mut flow = Flow::start(provider.as_str());

    let result = async {
        let client = provider_client(&state, provider)?;
        let redirect = query.redirect.unwrap_or_else(|| "/".to_string());
        let state_token = state
            .signer
            .issue_state(&redirect)
            .map_err(|e| AuthError::ServerMisconfiguration(e.to_string()))?;

        let url = client.authorization_url(&state_token);
        info!(provider = %provider, callback = %client.callback_url(), "Redirecting to provider consent page");
        found(&url, None)
    }
    .await;

    match result {
        Ok(response) => {
            flow.advance(FlowStage::AwaitingCallback);
            Ok(response)
        }
        Err(e) => Err(flow.fail(e)),
    }
}

/// GET /auth/{provider}/callback?code=&state=
pub async fn oauth_callback(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let provider = parse_provider(&provider)?;
    let mut flow = Flow::resume_callback(provider.as_str());

    complete_callback(&state, provider, query, &headers, &mut flow)
        .await
        .map_err(|e| flow.fail(e))
}

async fn complete_callback(
    state: &AppState,
    provider: Provider,
    query: CallbackQuery,
    headers: &HeaderMap,
    flow: &mut Flow,
) -> Result<Response, AuthError> {
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        return Err(AuthError::BadRequest(
            format!("{} authorization failed: {} {}", provider.display_name(), error, description)
                .trim_end()
                .to_string(),
        ));
    }

    let (Some(code), Some(state_token)) = (required(query.code), required(query.state)) else {
        return Err(AuthError::BadRequest("missing code/state".to_string()));
    };

    let claims = state.signer.verify_state(&state_token).map_err(|e| {
        debug!(error = %e, "State token rejected");
        AuthError::InvalidState
    })?;
    flow.advance(FlowStage::StateVerified);

    let client = provider_client(state, provider)?;
    let access_token = client.exchange_code(&code, &state_token).await?;
    flow.advance(FlowStage::TokenExchanged);

    let profile = client.fetch_profile(&access_token).await?;
    flow.advance(FlowStage::ProfileFetched);

    let identity = state.resolver.resolve_oauth(provider, &profile).await?;
    flow.advance(FlowStage::IdentityResolved);

    let cookie = issue_session_cookie(state, &identity, headers)?;
    flow.advance(FlowStage::SessionIssued);

    let destination = resolve_destination(Some(&claims.redirect), &state.config.app_redirect_default);
    info!(user_id = %identity.id, provider = %provider, "OAuth login completed");
    found(&destination, Some(cookie))
}

/// POST /auth/login
///
/// # Request Body
/// ```json
/// { "email": "a@b.com", "password": "abc12345" }
/// ```
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let mut flow = Flow::start("local");
    let result = async {
        let Json(payload) = payload.map_err(|e| AuthError::BadRequest(format!("invalid JSON: {}", e.body_text())))?;
        let (Some(email), Some(password)) = (required(payload.email), required(payload.password)) else {
            return Err(AuthError::BadRequest("email and password are required".to_string()));
        };

        let account = state.resolver.resolve_local(&email).await?;
        let digest = account.as_ref().and_then(|a| a.password_digest.clone());
        let matches = blocking(move || {
            verify_password(&password, digest.as_deref().unwrap_or_else(|| decoy_digest()))
        })
        .await?;

        let identity = match account {
            Some(identity) if matches => identity,
            _ => {
                warn!(email = %safe_email_log(&email), "Password login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };
        flow.advance(FlowStage::CredentialsVerified);

        state.resolver.touch(&identity.id).await?;
        flow.advance(FlowStage::IdentityResolved);

        let cookie = issue_session_cookie(&state, &identity, &headers)?;
        flow.advance(FlowStage::SessionIssued);

        info!(user_id = %identity.id, "Password login succeeded");
        with_cookie(
            cookie,
            Json(AuthResponse {
                ok: true,
                user: UserSummary::from(&identity),
            }),
        )
    }
    .await;

    result.map_err(|e| flow.fail(e))
}

/// POST /auth/signup
///
/// # Request Body
/// ```json
/// { "email": "a@b.com", "password": "abc12345", "nickname": "Ann" }
/// ```
pub async fn signup(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let mut flow = Flow::start("local");
    let result = async {
        let Json(payload) = payload.map_err(|e| AuthError::BadRequest(format!("invalid JSON: {}", e.body_text())))?;
        let (Some(email), Some(password), Some(nickname)) = (
            required(payload.email),
            required(payload.password),
            required(payload.nickname),
        ) else {
            return Err(AuthError::BadRequest("email, password and nickname are required".to_string()));
        };

        let input = SignupInput {
            email: email.trim().to_string(),
            password,
            nickname: nickname.trim().to_string(),
        };
        input.validate(&input).into_result()?;

        let strength = validate_strength(&input.password);
        if !strength.valid {
            return Err(AuthError::WeakPassword(strength.reason));
        }

        let password = input.password.clone();
        let digest = blocking(move || hash_password(&password)).await?;
        let identity = state
            .resolver
            .create_local(&input.email, &input.nickname, &digest)
            .await?;
        flow.advance(FlowStage::IdentityResolved);

        let cookie = issue_session_cookie(&state, &identity, &headers)?;
        flow.advance(FlowStage::SessionIssued);

        with_cookie(
            cookie,
            Json(AuthResponse {
                ok: true,
                user: UserSummary::from(&identity),
            }),
        )
    }
    .await;

    result.map_err(|e| flow.fail(e))
}

/// POST /auth/logout
pub async fn logout(headers: HeaderMap) -> Result<Response, AuthError> {
    debug!("Clearing session cookie");
    with_cookie(
        clear_cookie(OriginClass::from_headers(&headers)),
        Json(json!({ "ok": true })),
    )
}

/// GET /session (also /me and /api/me)
///
/// 204 when no session is presented or its user no longer exists.
pub async fn session(
    Extension(state): Extension<Arc<AppState>>,
    MaybeSession(session): MaybeSession,
) -> Result<Response, AuthError> {
    let Some(session) = session else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    match state.resolver.find_by_id(&session.payload.sub).await? {
        Some(user) => Ok(Json(SessionResponse { user }).into_response()),
        None => {
            debug!(user_id = %session.payload.sub, "Session refers to a missing identity");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}
