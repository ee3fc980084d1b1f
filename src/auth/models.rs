//! Request and response shapes for the auth endpoints

use serde::{Deserialize, Serialize};

use crate::services::identity::Identity;

/// `GET /auth/{provider}?redirect=<url>`
#[derive(Debug, Deserialize)]
pub struct AuthStartQuery {
    pub redirect: Option<String>,
}

/// `GET /auth/{provider}/callback?code=&state=`
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// `POST /auth/login`
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// `POST /auth/signup`
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub nickname: Option<String>,
}

/// Signup fields once presence has been checked
#[derive(Debug)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub nickname: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: Option<String>,
    pub nickname: String,
}

impl From<&Identity> for UserSummary {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            nickname: identity.nickname.clone(),
        }
    }
}

/// Body of a successful login or signup
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub ok: bool,
    pub user: UserSummary,
}

/// Body of `GET /session`
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Identity,
}
