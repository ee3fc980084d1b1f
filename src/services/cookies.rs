// src/services/cookies.rs
//! Session cookie transport policy
//!
//! | Origin class | SameSite | Secure | Partitioned |
//! |---|---|---|---|
//! | local/loopback host | Lax | no | no |
//! | any other host | None | yes | yes |
//!
//! Browsers reject `SameSite=None` without `Secure`, and the deployed
//! frontend lives on a different site than this service.

use axum::http::{
    header::{AUTHORIZATION, COOKIE, HOST},
    HeaderMap,
};
use cookie::{Cookie, SameSite};

pub const SESSION_COOKIE: &str = "rc_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginClass {
    Local,
    Deployed,
}

impl OriginClass {
    /// Classify a `Host` header value (port optional)
    pub fn from_host(host: &str) -> Self {
        let host = host.trim().to_ascii_lowercase();
        let hostname = if let Some(rest) = host.strip_prefix('[') {
            // bracketed IPv6 literal, e.g. [::1]:8787
            rest.split(']').next().unwrap_or_default()
        } else if host.matches(':').count() > 1 {
            host.as_str()
        } else {
            host.split(':').next().unwrap_or_default()
        };

        match hostname {
            "localhost" | "127.0.0.1" | "::1" => OriginClass::Local,
            _ => OriginClass::Deployed,
        }
    }

    /// Classify the request from its `Host` header; a missing header counts as deployed
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .map(Self::from_host)
            .unwrap_or(OriginClass::Deployed)
    }

    fn same_site(&self) -> SameSite {
        match self {
            OriginClass::Local => SameSite::Lax,
            OriginClass::Deployed => SameSite::None,
        }
    }

    fn secure(&self) -> bool {
        matches!(self, OriginClass::Deployed)
    }
}

fn build(value: String, max_age_secs: i64, class: OriginClass) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(class.secure())
        .same_site(class.same_site())
        .partitioned(class.secure())
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// `Set-Cookie` value carrying a freshly issued session token
pub fn session_cookie(token: &str, max_age_secs: i64, class: OriginClass) -> String {
    build(token.to_string(), max_age_secs, class).encoded().to_string()
}

/// `Set-Cookie` value that makes the browser drop the session cookie
pub fn clear_cookie(class: OriginClass) -> String {
    build(String::new(), 0, class).encoded().to_string()
}

/// Session token from `Authorization: Bearer` or, failing that, the session cookie
pub fn session_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|raw| Cookie::split_parse_encoded(raw.to_string()))
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE && !c.value().is_empty())
        .map(|c| c.value().to_string())
}
