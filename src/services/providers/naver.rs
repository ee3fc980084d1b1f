// src/services/providers/naver.rs
//! Naver endpoints and profile normalization

use serde::Deserialize;

use super::{first_non_blank, ExternalProfile, Provider, ProviderEndpoints, ProviderError, DEFAULT_NICKNAME};

pub const SCOPES: &[&str] = &[];

/// `resultcode` value Naver uses for a successful profile response
const RESULT_OK: &str = "00";

pub fn endpoints() -> ProviderEndpoints {
    ProviderEndpoints {
        authorize_url: "https://nid.naver.com/oauth2.0/authorize".to_string(),
        token_url: "https://nid.naver.com/oauth2.0/token".to_string(),
        profile_url: "https://openapi.naver.com/v1/nid/me".to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct NaverEnvelope {
    resultcode: Option<String>,
    message: Option<String>,
    response: Option<NaverUser>,
}

#[derive(Debug, Deserialize)]
struct NaverUser {
    id: String,
    nickname: Option<String>,
    name: Option<String>,
    email: Option<String>,
    profile_image: Option<String>,
}

/// `/v1/nid/me` body into the shared profile shape
pub fn normalize_profile(body: &str) -> Result<ExternalProfile, ProviderError> {
    let envelope: NaverEnvelope = serde_json::from_str(body).map_err(|e| ProviderError::Malformed {
        provider: Provider::Naver,
        detail: e.to_string(),
    })?;

    if envelope.resultcode.as_deref() != Some(RESULT_OK) {
        return Err(ProviderError::Upstream {
            provider: Provider::Naver,
            status: None,
            body: format!(
                "profile fetch failed: resultcode={} message={}",
                envelope.resultcode.as_deref().unwrap_or("-"),
                envelope.message.as_deref().unwrap_or("-")
            ),
        });
    }

    let user = envelope.response.ok_or_else(|| ProviderError::Malformed {
        provider: Provider::Naver,
        detail: "missing response block".to_string(),
    })?;

    Ok(ExternalProfile {
        external_id: user.id,
        nickname: first_non_blank([user.nickname.as_deref(), user.name.as_deref()])
            .unwrap_or_else(|| DEFAULT_NICKNAME.to_string()),
        email: first_non_blank([user.email.as_deref()]),
        photo_url: first_non_blank([user.profile_image.as_deref()]),
    })
}
