// src/services/providers/kakao.rs
//! Kakao endpoints and profile normalization

use serde::Deserialize;

use super::{first_non_blank, ExternalProfile, Provider, ProviderEndpoints, ProviderError, DEFAULT_NICKNAME};

const KAUTH: &str = "https://kauth.kakao.com";
const KAPI: &str = "https://kapi.kakao.com";

pub const SCOPES: &[&str] = &["profile_nickname", "profile_image", "account_email"];

pub fn endpoints() -> ProviderEndpoints {
    ProviderEndpoints {
        authorize_url: format!("{}/oauth/authorize", KAUTH),
        token_url: format!("{}/oauth/token", KAUTH),
        profile_url: format!("{}/v2/user/me", KAPI),
    }
}

#[derive(Debug, Deserialize)]
struct KakaoUser {
    id: i64,
    #[serde(default)]
    properties: Option<KakaoProperties>,
    #[serde(default)]
    kakao_account: Option<KakaoAccount>,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoProperties {
    nickname: Option<String>,
    profile_image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoAccount {
    email: Option<String>,
    profile: Option<KakaoProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoProfile {
    nickname: Option<String>,
    profile_image_url: Option<String>,
}

/// `/v2/user/me` body into the shared profile shape.
///
/// The account profile wins over the legacy `properties` block.
pub fn normalize_profile(body: &str) -> Result<ExternalProfile, ProviderError> {
    let user: KakaoUser = serde_json::from_str(body).map_err(|e| ProviderError::Malformed {
        provider: Provider::Kakao,
        detail: e.to_string(),
    })?;

    let props = user.properties.unwrap_or_default();
    let account = user.kakao_account.unwrap_or_default();
    let profile = account.profile.unwrap_or_default();

    let nickname = first_non_blank([profile.nickname.as_deref(), props.nickname.as_deref()])
        .unwrap_or_else(|| DEFAULT_NICKNAME.to_string());
    let photo_url = first_non_blank([
        profile.profile_image_url.as_deref(),
        props.profile_image.as_deref(),
    ]);

    Ok(ExternalProfile {
        external_id: user.id.to_string(),
        nickname,
        email: first_non_blank([account.email.as_deref()]),
        photo_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_profile_preferred() {
        let body = r#"{
            "id": 123456789,
            "properties": {"nickname": "legacy", "profile_image": "http://img/legacy.png"},
            "kakao_account": {
                "email": "runner@kakao.com",
                "profile": {"nickname": "  Minji  ", "profile_image_url": "http://img/new.png"}
            }
        }"#;
        let profile = normalize_profile(body).unwrap();
        assert_eq!(profile.external_id, "123456789");
        assert_eq!(profile.nickname, "Minji");
        assert_eq!(profile.email.as_deref(), Some("runner@kakao.com"));
        assert_eq!(profile.photo_url.as_deref(), Some("http://img/new.png"));
    }

    #[test]
    fn test_falls_back_to_properties() {
        let body = r#"{
            "id": 42,
            "properties": {"nickname": "legacy", "profile_image": "http://img/legacy.png"},
            "kakao_account": {"profile": {"nickname": "   "}}
        }"#;
        let profile = normalize_profile(body).unwrap();
        assert_eq!(profile.nickname, "legacy");
        assert_eq!(profile.email, None);
        assert_eq!(profile.photo_url.as_deref(), Some("http://img/legacy.png"));
    }

    #[test]
    fn test_default_nickname() {
        let profile = normalize_profile(r#"{"id": 7}"#).unwrap();
        assert_eq!(profile.nickname, DEFAULT_NICKNAME);
        assert_eq!(profile.photo_url, None);
    }

    #[test]
    fn test_missing_id_is_malformed() {
        let err = normalize_profile(r#"{"properties": {}}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { provider: Provider::Kakao, .. }));
        assert_eq!(err.to_string(), "Kakao response parse error");
    }
}
