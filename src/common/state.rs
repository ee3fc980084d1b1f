// Application state shared by all handlers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::common::config::AuthConfig;
use crate::services::identity::{IdentityResolver, IdentityStore};
use crate::services::providers::{Provider, ProviderClient};
use crate::services::tokens::{Clock, TokenSigner};

/// Immutable after start-up; handlers receive it as `Extension<Arc<AppState>>`
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthConfig>,
    pub signer: TokenSigner,
    pub resolver: IdentityResolver,
    pub providers: HashMap<Provider, ProviderClient>,
}

impl AppState {
    pub fn new(config: AuthConfig, store: Arc<dyn IdentityStore>, clock: Arc<dyn Clock>) -> Self {
        let signer = TokenSigner::from_config(&config, clock);
        let timeout = Duration::from_secs(config.provider_timeout_secs);

        let providers = [Provider::Kakao, Provider::Naver]
            .into_iter()
            .filter_map(|p| {
                config
                    .provider(p)
                    .map(|creds| (p, ProviderClient::new(p, creds.clone(), timeout)))
            })
            .collect();

        Self {
            config: Arc::new(config),
            signer,
            resolver: IdentityResolver::new(store),
            providers,
        }
    }
}
