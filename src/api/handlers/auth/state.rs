//! Auth state and configuration.

use secrecy::SecretString;
use std::sync::Arc;

use super::codes::CodeStore;
use crate::api::email::Mailer;

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_CODE_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_CODE_COOLDOWN_SECONDS: u64 = 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    cors_origin: String,
    token_secret: SecretString,
    token_ttl_seconds: i64,
    code_ttl_seconds: u64,
    code_cooldown_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(cors_origin: String, token_secret: SecretString) -> Self {
        Self {
            cors_origin,
            token_secret,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            code_cooldown_seconds: DEFAULT_CODE_COOLDOWN_SECONDS,
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: u64) -> Self {
        self.code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_code_cooldown_seconds(mut self, seconds: u64) -> Self {
        self.code_cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn code_ttl_seconds(&self) -> u64 {
        self.code_ttl_seconds
    }

    #[must_use]
    pub fn code_cooldown_seconds(&self) -> u64 {
        self.code_cooldown_seconds
    }

    pub(crate) fn cors_origin(&self) -> &str {
        &self.cors_origin
    }

    pub(crate) fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    pub(crate) fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }
}

pub struct AuthState {
    config: AuthConfig,
    codes: CodeStore,
    mailer: Arc<Mailer>,
}

impl AuthState {
    pub fn new(config: AuthConfig, codes: CodeStore, mailer: Arc<Mailer>) -> Self {
        Self {
            config,
            codes,
            mailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn codes(&self) -> &CodeStore {
        &self.codes
    }

    pub(super) fn mailer(&self) -> &Mailer {
        &self.mailer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::time::Duration;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("sekret"),
        );

        assert_eq!(config.cors_origin(), "http://localhost:3000");
        assert_eq!(config.token_secret().expose_secret(), "sekret");
        assert_eq!(config.token_ttl_seconds(), super::DEFAULT_TOKEN_TTL_SECONDS);
        assert_eq!(config.code_ttl_seconds(), super::DEFAULT_CODE_TTL_SECONDS);
        assert_eq!(
            config.code_cooldown_seconds(),
            super::DEFAULT_CODE_COOLDOWN_SECONDS
        );

        let config = config
            .with_token_ttl_seconds(3_600)
            .with_code_ttl_seconds(120)
            .with_code_cooldown_seconds(30);

        assert_eq!(config.token_ttl_seconds(), 3_600);
        assert_eq!(config.code_ttl_seconds(), 120);
        assert_eq!(config.code_cooldown_seconds(), 30);
    }

    #[tokio::test]
    async fn auth_state_exposes_parts() {
        let config = AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("sekret"),
        );
        let codes = CodeStore::new(Duration::from_secs(300), Duration::from_secs(60));
        let mailer = Arc::new(Mailer::capture());
        let state = AuthState::new(config, codes, mailer);

        assert_eq!(state.config().code_ttl_seconds(), 300);
        assert!(state.codes().try_issue("a@example.com").await.is_some());
        assert!(state.mailer().sent().is_empty());
    }
}
