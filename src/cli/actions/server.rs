use crate::api::{
    self,
    email::Mailer,
    handlers::auth::{AuthConfig, AuthState, CodeStore},
};
use anyhow::Result;
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub cors_origin: String,
    pub token_secret: String,
    pub token_ttl_seconds: i64,
    pub code_ttl_seconds: u64,
    pub code_cooldown_seconds: u64,
    pub mail_relay_url: Option<String>,
    pub mail_from_address: String,
    pub mail_from_name: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = AuthConfig::new(args.cors_origin, SecretString::from(args.token_secret))
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_code_ttl_seconds(args.code_ttl_seconds)
        .with_code_cooldown_seconds(args.code_cooldown_seconds);

    let codes = CodeStore::new(
        Duration::from_secs(config.code_ttl_seconds()),
        Duration::from_secs(config.code_cooldown_seconds()),
    );

    let mailer = match args.mail_relay_url {
        Some(endpoint) => Mailer::relay(endpoint, args.mail_from_address, args.mail_from_name)?,
        None => Mailer::log(args.mail_from_address, args.mail_from_name),
    };

    let state = Arc::new(AuthState::new(config, codes, Arc::new(mailer)));

    api::new(args.port, args.dsn, state).await
}
