use crate::api::{
    self,
    email::LogEmailSender,
    handlers::auth::{
        rate_limit::InMemoryRateLimiter, state::AuthConfig, state::AuthState, tokens::TokenCodec,
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub access_token_secret: SecretString,
    pub refresh_token_secret: SecretString,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub verification_token_ttl_minutes: i64,
    pub frontend_base_url: String,
    pub cookie_domain: Option<String>,
    pub production: bool,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the token codec rejects the configured secrets or the
/// server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let refresh_ttl_seconds = args.refresh_token_ttl_days * 24 * 60 * 60;

    let codec = TokenCodec::new(
        &args.access_token_secret,
        &args.refresh_token_secret,
        args.access_token_ttl_minutes * 60,
        refresh_ttl_seconds,
    )
    .context("invalid token signing configuration")?;

    let mut config = AuthConfig::new(args.frontend_base_url)
        .with_verification_token_ttl_seconds(args.verification_token_ttl_minutes * 60)
        .with_refresh_cookie_max_age_seconds(refresh_ttl_seconds)
        .with_production(args.production);
    if let Some(domain) = args.cookie_domain {
        config = config.with_cookie_domain(domain);
    }

    let state = Arc::new(AuthState::new(
        config,
        codec,
        Arc::new(InMemoryRateLimiter::new()),
        Arc::new(LogEmailSender),
    ));

    api::new(args.port, args.dsn, state).await
}
