//! Auth configuration and shared request state.

use std::sync::Arc;

use crate::api::email::EmailSender;

use super::rate_limit::RateLimiter;
use super::tokens::TokenCodec;

const DEFAULT_VERIFICATION_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_REFRESH_COOKIE_MAX_AGE_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    verification_token_ttl_seconds: i64,
    refresh_cookie_max_age_seconds: i64,
    cookie_domain: Option<String>,
    production: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            verification_token_ttl_seconds: DEFAULT_VERIFICATION_TTL_SECONDS,
            refresh_cookie_max_age_seconds: DEFAULT_REFRESH_COOKIE_MAX_AGE_SECONDS,
            cookie_domain: None,
            production: false,
        }
    }

    #[must_use]
    pub fn with_verification_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.verification_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_cookie_max_age_seconds(mut self, seconds: i64) -> Self {
        self.refresh_cookie_max_age_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_domain(mut self, domain: String) -> Self {
        self.cookie_domain = Some(domain);
        self
    }

    #[must_use]
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn verification_token_ttl_seconds(&self) -> i64 {
        self.verification_token_ttl_seconds
    }

    pub(super) fn refresh_cookie_max_age_seconds(&self) -> i64 {
        self.refresh_cookie_max_age_seconds
    }

    pub(super) fn cookie_domain(&self) -> Option<&str> {
        self.cookie_domain.as_deref()
    }

    pub(super) fn production(&self) -> bool {
        self.production
    }
}

pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    rate_limiter: Arc<dyn RateLimiter>,
    email_sender: Arc<dyn EmailSender>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        codec: TokenCodec,
        rate_limiter: Arc<dyn RateLimiter>,
        email_sender: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            config,
            codec,
            rate_limiter,
            email_sender,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    pub(super) fn email_sender(&self) -> Arc<dyn EmailSender> {
        self.email_sender.clone()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://habita.dev".to_string());

        assert_eq!(config.frontend_base_url(), "https://habita.dev");
        assert_eq!(
            config.verification_token_ttl_seconds(),
            DEFAULT_VERIFICATION_TTL_SECONDS
        );
        assert_eq!(
            config.refresh_cookie_max_age_seconds(),
            DEFAULT_REFRESH_COOKIE_MAX_AGE_SECONDS
        );
        assert_eq!(config.cookie_domain(), None);
        assert!(!config.production());

        let config = config
            .with_verification_token_ttl_seconds(120)
            .with_refresh_cookie_max_age_seconds(3600)
            .with_cookie_domain("habita.dev".to_string())
            .with_production(true);

        assert_eq!(config.verification_token_ttl_seconds(), 120);
        assert_eq!(config.refresh_cookie_max_age_seconds(), 3600);
        assert_eq!(config.cookie_domain(), Some("habita.dev"));
        assert!(config.production());
    }

    #[test]
    fn auth_state_exposes_components() {
        let state = test_support::auth_state();
        assert_eq!(state.config().frontend_base_url(), "https://habita.dev");
        assert_eq!(state.codec().refresh_ttl_seconds(), 7 * 24 * 60 * 60);
    }
}
