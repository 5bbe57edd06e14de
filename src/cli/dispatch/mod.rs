//! Command-line argument dispatch and server initialization.
//!
//! Parses validated CLI arguments and maps them to the appropriate action.
//! Token signing secrets are validated here: each must be at least 32 bytes
//! and they must differ. A violation is a fatal configuration error at
//! startup, never deferred to request time.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{bail, Context, Result};
use secrecy::ExposeSecret;

const MIN_SECRET_BYTES: usize = 32;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the token secrets
/// are too short or identical.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    validate_secrets(&auth_opts)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        access_token_secret: auth_opts.access_token_secret,
        refresh_token_secret: auth_opts.refresh_token_secret,
        access_token_ttl_minutes: auth_opts.access_token_ttl_minutes,
        refresh_token_ttl_days: auth_opts.refresh_token_ttl_days,
        verification_token_ttl_minutes: auth_opts.verification_token_ttl_minutes,
        frontend_base_url: auth_opts.frontend_base_url,
        cookie_domain: auth_opts.cookie_domain,
        production: auth_opts.production,
    }))
}

fn validate_secrets(options: &auth::Options) -> Result<()> {
    let access = options.access_token_secret.expose_secret();
    let refresh = options.refresh_token_secret.expose_secret();

    if access.len() < MIN_SECRET_BYTES {
        bail!("access token secret must be at least {MIN_SECRET_BYTES} bytes");
    }
    if refresh.len() < MIN_SECRET_BYTES {
        bail!("refresh token secret must be at least {MIN_SECRET_BYTES} bytes");
    }
    if access == refresh {
        bail!("access and refresh token secrets must differ");
    }

    Ok(())
}
