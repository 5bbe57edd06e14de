//! # Habita
//!
//! `habita` is a habit-tracking web API backend. Its core is the
//! authentication and session service: credential verification, JWT
//! access/refresh token issuance, refresh-token rotation with reuse
//! detection, and time-boxed email verification.
//!
//! ## Sessions
//!
//! Sessions are stateless claims validated per request. The only server-held
//! session state is the single `refresh_token` column on the user record:
//! exactly one refresh token is valid per account at any time. Each refresh
//! rotates the token; presenting a stale token is treated as a compromise
//! signal and clears the session (fail-closed).
//!
//! ## Email verification
//!
//! Registration stores only a SHA-256 hash of the verification token. The raw
//! token travels once, inside the verification link, and is never persisted.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
