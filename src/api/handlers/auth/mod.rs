//! Authentication and session endpoints.
//!
//! Registration creates an unverified account and emails a verification link.
//! Login trades a password for a short-lived access token plus a refresh
//! token stored in an `HttpOnly` cookie. Refresh rotates the stored token on
//! every use and treats a stale token as a reuse signal.

pub mod bearer;
pub mod login;
pub mod password;
pub mod rate_limit;
pub mod session;
pub mod signup;
pub mod state;
mod storage;
pub mod tokens;
pub mod types;
mod utils;
pub mod verification;

#[cfg(test)]
mod tests;
