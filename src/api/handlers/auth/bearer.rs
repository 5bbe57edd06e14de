//! Bearer access-token checks for protected endpoints.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::api::error::ApiError;

use super::state::AuthState;
use super::tokens::{Claims, TokenError};

/// Validate the `Authorization: Bearer` access token and return its claims.
///
/// Stateless: the database is not consulted, so a deleted user's access token
/// stays valid until it expires.
pub fn require_auth(headers: &HeaderMap, auth_state: &AuthState) -> Result<Claims, ApiError> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(ApiError::Unauthorized("Missing access token".to_string()));
    };
    auth_state.codec().verify_access(&token).map_err(|err| match err {
        TokenError::Expired => ApiError::Unauthorized("Access token expired".to_string()),
        _ => ApiError::Unauthorized("Invalid access token".to_string()),
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
