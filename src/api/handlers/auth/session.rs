//! Refresh and logout endpoints, plus refresh-cookie plumbing.
//!
//! The refresh flow rotates the single stored refresh token on every use. A
//! presented token that no longer matches the stored value is treated as a
//! reuse/compromise signal: the stored token is cleared, which also logs out
//! the legitimate session (fail-closed).

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};

use crate::api::error::{ApiError, ErrorBody};

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::{AuthConfig, AuthState};
use super::storage::{
    clear_refresh_token, clear_refresh_token_by_value, lookup_user_by_id, rotate_refresh_token,
};
use super::tokens::{TokenError, UserClaims};
use super::types::{MessageResponse, RefreshResponse};
use super::utils::extract_client_ip;

pub(super) const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Exchange a valid refresh cookie for a new access/refresh token pair.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair issued", body = RefreshResponse),
        (status = 401, description = "Missing, expired, or malformed refresh token", body = ErrorBody),
        (status = 403, description = "Refresh token reuse detected; session cleared", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(presented) = extract_refresh_cookie(&headers) else {
        return Err(ApiError::Unauthorized("Missing refresh token".to_string()));
    };

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Refresh)
        == RateLimitDecision::Limited
    {
        return Err(ApiError::TooManyRequests("Rate limited".to_string()));
    }

    let claims = auth_state
        .codec()
        .verify_refresh(&presented)
        .map_err(|err| match err {
            TokenError::Expired => ApiError::Unauthorized("Refresh token expired".to_string()),
            _ => ApiError::Unauthorized("Invalid refresh token".to_string()),
        })?;

    let Some(user) = lookup_user_by_id(&pool, claims.sub).await? else {
        return Err(ApiError::Forbidden("Session is no longer valid".to_string()));
    };

    let user_claims = UserClaims {
        id: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
        role: user.role.clone(),
    };
    let access_token = auth_state
        .codec()
        .sign_access(&user_claims)
        .map_err(|err| ApiError::Internal(err.into()))?;
    let new_refresh = auth_state
        .codec()
        .sign_refresh(&user_claims)
        .map_err(|err| ApiError::Internal(err.into()))?;

    // Compare-and-rotate: only succeeds if the stored token still matches the
    // presented one. A mismatch means this token was already rotated or
    // cleared; treat it as reuse and kill the session outright.
    if !rotate_refresh_token(&pool, user.id, &presented, &new_refresh).await? {
        info!(user_id = %user.id, "refresh token reuse detected, clearing session");
        clear_refresh_token(&pool, user.id).await?;
        return Err(ApiError::Forbidden(
            "Refresh token reuse detected".to_string(),
        ));
    }

    let mut response_headers = HeaderMap::new();
    let cookie = refresh_cookie(auth_state.config(), &new_refresh)
        .map_err(|err| ApiError::Internal(err.into()))?;
    response_headers.insert(SET_COOKIE, cookie);

    Ok((
        StatusCode::OK,
        response_headers,
        Json(RefreshResponse { access_token }),
    ))
}

/// Clear the session. Idempotent: never reports failure to the caller.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(token) = extract_refresh_cookie(&headers) {
        // A stale or unknown token is a no-op; a database failure is logged
        // but still reported as success per the idempotent-logout contract.
        if let Err(err) = clear_refresh_token_by_value(&pool, &token).await {
            error!("Failed to clear refresh token on logout: {err}");
        }
    }

    // Always clear the cookie, even without a matching session.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_refresh_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (
        StatusCode::OK,
        response_headers,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

/// Build the scoped, non-script-readable refresh token cookie.
///
/// Production uses `SameSite=None; Secure` for cross-site frontends; anything
/// else stays on `Lax` so local HTTP development works.
pub(super) fn refresh_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = config.refresh_cookie_max_age_seconds();
    build_cookie(config, token, max_age)
}

pub(super) fn clear_refresh_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(config, "", 0)
}

fn build_cookie(
    config: &AuthConfig,
    token: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{REFRESH_COOKIE_NAME}={token}; Path=/; HttpOnly; Max-Age={max_age}");
    if config.production() {
        cookie.push_str("; SameSite=None; Secure");
    } else {
        cookie.push_str("; SameSite=Lax");
    }
    if let Some(domain) = config.cookie_domain() {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn extract_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        // A pair without '=' (nameless cookie) must not short-circuit the scan.
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        let val = val.trim();
        if key.trim() == REFRESH_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::state::test_support::auth_state;
    use anyhow::Result;
    use axum::response::IntoResponse;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn refresh_missing_cookie_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = refresh(HeaderMap::new(), Extension(pool), Extension(auth_state())).await;
        let response = match result {
            Ok(ok) => ok.into_response(),
            Err(err) => err.into_response(),
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_garbage_cookie_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("refreshToken=not-a-real-jwt"),
        );
        let result = refresh(headers, Extension(pool), Extension(auth_state())).await;
        let response = match result {
            Ok(ok) => ok.into_response(),
            Err(err) => err.into_response(),
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_without_cookie_succeeds_and_clears_cookie() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = logout(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(cookie.starts_with("refreshToken=;"));
        assert!(cookie.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn cookie_attributes_dev() {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        let cookie = refresh_cookie(&config, "token").expect("cookie");
        let cookie = cookie.to_str().expect("ascii");
        assert!(cookie.starts_with("refreshToken=token;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
        assert!(!cookie.contains("Domain="));
    }

    #[test]
    fn cookie_attributes_production() {
        let config = AuthConfig::new("https://habita.dev".to_string())
            .with_production(true)
            .with_cookie_domain("habita.dev".to_string());
        let cookie = refresh_cookie(&config, "token").expect("cookie");
        let cookie = cookie.to_str().expect("ascii");
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Domain=habita.dev"));
    }

    #[test]
    fn extract_refresh_cookie_finds_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; refreshToken=abc123; other=1"),
        );
        assert_eq!(extract_refresh_cookie(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_refresh_cookie_skips_nameless_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("flag; refreshToken=abc123"),
        );
        assert_eq!(extract_refresh_cookie(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_refresh_cookie_ignores_empty_and_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("refreshToken="));
        assert_eq!(extract_refresh_cookie(&headers), None);
        assert_eq!(extract_refresh_cookie(&HeaderMap::new()), None);
    }
}
