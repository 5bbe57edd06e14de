//! Password login.
//!
//! Enumeration resistance: the password is verified before the account's
//! verification state is considered, and an unknown email yields the same
//! 400 response as a wrong password. Only a correct password against an
//! unverified account reveals the 403 NotVerified state.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::api::error::{ApiError, ErrorBody};

use super::password::verify_password;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::refresh_cookie;
use super::state::AuthState;
use super::storage::{lookup_user_by_email, set_refresh_token};
use super::tokens::UserClaims;
use super::types::{LoginRequest, LoginResponse};
use super::utils::{extract_client_ip, normalize_email};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Authenticate with email and password, starting a fresh session.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated; access token in body, refresh token in cookie", body = LoginResponse),
        (status = 400, description = "Unknown email or wrong password", body = ErrorBody),
        (status = 403, description = "Correct password but email not verified", body = ErrorBody),
        (status = 429, description = "Too many login attempts", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::BadRequest("Invalid request body".to_string()));
    };

    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let client_ip = extract_client_ip(&headers);
    let limited = auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
        || auth_state.rate_limiter().check_email(&email, RateLimitAction::Login)
            == RateLimitDecision::Limited;
    if limited {
        return Err(ApiError::TooManyRequests("Rate limited".to_string()));
    }

    let Some(user) = lookup_user_by_email(&pool, &email).await? else {
        return Err(ApiError::BadRequest(INVALID_CREDENTIALS.to_string()));
    };

    // Password first; verification state is only disclosed once the caller
    // has proven they hold the credential.
    if !verify_password(&request.password, &user.password_hash)
        .map_err(|err| ApiError::Internal(err.into()))?
    {
        return Err(ApiError::BadRequest(INVALID_CREDENTIALS.to_string()));
    }
    if !user.is_verified {
        return Err(ApiError::Forbidden(
            "Email is not verified".to_string(),
        ));
    }

    let claims = UserClaims {
        id: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
        role: user.role.clone(),
    };
    let access_token = auth_state
        .codec()
        .sign_access(&claims)
        .map_err(|err| ApiError::Internal(err.into()))?;
    let refresh_token = auth_state
        .codec()
        .sign_refresh(&claims)
        .map_err(|err| ApiError::Internal(err.into()))?;

    // Overwrites any previous session; one live refresh token per user.
    set_refresh_token(&pool, user.id, &refresh_token).await?;

    let mut response_headers = HeaderMap::new();
    let cookie = refresh_cookie(auth_state.config(), &refresh_token)
        .map_err(|err| ApiError::Internal(err.into()))?;
    response_headers.insert(SET_COOKIE, cookie);

    info!(user_id = %user.id, "user logged in");
    Ok((
        StatusCode::OK,
        response_headers,
        Json(LoginResponse {
            user: user.public(),
            access_token,
        }),
    ))
}
