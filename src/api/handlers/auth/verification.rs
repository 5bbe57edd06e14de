//! Email verification link handling.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::error::{ApiError, ErrorBody};

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::{consume_verification_token, VerifyOutcome};
use super::types::{MessageResponse, VerifyEmailQuery};
use super::utils::{extract_client_ip, hash_verification_token};

/// Consume a verification token from an emailed link.
///
/// Repeat clicks on the same link succeed; a verified account stays verified.
#[utoipa::path(
    get,
    path = "/auth/verify-email",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired verification token", body = ErrorBody),
        (status = 429, description = "Too many verification attempts", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    query: Query<VerifyEmailQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.token.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Verification token is required".to_string(),
        ));
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::VerifyEmail)
        == RateLimitDecision::Limited
    {
        return Err(ApiError::TooManyRequests("Rate limited".to_string()));
    }

    let token_hash = hash_verification_token(query.token.trim());
    match consume_verification_token(&pool, &token_hash).await? {
        VerifyOutcome::Verified | VerifyOutcome::AlreadyVerified => Ok((
            StatusCode::OK,
            Json(MessageResponse {
                message: "Email verified".to_string(),
            }),
        )),
        VerifyOutcome::Invalid => Err(ApiError::BadRequest(
            "Invalid or expired verification token".to_string(),
        )),
    }
}
