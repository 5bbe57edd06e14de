//! Account registration.

use axum::{extract::Extension, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::api::email::dispatch_verification;
use crate::api::error::{ApiError, ErrorBody};

use super::password::hash_password;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::{insert_user, SignupOutcome};
use super::types::{RegisterRequest, RegisterResponse};
use super::utils::{
    build_verify_url, extract_client_ip, generate_verification_token, hash_verification_token,
    normalize_email, valid_email, valid_password, valid_username, PASSWORD_MIN_LENGTH,
    USERNAME_MAX_LENGTH, USERNAME_MIN_LENGTH,
};

/// Create a new, unverified account and dispatch the verification email.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification email dispatched", body = RegisterResponse),
        (status = 400, description = "Missing or invalid fields, or taken email/username", body = ErrorBody),
        (status = 429, description = "Too many registration attempts", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::BadRequest("Invalid request body".to_string()));
    };

    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }
    if !valid_username(&request.username) {
        return Err(ApiError::BadRequest(format!(
            "Username must be {USERNAME_MIN_LENGTH}-{USERNAME_MAX_LENGTH} characters \
             (letters, digits, '_' or '-')"
        )));
    }
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    if !valid_password(&request.password) {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {PASSWORD_MIN_LENGTH} characters"
        )));
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        return Err(ApiError::TooManyRequests("Rate limited".to_string()));
    }

    let password_hash =
        hash_password(&request.password).map_err(|err| ApiError::Internal(err.into()))?;
    let token = generate_verification_token().map_err(ApiError::Internal)?;
    let token_hash = hash_verification_token(&token);

    let outcome = insert_user(
        &pool,
        name,
        &request.username,
        &email,
        &password_hash,
        &token_hash,
        auth_state.config().verification_token_ttl_seconds(),
    )
    .await?;

    let user = match outcome {
        SignupOutcome::Created(user) => user,
        SignupOutcome::Conflict => {
            return Err(ApiError::BadRequest(
                "Email or username is already taken".to_string(),
            ));
        }
    };

    let verify_url = build_verify_url(auth_state.config().frontend_base_url(), &token);
    dispatch_verification(auth_state.email_sender(), user.email.clone(), verify_url);

    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(RegisterResponse { user })))
}
