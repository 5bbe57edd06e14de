//! Database-backed auth flow tests.
//!
//! These run against a disposable Postgres pointed at by `HABITA_TEST_DSN`
//! and are skipped when the variable is unset. Each test creates its own
//! users with unique emails, so the suite can run concurrently against one
//! database.

use super::login::login;
use super::password::hash_password;
use super::session::{logout, refresh};
use super::state::test_support::auth_state;
use super::state::AuthState;
use super::storage::{
    clear_refresh_token_by_value, consume_verification_token, insert_user, rotate_refresh_token,
    set_refresh_token, SignupOutcome, VerifyOutcome,
};
use super::types::{LoginRequest, PublicUser};
use super::utils::{generate_verification_token, hash_verification_token};
use anyhow::{bail, Context, Result};
use axum::{
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Extension, Json,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use uuid::Uuid;

const SCHEMA_SQL: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations/0001_init.sql"));

const SCHEMA_LOCK_KEY: i64 = 727_001;
const TEST_PASSWORD: &str = "secret12";

async fn test_pool() -> Result<Option<PgPool>> {
    let Ok(dsn) = std::env::var("HABITA_TEST_DSN") else {
        eprintln!("Skipping database test: HABITA_TEST_DSN is not set");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&dsn)
        .await
        .context("failed to connect test pool")?;
    apply_schema(&pool).await?;
    Ok(Some(pool))
}

async fn apply_schema(pool: &PgPool) -> Result<()> {
    // Advisory lock serializes concurrent CREATE TABLE IF NOT EXISTS.
    let mut conn = pool.acquire().await?;
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *conn)
        .await?;
    let result = sqlx::raw_sql(SCHEMA_SQL).execute(&mut *conn).await;
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *conn)
        .await?;
    result.context("failed to apply schema")?;
    Ok(())
}

fn unique_identity() -> (String, String) {
    let tag = Uuid::new_v4().simple().to_string();
    (format!("u{}", &tag[..12]), format!("{tag}@example.com"))
}

async fn create_user(pool: &PgPool, ttl_seconds: i64) -> Result<(PublicUser, String)> {
    let (username, email) = unique_identity();
    let raw_token = generate_verification_token()?;
    let token_hash = hash_verification_token(&raw_token);
    let password_hash = hash_password(TEST_PASSWORD)?;

    match insert_user(
        pool,
        "Ann",
        &username,
        &email,
        &password_hash,
        &token_hash,
        ttl_seconds,
    )
    .await?
    {
        SignupOutcome::Created(user) => Ok((user, raw_token)),
        SignupOutcome::Conflict => bail!("unexpected conflict inserting test user"),
    }
}

async fn create_verified_user(pool: &PgPool) -> Result<PublicUser> {
    let (user, raw_token) = create_user(pool, 3600).await?;
    let outcome = consume_verification_token(pool, &hash_verification_token(&raw_token)).await?;
    if outcome != VerifyOutcome::Verified {
        bail!("expected verification to succeed, got {outcome:?}");
    }
    Ok(user)
}

async fn login_response(pool: &PgPool, state: &Arc<AuthState>, email: &str) -> Response {
    let result = login(
        HeaderMap::new(),
        Extension(pool.clone()),
        Extension(state.clone()),
        Some(Json(LoginRequest {
            email: email.to_string(),
            password: TEST_PASSWORD.to_string(),
        })),
    )
    .await;
    match result {
        Ok(ok) => ok.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn refresh_response(pool: &PgPool, state: &Arc<AuthState>, token: &str) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("refreshToken={token}")) {
        headers.insert(COOKIE, value);
    }
    let result = refresh(headers, Extension(pool.clone()), Extension(state.clone())).await;
    match result {
        Ok(ok) => ok.into_response(),
        Err(err) => err.into_response(),
    }
}

fn set_cookie_token(response: &Response) -> Result<String> {
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .context("missing Set-Cookie header")?;
    let token = cookie
        .strip_prefix("refreshToken=")
        .and_then(|rest| rest.split(';').next())
        .context("missing refreshToken value")?;
    if token.is_empty() {
        bail!("refresh cookie is empty");
    }
    Ok(token.to_string())
}

#[tokio::test]
async fn rotation_rejects_the_prior_token() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let user = create_verified_user(&pool).await?;

    set_refresh_token(&pool, user.id, "first").await?;
    assert!(rotate_refresh_token(&pool, user.id, "first", "second").await?);

    // The retired token no longer matches the stored value.
    assert!(!rotate_refresh_token(&pool, user.id, "first", "third").await?);
    assert!(rotate_refresh_token(&pool, user.id, "second", "third").await?);
    Ok(())
}

#[tokio::test]
async fn logout_clears_the_stored_token() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let user = create_verified_user(&pool).await?;

    set_refresh_token(&pool, user.id, "session-token").await?;
    clear_refresh_token_by_value(&pool, "session-token").await?;
    assert!(!rotate_refresh_token(&pool, user.id, "session-token", "new").await?);
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_rejects_replay() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let state = auth_state();
    let user = create_verified_user(&pool).await?;

    let response = login_response(&pool, &state, &user.email).await;
    assert_eq!(response.status(), StatusCode::OK);
    let first_token = set_cookie_token(&response)?;

    let response = refresh_response(&pool, &state, &first_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second_token = set_cookie_token(&response)?;
    assert_ne!(first_token, second_token);

    // Replaying the rotated-out cookie is treated as reuse and, fail-closed,
    // also kills the live session.
    let response = refresh_response(&pool, &state, &first_token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = refresh_response(&pool, &state, &second_token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn refresh_after_logout_is_forbidden() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let state = auth_state();
    let user = create_verified_user(&pool).await?;

    let response = login_response(&pool, &state, &user.email).await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = set_cookie_token(&response)?;

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(&format!("refreshToken={token}"))?);
    let response = logout(headers, Extension(pool.clone()), Extension(state.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let response = refresh_response(&pool, &state, &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn sequential_logins_invalidate_the_previous_session() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let state = auth_state();
    let user = create_verified_user(&pool).await?;

    let first = set_cookie_token(&login_response(&pool, &state, &user.email).await)?;
    let second = set_cookie_token(&login_response(&pool, &state, &user.email).await)?;
    assert_ne!(first, second);

    let response = refresh_response(&pool, &state, &first).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = refresh_response(&pool, &state, &second).await;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn verification_is_idempotent_for_duplicate_clicks() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let (_user, raw_token) = create_user(&pool, 3600).await?;
    let token_hash = hash_verification_token(&raw_token);

    assert_eq!(
        consume_verification_token(&pool, &token_hash).await?,
        VerifyOutcome::Verified
    );
    assert_eq!(
        consume_verification_token(&pool, &token_hash).await?,
        VerifyOutcome::AlreadyVerified
    );
    assert_eq!(
        consume_verification_token(&pool, &hash_verification_token("bogus")).await?,
        VerifyOutcome::Invalid
    );
    Ok(())
}

#[tokio::test]
async fn expired_unverified_account_releases_its_slot() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };

    // Verification window already lapsed at insert time.
    let (user, _raw_token) = create_user(&pool, -10).await?;

    let raw_token = generate_verification_token()?;
    let password_hash = hash_password(TEST_PASSWORD)?;
    let outcome = insert_user(
        &pool,
        "Ann",
        &user.username,
        &user.email,
        &password_hash,
        &hash_verification_token(&raw_token),
        3600,
    )
    .await?;
    let SignupOutcome::Created(replacement) = outcome else {
        bail!("expected expired unverified slot to be reclaimed");
    };
    assert_ne!(replacement.id, user.id);
    Ok(())
}

#[tokio::test]
async fn verified_account_keeps_its_slot() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let user = create_verified_user(&pool).await?;

    let raw_token = generate_verification_token()?;
    let password_hash = hash_password(TEST_PASSWORD)?;
    let outcome = insert_user(
        &pool,
        "Ann",
        &user.username,
        &user.email,
        &password_hash,
        &hash_verification_token(&raw_token),
        3600,
    )
    .await?;
    assert!(matches!(outcome, SignupOutcome::Conflict));
    Ok(())
}
