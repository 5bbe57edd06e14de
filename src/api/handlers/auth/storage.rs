//! Database helpers for user credentials, verification, and session state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::PublicUser;
use super::utils::is_unique_violation;

/// Outcome when attempting to create a new user record.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(PublicUser),
    Conflict,
}

/// Outcome when consuming an email verification token.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum VerifyOutcome {
    Verified,
    AlreadyVerified,
    Invalid,
}

/// Credential fields needed by login and refresh.
pub(super) struct UserRecord {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) username: String,
    pub(super) email: String,
    pub(super) password_hash: String,
    pub(super) role: String,
    pub(super) is_verified: bool,
    pub(super) refresh_token: Option<String>,
}

impl UserRecord {
    pub(super) fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

/// Create a new unverified account.
///
/// An unverified account whose verification window has lapsed no longer
/// holds its email/username slot: on a unique violation the expired row is
/// purged and the insert retried once, so the address can register again.
pub(super) async fn insert_user(
    pool: &PgPool,
    name: &str,
    username: &str,
    email: &str,
    password_hash: &str,
    verification_token_hash: &[u8],
    verification_ttl_seconds: i64,
) -> Result<SignupOutcome> {
    if let Some(user) = try_insert_user(
        pool,
        name,
        username,
        email,
        password_hash,
        verification_token_hash,
        verification_ttl_seconds,
    )
    .await?
    {
        return Ok(SignupOutcome::Created(user));
    }

    if purge_expired_unverified(pool, username, email).await? == 0 {
        return Ok(SignupOutcome::Conflict);
    }

    match try_insert_user(
        pool,
        name,
        username,
        email,
        password_hash,
        verification_token_hash,
        verification_ttl_seconds,
    )
    .await?
    {
        Some(user) => Ok(SignupOutcome::Created(user)),
        None => Ok(SignupOutcome::Conflict),
    }
}

async fn try_insert_user(
    pool: &PgPool,
    name: &str,
    username: &str,
    email: &str,
    password_hash: &str,
    verification_token_hash: &[u8],
    verification_ttl_seconds: i64,
) -> Result<Option<PublicUser>> {
    let query = r"
        INSERT INTO users
            (name, username, email, password_hash,
             verification_token_hash, verification_token_expires_at)
        VALUES ($1, $2, $3, $4, $5, NOW() + ($6 * INTERVAL '1 second'))
        RETURNING id, name, username, email, role
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(name)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(verification_token_hash)
        .bind(verification_ttl_seconds)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(Some(PublicUser {
            id: row.get("id"),
            name: row.get("name"),
            username: row.get("username"),
            email: row.get("email"),
            role: row.get("role"),
        })),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

async fn purge_expired_unverified(pool: &PgPool, username: &str, email: &str) -> Result<u64> {
    let query = r"
        DELETE FROM users
        WHERE (email = $1 OR username = $2)
          AND is_verified = FALSE
          AND verification_token_expires_at < NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(email)
        .bind(username)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to purge expired unverified accounts")?;
    Ok(result.rows_affected())
}

pub(super) async fn lookup_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, name, username, email, password_hash, role, is_verified, refresh_token
        FROM users
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    Ok(row.map(user_record))
}

pub(super) async fn lookup_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, name, username, email, password_hash, role, is_verified, refresh_token
        FROM users
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;

    Ok(row.map(user_record))
}

fn user_record(row: sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        name: row.get("name"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        is_verified: row.get("is_verified"),
        refresh_token: row.get("refresh_token"),
    }
}

/// Consume a verification token, activating the account on first use.
///
/// The token hash stays on the record after verification so duplicate link
/// clicks resolve to the verified account and succeed without mutation; the
/// retained hash gates nothing once `is_verified` is set.
pub(super) async fn consume_verification_token(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<VerifyOutcome> {
    let query = r"
        SELECT id, is_verified, verification_token_expires_at
        FROM users
        WHERE verification_token_hash = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup verification token")?;

    let Some(row) = row else {
        return Ok(VerifyOutcome::Invalid);
    };

    if row.get::<bool, _>("is_verified") {
        return Ok(VerifyOutcome::AlreadyVerified);
    }

    let expires_at: Option<DateTime<Utc>> = row.get("verification_token_expires_at");
    if !expires_at.is_some_and(|deadline| deadline > Utc::now()) {
        return Ok(VerifyOutcome::Invalid);
    }

    let user_id: Uuid = row.get("id");
    let query = r"
        UPDATE users
        SET is_verified = TRUE,
            verification_token_expires_at = NULL,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark user verified")?;

    Ok(VerifyOutcome::Verified)
}

/// Persist a freshly-issued refresh token, replacing any prior one.
///
/// Single-session semantics: a second login unconditionally invalidates the
/// previous session's refresh token.
pub(super) async fn set_refresh_token(pool: &PgPool, user_id: Uuid, token: &str) -> Result<()> {
    let query = r"
        UPDATE users
        SET refresh_token = $2, updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to set refresh token")?;
    Ok(())
}

/// Atomic compare-and-rotate of the stored refresh token.
///
/// Returns `true` only if the stored token still equaled `old`; a `false`
/// result means the token was already rotated or cleared, which the caller
/// treats as a reuse signal. The conditional UPDATE keeps concurrent refreshes
/// from both succeeding.
pub(super) async fn rotate_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    old: &str,
    new: &str,
) -> Result<bool> {
    let query = r"
        UPDATE users
        SET refresh_token = $3, updated_at = NOW()
        WHERE id = $1 AND refresh_token = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(old)
        .bind(new)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to rotate refresh token")?;

    Ok(result.rows_affected() == 1)
}

/// Clear the session for a user (reuse detection fail-closed path).
pub(super) async fn clear_refresh_token(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE users
        SET refresh_token = NULL, updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to clear refresh token")?;
    Ok(())
}

/// Clear the session for whichever user holds this token value.
///
/// Logout is idempotent; no matching user is a no-op, not an error.
pub(super) async fn clear_refresh_token_by_value(pool: &PgPool, token: &str) -> Result<()> {
    let query = r"
        UPDATE users
        SET refresh_token = NULL, updated_at = NOW()
        WHERE refresh_token = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to clear refresh token by value")?;
    Ok(())
}
