//! Habit CRUD, scoped to the authenticated user.
//!
//! Every query filters on the caller's user id, so a habit owned by another
//! account is indistinguishable from one that does not exist (404).

use anyhow::Context;
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorBody};

use super::auth::bearer::require_auth;
use super::auth::state::AuthState;
use super::auth::types::MessageResponse;

const HABIT_NAME_MAX_LENGTH: usize = 120;

#[derive(ToSchema, Serialize, Deserialize, Debug, sqlx::FromRow)]
pub struct Habit {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateHabitRequest {
    pub name: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdateHabitRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

fn validate_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Habit name is required".to_string()));
    }
    if name.chars().count() > HABIT_NAME_MAX_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Habit name must be at most {HABIT_NAME_MAX_LENGTH} characters"
        )));
    }
    Ok(name)
}

#[utoipa::path(
    get,
    path = "/habits",
    responses(
        (status = 200, description = "The caller's habits", body = [Habit]),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "habits"
)]
pub async fn list(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = require_auth(&headers, &auth_state)?;

    let query = r"
        SELECT id, name, description, tags, created_at, updated_at
        FROM habits
        WHERE user_id = $1
        ORDER BY created_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = query,
        otel.kind = "client"
    );
    let habits: Vec<Habit> = sqlx::query_as(query)
        .bind(claims.sub)
        .fetch_all(&*pool)
        .instrument(span)
        .await
        .context("Failed to list habits")?;

    Ok((StatusCode::OK, Json(habits)))
}

#[utoipa::path(
    post,
    path = "/habits",
    request_body = CreateHabitRequest,
    responses(
        (status = 201, description = "Habit created", body = Habit),
        (status = 400, description = "Invalid habit payload", body = ErrorBody),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "habits"
)]
pub async fn create(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreateHabitRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = require_auth(&headers, &auth_state)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::BadRequest("Invalid request body".to_string()));
    };
    let name = validate_name(&request.name)?;
    let tags = request.tags.unwrap_or_default();

    let query = r"
        INSERT INTO habits (user_id, name, description, tags)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, description, tags, created_at, updated_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = query,
        otel.kind = "client"
    );
    let habit: Habit = sqlx::query_as(query)
        .bind(claims.sub)
        .bind(name)
        .bind(request.description.as_deref())
        .bind(&tags)
        .fetch_one(&*pool)
        .instrument(span)
        .await
        .context("Failed to create habit")?;

    Ok((StatusCode::CREATED, Json(habit)))
}

#[utoipa::path(
    get,
    path = "/habits/{id}",
    params(("id" = Uuid, Path, description = "Habit id")),
    responses(
        (status = 200, description = "The habit", body = Habit),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 404, description = "No such habit for this user", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "habits"
)]
pub async fn get(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = require_auth(&headers, &auth_state)?;

    let query = r"
        SELECT id, name, description, tags, created_at, updated_at
        FROM habits
        WHERE id = $1 AND user_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = query,
        otel.kind = "client"
    );
    let habit: Option<Habit> = sqlx::query_as(query)
        .bind(id)
        .bind(claims.sub)
        .fetch_optional(&*pool)
        .instrument(span)
        .await
        .context("Failed to fetch habit")?;

    match habit {
        Some(habit) => Ok((StatusCode::OK, Json(habit))),
        None => Err(ApiError::NotFound("Habit not found".to_string())),
    }
}

#[utoipa::path(
    patch,
    path = "/habits/{id}",
    params(("id" = Uuid, Path, description = "Habit id")),
    request_body = UpdateHabitRequest,
    responses(
        (status = 200, description = "Updated habit", body = Habit),
        (status = 400, description = "Invalid habit payload", body = ErrorBody),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 404, description = "No such habit for this user", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "habits"
)]
pub async fn update(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<UpdateHabitRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = require_auth(&headers, &auth_state)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::BadRequest("Invalid request body".to_string()));
    };
    let name = match request.name.as_deref() {
        Some(name) => Some(validate_name(name)?.to_string()),
        None => None,
    };

    // COALESCE keeps absent fields untouched; an explicit description is
    // applied as given, including clearing it with an empty string.
    let query = r"
        UPDATE habits
        SET name = COALESCE($3, name),
            description = COALESCE($4, description),
            tags = COALESCE($5, tags),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING id, name, description, tags, created_at, updated_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = query,
        otel.kind = "client"
    );
    let habit: Option<Habit> = sqlx::query_as(query)
        .bind(id)
        .bind(claims.sub)
        .bind(name.as_deref())
        .bind(request.description.as_deref())
        .bind(request.tags.as_deref())
        .fetch_optional(&*pool)
        .instrument(span)
        .await
        .context("Failed to update habit")?;

    match habit {
        Some(habit) => Ok((StatusCode::OK, Json(habit))),
        None => Err(ApiError::NotFound("Habit not found".to_string())),
    }
}

#[utoipa::path(
    delete,
    path = "/habits/{id}",
    params(("id" = Uuid, Path, description = "Habit id")),
    responses(
        (status = 200, description = "Habit deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 404, description = "No such habit for this user", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "habits"
)]
pub async fn delete(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = require_auth(&headers, &auth_state)?;

    let query = r"
        DELETE FROM habits
        WHERE id = $1 AND user_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = query,
        otel.kind = "client"
    );
    let result = sqlx::query(query)
        .bind(id)
        .bind(claims.sub)
        .execute(&*pool)
        .instrument(span)
        .await
        .context("Failed to delete habit")?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Habit not found".to_string()));
    }
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Habit deleted".to_string(),
        }),
    ))
}
