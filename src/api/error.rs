//! Typed API errors and the single boundary translator to HTTP responses.
//!
//! Handlers return `Result<_, ApiError>`; everything below them propagates
//! typed errors with `?`. The `IntoResponse` impl is the only place where an
//! error kind becomes a status code and a `{success:false, message}` body.
//! Expected operational outcomes (bad input, missing/expired credentials) are
//! not logged as errors; only `Internal` is.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or duplicate input.
    #[error("{0}")]
    BadRequest(String),
    /// Missing, expired, or malformed credential or token.
    #[error("{0}")]
    Unauthorized(String),
    /// Authenticated but disallowed, including reuse-detected refresh.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// Rate limited; enforced before any credential or persistence work.
    #[error("{0}")]
    TooManyRequests(String),
    /// Unexpected persistence or signing failure. Details stay server-side.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Uniform failure body; no stack traces or internals cross the boundary.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(err) => {
                error!("Internal error: {err:#}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            success: false,
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}
