//! API error handling: the single place where failures become HTTP responses.
//!
//! Every failure branch in the application converges on [`ApiError`], which
//! renders the uniform `{ "error": <message> }` envelope with the matching
//! status code. Store failures are logged with their underlying cause and
//! surface only a generic message to the caller.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// ApiError
///
/// The application's error taxonomy. Variants map one-to-one onto the
/// HTTP statuses the API contract allows; handlers return
/// `Result<_, ApiError>` and let `IntoResponse` do the formatting.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No identity resolved for a route that requires one (401).
    #[error("Unauthorized")]
    Unauthorized,

    /// Identity resolved, but the authoritative store says the privilege
    /// is below the required tier (403).
    #[error("Forbidden")]
    Forbidden,

    /// Payload failed a strict type/shape check (400).
    #[error("{0}")]
    BadRequest(String),

    /// Referenced record absent (404).
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation on create (409).
    #[error("{0}")]
    Conflict(String),

    /// Any unexpected failure (500). The cause is logged at the conversion
    /// site; the caller only ever sees a generic message.
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Persistence failures are never exposed raw: log the cause for operators,
/// return the generic 500 variant to the formatter.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("database error: {:?}", err);
        ApiError::Internal
    }
}
