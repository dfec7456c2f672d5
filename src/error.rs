use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::mail::MailError;

/// ApiError
///
/// The single error taxonomy surfaced at the controller boundary. Every
/// variant maps to exactly one HTTP status and one JSON body shape:
/// validation failures are field-keyed, everything else uses the
/// conventional `{"detail": ...}` envelope. There are no internal retries;
/// a failure is returned to the caller immediately.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or constraint-violating input. Keyed by the offending field.
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    /// Identity failure: missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),
    /// Authorization failure: valid identity, insufficient rights.
    /// Carries the denial reason from the permission policy.
    #[error("{0}")]
    Forbidden(String),
    /// The referenced entity does not exist (or is outside the queryset).
    #[error("not found")]
    NotFound,
    /// The external mail gateway failed during signup. The user record is
    /// already persisted by the time this surfaces.
    #[error("mail delivery failed: {0}")]
    Mail(#[from] MailError),
    /// Unexpected database failure. Unique violations never reach this
    /// variant; `From<sqlx::Error>` remaps them to `Validation` first.
    #[error(transparent)]
    Database(sqlx::Error),
    /// Unexpected server-side failure outside the database.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    /// Remaps unique-constraint violations to field-keyed validation errors,
    /// deriving the field from the constraint name. Concurrent inserts that
    /// race past an application-level existence check land here.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return match db_err.constraint() {
                    Some(c) if c.contains("author_for_title") => ApiError::validation(
                        "author",
                        "You have already left a review for this title.",
                    ),
                    Some(c) if c.contains("username") => {
                        ApiError::validation("username", "This username is already taken.")
                    }
                    Some(c) if c.contains("email") => {
                        ApiError::validation("email", "This email is already taken.")
                    }
                    Some(c) if c.contains("slug") => {
                        ApiError::validation("slug", "This slug is already taken.")
                    }
                    _ => ApiError::validation("non_field_errors", "This record already exists."),
                };
            }
        }
        ApiError::Database(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation { field, message } => {
                // DRF-style body: {"<field>": ["<message>"]}.
                let mut body = serde_json::Map::new();
                body.insert(field.to_string(), json!([message]));
                (StatusCode::BAD_REQUEST, Json(serde_json::Value::Object(body))).into_response()
            }
            ApiError::Unauthorized(detail) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Forbidden(detail) => {
                (StatusCode::FORBIDDEN, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "detail": "Not found." })),
            )
                .into_response(),
            ApiError::Mail(e) => {
                tracing::warn!("confirmation email send failed: {e}");
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "detail": "Error sending the confirmation email." })),
                )
                    .into_response()
            }
            ApiError::Database(e) => {
                tracing::error!("database error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error." })),
                )
                    .into_response()
            }
            ApiError::Internal(e) => {
                tracing::error!("internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error." })),
                )
                    .into_response()
            }
        }
    }
}
