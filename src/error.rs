// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request, scoped to a single payload field
    Validation { field: String, message: String },

    // 400 Bad Request. Rejected credential exchange (wrong confirmation
    // code) stays in the 400 class; that is the published contract.
    AuthenticationFailed(String),

    // 401 Unauthorized (anonymous actor on a protected action, bad bearer)
    Unauthorized(String),

    // 403 Forbidden (authenticated actor without the capability)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Validation failures use the field-scoped body `{"<field>": ["<message>"]}`
/// so store-constraint conflicts and handler pre-checks are indistinguishable
/// to callers; everything else is `{"error": "<message>"}`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ field: [message] })),
            )
                .into_response(),
            AppError::AuthenticationFailed(msg) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "confirmation_code": [msg] })),
            )
                .into_response(),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": msg })),
            )
                .into_response(),
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": msg }))).into_response()
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
        }
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

/// Maps DTO validation failures onto the first offending field, in field
/// order, so the response names a concrete field.
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<String> = field_errors.keys().map(|k| k.to_string()).collect();
        fields.sort();

        for field in fields {
            if let Some((_, errs)) = field_errors.iter().find(|(k, _)| k.as_ref() == field) {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value.".to_string());
                return AppError::Validation { field, message };
            }
        }

        AppError::validation("non_field_errors", "Invalid payload.")
    }
}

/// Returns the database message when `err` is a unique-constraint violation.
/// SQLite spells out the index columns (e.g. "UNIQUE constraint failed:
/// users.username"), which lets callers pick the field to report.
pub fn db_unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Some(db.message().to_string()),
        _ => None,
    }
}
