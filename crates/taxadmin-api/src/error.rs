//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Domain errors from `taxadmin-core` map onto HTTP status codes here, and
//! every failure is rendered as the same JSON envelope. Internal error
//! details never reach the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Field errors for 422 responses carrying more than one problem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// A single business rule failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Several form fields failed validation (422). Every message is
    /// returned under `details.errors`.
    #[error("validation error: {}", .0.join("; "))]
    InvalidFields(Vec<String>),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks the permission (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state, including a lost optimistic
    /// version check (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) | Self::InvalidFields(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Shorthand for a missing record of `kind`.
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} {id} not found"))
    }

    /// Shorthand for a database failure, logged with its context.
    pub fn database(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, context, "database operation failed");
        Self::Internal(format!("{context}: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::InvalidFields(_) => "request validation failed".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let details = match &self {
            Self::InvalidFields(errors) => Some(serde_json::json!({ "errors": errors })),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<taxadmin_core::ValidationError> for AppError {
    fn from(err: taxadmin_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Ledger rule violations are state conflicts, except a bad amount which is
/// a plain validation failure.
impl From<taxadmin_core::LedgerError> for AppError {
    fn from(err: taxadmin_core::LedgerError) -> Self {
        match &err {
            taxadmin_core::LedgerError::NonPositiveAmount(_) => Self::Validation(err.to_string()),
            taxadmin_core::LedgerError::ReturnNotPayable { .. }
            | taxadmin_core::LedgerError::PaymentNotPending { .. } => {
                Self::Conflict(err.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database("transaction", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn status_codes_per_variant() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AppError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            (
                AppError::InvalidFields(vec!["a".into()]),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
            ),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code), "{err}");
        }
    }

    #[test]
    fn ledger_errors_map_to_conflict_or_validation() {
        let err = AppError::from(taxadmin_core::LedgerError::ReturnNotPayable {
            status: "Finalized".into(),
        });
        assert_eq!(err.status_and_code().0, StatusCode::CONFLICT);

        let err = AppError::from(taxadmin_core::LedgerError::NonPositiveAmount("0.00".into()));
        assert_eq!(err.status_and_code().0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn invalid_fields_carry_every_message() {
        let (status, body) = response_parts(AppError::InvalidFields(vec![
            "username is required".into(),
            "email must be a valid email address".into(),
        ]))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let errors = body.error.details.unwrap()["errors"].clone();
        assert_eq!(errors.as_array().unwrap().len(), 2);
        assert_eq!(errors[0], "username is required");
    }

    #[tokio::test]
    async fn internal_message_is_hidden() {
        let (status, body) = response_parts(AppError::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.message, "An internal error occurred");
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let (_, body) = response_parts(AppError::not_found("tax return", "abc")).await;
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("tax return abc not found"));
    }
}
