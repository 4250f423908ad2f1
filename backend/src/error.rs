//! Error handling for the warehouse inventory ledger
//!
//! One error type for every ledger and document operation, mapped onto a
//! consistent JSON error body for HTTP callers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use shared::{StateError, StockKey, UnknownCode};

/// One line item that failed during a multi-line transition
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineFailure {
    pub item_id: i64,
    pub code: String,
    pub reason: String,
}

/// A document transition where some lines failed.
///
/// Lines that succeeded keep their ledger effects; the document status did
/// not advance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionFailure {
    pub document_no: String,
    pub action: String,
    pub failures: Vec<LineFailure>,
}

impl TransitionFailure {
    pub fn failed_item_ids(&self) -> Vec<i64> {
        self.failures.iter().map(|f| f.item_id).collect()
    }
}

impl std::fmt::Display for TransitionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} failed for line(s) {:?}",
            self.action,
            self.document_no,
            self.failed_item_ids()
        )
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ledger and document errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Insufficient available quantity on {key}: requested {requested}, available {available}")]
    InsufficientAvailable {
        key: StockKey,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Version conflict on {key}: expected {expected}, actual {actual}")]
    VersionConflict {
        key: StockKey,
        expected: i64,
        actual: i64,
    },

    #[error("Concurrency exhausted on {key} after {attempts} attempts")]
    ConcurrencyExhausted { key: StockKey, attempts: u32 },

    #[error("Partial failure: {0}")]
    PartialFailure(TransitionFailure),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether re-reading and retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::VersionConflict { .. })
    }

    /// Stable machine-readable code, also used in line failure reports
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Validation { .. } | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InsufficientAvailable { .. } => "INSUFFICIENT_AVAILABLE",
            AppError::VersionConflict { .. } => "VERSION_CONFLICT",
            AppError::ConcurrencyExhausted { .. } => "CONCURRENCY_EXHAUSTED",
            AppError::PartialFailure(_) => "PARTIAL_FAILURE",
            AppError::Busy(_) => "BUSY",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Summarise this error as the failure of one line item
    pub fn into_line_failure(self, item_id: i64) -> LineFailure {
        LineFailure {
            item_id,
            code: self.code().to_string(),
            reason: self.to_string(),
        }
    }
}

impl From<StateError> for AppError {
    fn from(err: StateError) -> Self {
        AppError::InvalidState(err.to_string())
    }
}

impl From<UnknownCode> for AppError {
    fn from(err: UnknownCode) -> Self {
        AppError::validation(err.kind, err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by_key(|(field, _)| **field);
        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                AppError::validation(field.to_string(), message)
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_detail) = match &self {
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorDetail::new(code, msg.clone()))
            }
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new(code, message.clone())
                },
            ),
            AppError::ValidationError(msg) => {
                (StatusCode::BAD_REQUEST, ErrorDetail::new(code, msg.clone()))
            }
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(code, format!("{} not found", resource)),
            ),
            AppError::InvalidState(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(code, msg.clone()),
            ),
            AppError::InsufficientAvailable {
                key,
                requested,
                available,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(serde_json::json!({
                        "key": key,
                        "requested": requested,
                        "available": available,
                    })),
                    ..ErrorDetail::new(code, self.to_string())
                },
            ),
            AppError::VersionConflict { .. } | AppError::Busy(_) => {
                (StatusCode::CONFLICT, ErrorDetail::new(code, self.to_string()))
            }
            AppError::ConcurrencyExhausted { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new(code, self.to_string()),
            ),
            AppError::PartialFailure(failure) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    details: serde_json::to_value(failure).ok(),
                    ..ErrorDetail::new(code, failure.to_string())
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(code, format!("Configuration error: {}", msg)),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(code, "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(code, msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(code, "An internal server error occurred"),
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

/// Turn a `&'static str` validation failure into an error on `field`
pub trait ValidateField<T> {
    fn on_field(self, field: &str) -> AppResult<T>;
}

impl<T> ValidateField<T> for Result<T, &'static str> {
    fn on_field(self, field: &str) -> AppResult<T> {
        self.map_err(|message| AppError::validation(field, message))
    }
}
