use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Outcome kinds of the registration ledger. Every ledger operation reports
/// one of these instead of a bare database error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("An active registration already exists for this event")]
    DuplicateRegistration,
    #[error("Event has reached its capacity")]
    CapacityExceeded,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Not permitted: {0}")]
    Unauthorized(String),
    #[error("Event store unavailable")]
    Unavailable,
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Unauthenticated => "UNAUTHENTICATED",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::DuplicateRegistration => "DUPLICATE_REGISTRATION",
            LedgerError::CapacityExceeded => "CAPACITY_EXCEEDED",
            LedgerError::InvalidTransition(_) => "INVALID_TRANSITION",
            LedgerError::Unauthorized(_) => "UNAUTHORIZED",
            LedgerError::Unavailable => "UNAVAILABLE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            LedgerError::Unauthenticated => StatusCode::UNAUTHORIZED,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::DuplicateRegistration
            | LedgerError::CapacityExceeded
            | LedgerError::InvalidTransition(_) => StatusCode::CONFLICT,
            LedgerError::Unauthorized(_) => StatusCode::FORBIDDEN,
            LedgerError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// Stable machine-readable kind, sent as `code` in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Ledger(e) => e.code(),
            AppError::Database(e) if is_unique_violation(e) => "CONFLICT",
            AppError::Database(_) | AppError::Internal => "INTERNAL",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized => "UNAUTHENTICATED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION",
        }
    }

    /// True when the error is a unique-constraint violation reported by the store.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Database(e) => is_unique_violation(e),
            _ => false,
        }
    }
}

pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db_err| db_err.code())
        // 2067 = SQLite Unique Constraint
        // 23505 = PostgreSQL Unique Violation
        .map(|code| code == "2067" || code == "23505")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Ledger(e) => (e.status(), e.to_string()),
            AppError::Database(e) => {
                if is_unique_violation(e) {
                    (StatusCode::CONFLICT, "Resource already exists (duplicate entry)".to_string())
                } else {
                    error!("Database error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()),
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}
