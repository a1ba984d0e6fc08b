use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A submission failed validation; names every offending field.
    #[error("Invalid submission: {}", fields.join(", "))]
    InvalidSubmission { fields: Vec<&'static str> },

    #[error("Insufficient credit")]
    InsufficientCredit,

    /// The pipeline failed after the credit was debited.
    #[error("Processing error: {0}")]
    Processing(String),

    /// A payment notification could not be applied. The caller must retry.
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) | AppError::InvalidSubmission { .. } => "VALIDATION_ERROR",
            AppError::InsufficientCredit => "INSUFFICIENT_CREDIT",
            AppError::Processing(_) => "PROCESSING_ERROR",
            AppError::Reconciliation(_) => "RECONCILIATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidSubmission { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::InsufficientCredit => (
                StatusCode::PAYMENT_REQUIRED,
                "You need credits to use this service. Please purchase a plan.".to_string(),
            ),
            AppError::Processing(reason) => (
                StatusCode::BAD_GATEWAY,
                format!(
                    "Failed to process resume: {reason}. \
                     Your credit was used for this attempt; contact support or try again."
                ),
            ),
            AppError::Reconciliation(msg) => {
                tracing::error!("Reconciliation error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let AppError::InvalidSubmission { fields } = &self {
            error["fields"] = json!(fields);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
