/// Error types for connect-service
///
/// Every failure a handler can hit maps to one `AppError` variant, which in
/// turn maps to an HTTP status and a JSON body of the form
/// `{"error": <message>, "code": <kind>, "status": <status>}`.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use media_storage::StorageError;
use thiserror::Error;

use crate::db::StoreError;

/// Result type for connect-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// Input rejected before touching the store; the message is user-facing
    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_authenticated() -> Self {
        AppError::Unauthorized("Not authenticated".to_string())
    }

    /// Stable machine-readable kind, sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::UsernameTaken => "username_taken",
            AppError::Store(_) => "store",
            AppError::Storage(_) => "storage",
            AppError::Internal(_) => "internal",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) | AppError::UsernameTaken => StatusCode::CONFLICT,
            AppError::Storage(StorageError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
        }))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { constraint } => {
                AppError::Conflict(format!("duplicate value for {}", constraint))
            }
            StoreError::CheckViolation { constraint } => {
                AppError::Validation(format!("value violates {}", constraint))
            }
            StoreError::ForeignKeyViolation { .. } => {
                AppError::NotFound("referenced post".to_string())
            }
            other => AppError::Store(other),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("invalid {}", field),
                })
            })
            .next()
            .unwrap_or_else(|| "invalid request".to_string());
        AppError::Validation(message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
