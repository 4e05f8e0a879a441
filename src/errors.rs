use crate::services::file_store::StoreError;
use crate::services::quote_service::QuoteError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<QuoteError> for AppError {
    fn from(err: QuoteError) -> Self {
        let status = match &err {
            QuoteError::Validation(_) => StatusCode::BAD_REQUEST,
            QuoteError::Forbidden(_) => StatusCode::FORBIDDEN,
            QuoteError::NotFound(_)
            | QuoteError::GroupNotFound(_)
            | QuoteError::FileNotFound { .. } => StatusCode::NOT_FOUND,
            QuoteError::NumberConflict
            | QuoteError::RevisionConflict
            | QuoteError::Lifecycle(_) => StatusCode::CONFLICT,
            QuoteError::Store(store) => return store_status(store, err.to_string()),
            QuoteError::Sqlx(_) | QuoteError::Archive(_) | QuoteError::Io(_) => {
                tracing::error!("internal error: {err}");
                return AppError::internal("internal server error");
            }
        };
        AppError::new(status, err.to_string())
    }
}

fn store_status(err: &StoreError, message: String) -> AppError {
    match err {
        StoreError::FileTooLarge(_) => AppError::new(StatusCode::PAYLOAD_TOO_LARGE, message),
        StoreError::UnsupportedFileType(_) => {
            AppError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, message)
        }
        StoreError::InvalidFileName => AppError::bad_request(message),
        StoreError::BlobMissing(_) | StoreError::Io(_) => {
            tracing::error!("storage error: {message}");
            AppError::internal("internal server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn maps_domain_errors_to_statuses() {
        let cases: [(QuoteError, StatusCode); 4] = [
            (
                QuoteError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (QuoteError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (QuoteError::NotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (QuoteError::RevisionConflict, StatusCode::CONFLICT),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status, expected);
        }
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = QuoteError::Io(std::io::Error::other("disk on fire"));
        let app = AppError::from(err);
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.message, "internal server error");
    }
}
