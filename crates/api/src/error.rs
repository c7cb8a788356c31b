//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use alerting::AlertError;
use broadcast::RegistryError;
use notifier::NotifyError;
use storage::StorageError;

/// Errors surfaced at the HTTP boundary
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not found")]
    NotFound,

    #[error("Access denied")]
    Forbidden,

    #[error("Conflicting concurrent update, retry later")]
    Conflict,

    /// Internal detail is logged, never returned
    #[error("Service temporarily unavailable")]
    Unavailable(String),
}

/// Error body returned to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound => "not_found",
            ApiError::Forbidden => "forbidden",
            ApiError::Conflict => "conflict",
            ApiError::Unavailable(_) => "service_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Unavailable(detail) = &self {
            error!("Request failed: {}", detail);
        }

        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<AlertError> for ApiError {
    fn from(e: AlertError) -> Self {
        match e {
            AlertError::Validation(msg) => ApiError::Validation(msg),
            AlertError::NotFound => ApiError::NotFound,
            AlertError::Forbidden => ApiError::Forbidden,
            AlertError::Conflict => ApiError::Conflict,
            AlertError::Unavailable(source) => ApiError::Unavailable(source.to_string()),
        }
    }
}

impl From<NotifyError> for ApiError {
    fn from(e: NotifyError) -> Self {
        match e {
            NotifyError::NotFound => ApiError::NotFound,
            NotifyError::Unavailable(source) => ApiError::Unavailable(source.to_string()),
            NotifyError::QueueClosed => {
                ApiError::Unavailable("fan-out queue is closed".to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(_) => ApiError::Conflict,
            other => ApiError::Unavailable(other.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        ApiError::Unavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_errors_map_to_distinct_codes() {
        let cases = [
            (
                AlertError::Validation("title is required".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
            ),
            (AlertError::NotFound, StatusCode::NOT_FOUND, "not_found"),
            (AlertError::Forbidden, StatusCode::FORBIDDEN, "forbidden"),
            (AlertError::Conflict, StatusCode::CONFLICT, "conflict"),
        ];
        for (error, status, code) in cases {
            let api: ApiError = error.into();
            assert_eq!(api.status(), status);
            assert_eq!(api.code(), code);
        }
    }

    #[test]
    fn test_storage_detail_is_not_leaked() {
        let storage = StorageError::DatabaseError("no such table: alerts".into());
        let api: ApiError = AlertError::Unavailable(storage).into();
        assert_eq!(api.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!api.to_string().contains("alerts"));
    }
}
