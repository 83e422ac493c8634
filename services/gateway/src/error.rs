use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use persistence::StoreError;
use serde_json::json;
use thiserror::Error;
use types::errors::{PipelineError, ValidationError};

/// Central error type for the gateway application
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(e) => AppError::Validation(e),
            // The order was never durably accepted; the submitter should
            // retry, which is different from a business-logic failure
            PipelineError::Queue(e) => AppError::ServiceUnavailable(e.to_string()),
            PipelineError::Order(e) => AppError::BadRequest(e.to_string()),
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { order_id } => {
                AppError::NotFound(format!("order {}", order_id))
            }
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, retryable) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED", false),
            AppError::RateLimitExceeded(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                msg,
                "RATE_LIMIT_EXCEEDED",
                true,
            ),
            AppError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                err.to_string(),
                "VALIDATION_FAILED",
                false,
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST", false),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND", false),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                msg,
                "SERVICE_UNAVAILABLE",
                true,
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "INTERNAL_ERROR",
                false,
            ),
        };

        let body = Json(json!({
            "error": code,
            "message": error_message,
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::errors::QueueError;

    #[test]
    fn test_queue_error_maps_to_retryable_503() {
        let err: AppError = PipelineError::Queue(QueueError::Unavailable("down".into())).into();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_validation_error_maps_to_400() {
        let err: AppError = ValidationError::NonPositiveQuantity.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_not_found_maps_to_404() {
        let err: AppError = StoreError::NotFound {
            order_id: types::ids::OrderId::new(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
