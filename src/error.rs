//! Error types for the REST API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;


/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// Error code.
    pub code: String,
}

/// Rate limit error response body.
#[derive(Debug, Serialize)]
pub struct RateLimitErrorResponse {
    /// Error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Seconds until the window resets.
    pub retry_after: u64,
}

/// API error types.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Invalid request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Chart image payload rejected.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Chart image payload too large.
    #[error("Image too large: {size} bytes exceeds limit of {limit} bytes")]
    ImageTooLarge {
        /// Actual payload size.
        size: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// Upstream analysis provider failure.
    #[error("Analysis provider error: {0}")]
    Provider(String),

    /// Internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded {
        /// Maximum requests allowed per window.
        limit: u32,
        /// Remaining requests (always 0 when exceeded).
        remaining: u32,
        /// Unix timestamp (seconds) when the rate limit resets.
        reset: u64,
        /// Seconds until reset.
        retry_after: u64,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::RateLimitExceeded {
                limit,
                remaining,
                reset,
                retry_after,
            } => {
                let body = Json(RateLimitErrorResponse {
                    error: "RATE_LIMIT_EXCEEDED".to_string(),
                    message: "Rate limit exceeded. Please retry later.".to_string(),
                    retry_after: *retry_after,
                });

                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [
                        ("X-RateLimit-Limit", limit.to_string()),
                        ("X-RateLimit-Remaining", remaining.to_string()),
                        ("X-RateLimit-Reset", reset.to_string()),
                        ("Retry-After", retry_after.to_string()),
                    ],
                    body,
                )
                    .into_response()
            }
            _ => {
                let (status, code) = match &self {
                    ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
                    ApiError::InvalidImage(_) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE"),
                    ApiError::ImageTooLarge { .. } => {
                        (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE")
                    }
                    ApiError::Provider(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
                    ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
                    ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    ApiError::RateLimitExceeded { .. } => unreachable!(),
                };

                let body = Json(ErrorResponse {
                    error: self.to_string(),
                    code: code.to_string(),
                });

                (status, body).into_response()
            }
        }
    }
}

impl From<crate::governance::GovernanceError> for ApiError {
    fn from(err: crate::governance::GovernanceError) -> Self {
        ApiError::InvalidRequest(err.to_string())
    }
}
