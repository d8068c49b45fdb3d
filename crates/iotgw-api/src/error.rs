// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API error types and handling.
//!
//! Errors render as `{"error": "...", "message": "..."}`, the shape the
//! gateway's HTTP clients already parse. `message` is omitted when there is
//! no detail.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use iotgw_opcua::GatewayError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// ApiError
// =============================================================================

/// API error type with HTTP status code mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request (400).
    #[error("Bad request: {error}")]
    BadRequest {
        /// Short error text.
        error: String,
        /// Optional detail.
        message: Option<String>,
    },

    /// Missing or wrong credentials (401).
    #[error("Unauthorized: {error}")]
    Unauthorized {
        /// Short error text.
        error: String,
    },

    /// Rate limit exceeded (429).
    #[error("Rate limit exceeded")]
    RateLimitExceeded {
        /// Seconds until the window resets.
        retry_after: u64,
    },

    /// Internal server error (500).
    #[error("Internal error: {error}")]
    Internal {
        /// Short error text.
        error: String,
        /// Optional detail.
        message: Option<String>,
    },

    /// Gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ApiError {
    /// Creates a bad request error.
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::BadRequest {
            error: error.into(),
            message: None,
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(error: impl Into<String>) -> Self {
        Self::Unauthorized {
            error: error.into(),
        }
    }

    /// Creates a rate limit exceeded error.
    pub fn rate_limit_exceeded(retry_after: u64) -> Self {
        Self::RateLimitExceeded { retry_after }
    }

    /// Creates an internal error.
    pub fn internal(error: impl Into<String>) -> Self {
        Self::Internal {
            error: error.into(),
            message: None,
        }
    }

    /// Attaches a detail message.
    pub fn with_message(mut self, detail: impl Into<String>) -> Self {
        match &mut self {
            Self::BadRequest { message, .. } | Self::Internal { message, .. } => {
                *message = Some(detail.into());
            }
            _ => {}
        }
        self
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Gateway(e) if e.is_caller_error() => StatusCode::BAD_REQUEST,
            ApiError::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::BadRequest { error, message } | ApiError::Internal { error, message } => {
                ErrorBody {
                    error: error.clone(),
                    message: message.clone(),
                }
            }
            ApiError::Unauthorized { error } => ErrorBody::new(error.clone()),
            ApiError::RateLimitExceeded { .. } => {
                ErrorBody::new("Too many requests from this IP, please try again later")
            }
            ApiError::Gateway(e) => ErrorBody::new(e.to_string()),
        }
    }
}

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_server_error() {
            tracing::error!(error = %self, status = %status, "Server error occurred");
        } else {
            tracing::debug!(error = %self, status = %status, "Client error occurred");
        }

        let mut response = (status, Json(self.body())).into_response();

        match &self {
            ApiError::Unauthorized { .. } => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
            }
            ApiError::RateLimitExceeded { retry_after } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
            }
            _ => {}
        }

        response
    }
}

// =============================================================================
// Error Response Body
// =============================================================================

/// Error response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error text.
    pub error: String,
    /// Optional detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Body without detail.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ApiError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::rate_limit_exceeded(60).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::from(GatewayError::AttributeNotSpecified).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(GatewayError::WriteRejected("Error: bad".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unauthorized_sets_challenge() {
        let response = ApiError::unauthorized("Invalid authentication credentials").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Basic");
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ApiError::rate_limit_exceeded(42).into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn test_body_omits_empty_message() {
        let body = ApiError::bad_request("ID is required").body();
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"error": "ID is required"})
        );

        let body = ApiError::internal("Failed to write to OPC UA node")
            .with_message("Bad")
            .body();
        assert_eq!(body.message.as_deref(), Some("Bad"));
    }
}
