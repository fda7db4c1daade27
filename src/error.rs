// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

/// Failure reported by the remote backend (auth, store or push channel).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced a usable response.
    #[error("Backend unreachable: {0}")]
    Transport(String),

    /// A caller-imposed deadline elapsed.
    #[error("Backend did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The stored credential cannot be used and must be discarded.
    #[error("Stored session is invalid: {0}")]
    CorruptSession(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected backend response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_corrupt_session(&self) -> bool {
        matches!(self, GatewayError::CorruptSession(_))
    }

    /// Soft failures that degrade to a safe default instead of surfacing.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_) | GatewayError::Timeout(_)
        ) || matches!(self, GatewayError::Rejected { status, .. } if *status >= 500)
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Payment provider error: {0}")]
    Payment(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
            }
            AppError::Payment(msg) => {
                tracing::error!(error = %msg, "Payment provider error");
                (StatusCode::BAD_GATEWAY, "payment_error", Some(msg.clone()))
            }
            AppError::Gateway(GatewayError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "not_found", Some(msg.clone()))
            }
            AppError::Gateway(err) => {
                tracing::error!(error = %err, "Backend error");
                (StatusCode::BAD_GATEWAY, "backend_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
