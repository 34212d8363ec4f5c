// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("A verified QR scan is required before checkout")]
    ScanRequired,

    #[error("Payment verification failed: {0}")]
    PaymentVerification(String),

    #[error("Checkout provider unavailable: {0}")]
    CheckoutUnavailable(String),

    /// The device status write failed: the charger was not authorized and no
    /// history entry was written.
    #[error("Device status write failed: {0}")]
    DeviceStatusWrite(String),

    /// The device status write succeeded but the history append failed: the
    /// charger is authorized without a matching ledger entry.
    #[error("History write failed after device authorization ({seconds}s, transaction {transaction_id}): {reason}")]
    HistoryWrite {
        seconds: u64,
        transaction_id: String,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
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
            AppError::AuthRequired => (StatusCode::UNAUTHORIZED, "auth_required", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::ScanRequired => (StatusCode::FORBIDDEN, "scan_required", None),
            AppError::PaymentVerification(msg) => {
                tracing::warn!(reason = %msg, "Payment verification failed");
                (
                    StatusCode::PAYMENT_REQUIRED,
                    "payment_verification_failed",
                    None,
                )
            }
            AppError::CheckoutUnavailable(msg) => {
                tracing::error!(error = %msg, "Checkout provider unavailable");
                (StatusCode::BAD_GATEWAY, "checkout_unavailable", None)
            }
            AppError::DeviceStatusWrite(msg) => {
                tracing::error!(error = %msg, "Device status write failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "device_status_write_failed",
                    None,
                )
            }
            AppError::HistoryWrite {
                seconds,
                transaction_id,
                reason,
            } => {
                tracing::error!(
                    seconds,
                    transaction_id = %transaction_id,
                    error = %reason,
                    "Charger authorized but history append failed"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "history_write_failed",
                    Some(format!(
                        "charger authorized for {} seconds; transaction {} was not recorded",
                        seconds, transaction_id
                    )),
                )
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
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
