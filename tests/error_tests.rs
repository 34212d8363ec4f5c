// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use evcharge_api::error::AppError;

async fn status_and_body(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_status_codes() {
    let cases = [
        (AppError::AuthRequired, StatusCode::UNAUTHORIZED, "auth_required"),
        (AppError::InvalidToken, StatusCode::UNAUTHORIZED, "invalid_token"),
        (
            AppError::Forbidden("no".to_string()),
            StatusCode::FORBIDDEN,
            "forbidden",
        ),
        (AppError::ScanRequired, StatusCode::FORBIDDEN, "scan_required"),
        (
            AppError::Conflict("dup".to_string()),
            StatusCode::CONFLICT,
            "conflict",
        ),
        (
            AppError::PaymentVerification("bad sig".to_string()),
            StatusCode::PAYMENT_REQUIRED,
            "payment_verification_failed",
        ),
        (
            AppError::CheckoutUnavailable("down".to_string()),
            StatusCode::BAD_GATEWAY,
            "checkout_unavailable",
        ),
        (
            AppError::DeviceStatusWrite("down".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
            "device_status_write_failed",
        ),
    ];

    for (err, status, code) in cases {
        let (actual_status, body) = status_and_body(err).await;
        assert_eq!(actual_status, status, "{code}");
        assert_eq!(body["error"], code);
    }
}

#[tokio::test]
async fn test_internal_details_not_leaked() {
    let (status, body) = status_and_body(AppError::Database("connection reset by peer".to_string())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.get("details").is_none());

    let (_, body) =
        status_and_body(AppError::PaymentVerification("expected abc got def".to_string())).await;
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_history_write_failure_describes_authorized_session() {
    let (status, body) = status_and_body(AppError::HistoryWrite {
        seconds: 1800,
        transaction_id: "pay_123".to_string(),
        reason: "deadline exceeded".to_string(),
    })
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "history_write_failed");
    let details = body["details"].as_str().unwrap();
    assert!(details.contains("1800 seconds"));
    assert!(details.contains("pay_123"));
    assert!(!details.contains("deadline"));
}
