// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Charger QR verification.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::scanner::matches_token;
use crate::services::scan_ticket::SCAN_TICKET_TTL_SECS;
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/scan", post(verify_scan))
}

#[derive(Deserialize)]
pub struct ScanRequest {
    /// Raw decoded QR payload
    payload: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ScanResponse {
    pub scan_ticket: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub expires_in: u64,
}

/// Check a decoded payload and hand out a ticket that unlocks checkout.
async fn verify_scan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<ScanRequest>,
) -> Result<Json<ScanResponse>> {
    if !matches_token(&body.payload, &state.config.qr_expected_token) {
        tracing::info!(user_id = %auth.user_id, "Scanned QR code is not a charger code");
        return Err(AppError::BadRequest(
            "QR code does not belong to this charger".to_string(),
        ));
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_secs();
    let scan_ticket = state.scan_tickets.issue(&auth.user_id, now)?;

    tracing::info!(user_id = %auth.user_id, "Charger QR verified");
    Ok(Json(ScanResponse {
        scan_ticket,
        expires_in: SCAN_TICKET_TTL_SECS,
    }))
}
