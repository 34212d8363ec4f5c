// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checkout: order creation after a verified scan, and payment completion.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::plan::find_plan;
use crate::models::{HistoryEntry, Plan};
use crate::services::{amount_to_seconds, CheckoutOptions};
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/checkout/order", post(create_order))
        .route("/api/checkout/complete", post(complete_payment))
}

fn plan_by_id(plan_id: &str) -> Result<&'static Plan> {
    find_plan(plan_id).ok_or_else(|| AppError::BadRequest(format!("Unknown plan: {}", plan_id)))
}

// ─── Order ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    plan_id: String,
    scan_ticket: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateOrderResponse {
    pub options: CheckoutOptions,
    /// Charging time this plan will authorize.
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub seconds: u64,
}

/// Open an order for the selected plan. Requires a scan ticket.
async fn create_order(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_secs();
    state
        .scan_tickets
        .verify(&body.scan_ticket, &auth.user_id, now)?;

    let plan = plan_by_id(&body.plan_id)?;

    // Prefill from the registered profile when there is one.
    let (name, email) = match state.store.get_user(&auth.user_id).await? {
        Some(user) => (user.name, user.email),
        None => (auth.name.clone(), auth.email.clone()),
    };

    let order = state.checkout.create_order(plan, &auth.user_id).await?;
    let options = state.checkout.options(plan, &order, &name, &email);

    tracing::info!(
        user_id = %auth.user_id,
        order_id = %order.order_id,
        plan = plan.id,
        "Checkout order opened"
    );

    Ok(Json(CreateOrderResponse {
        options,
        seconds: amount_to_seconds(plan.price, plan.label),
    }))
}

// ─── Completion ──────────────────────────────────────────────

/// What the checkout widget hands back on success.
#[derive(Deserialize)]
pub struct CompletePaymentRequest {
    plan_id: String,
    order_id: String,
    payment_id: String,
    signature: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompletePaymentResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub seconds: u64,
    pub entry: HistoryEntry,
}

/// Verify the payment signature, then authorize the charger and record the
/// session.
async fn complete_payment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CompletePaymentRequest>,
) -> Result<Json<CompletePaymentResponse>> {
    let plan = plan_by_id(&body.plan_id)?;

    // A plan mismatch leaves the order open for a corrected retry.
    state.checkout.complete(
        &auth.user_id,
        plan.id,
        &body.order_id,
        &body.payment_id,
        &body.signature,
    )?;

    let recorded = state
        .recorder
        .record(Some(&auth.user_id), plan, &body.payment_id)
        .await?
        .ok_or(AppError::AuthRequired)?;

    Ok(Json(CompletePaymentResponse {
        seconds: recorded.seconds,
        entry: recorded.entry,
    }))
}
