// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for signed-in users, plus the public plan list and charger
//! status.

use crate::db::{RecordChange, RecordPath};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::plan::PLANS;
use crate::models::{HistoryEntry, User};
use crate::services::aggregation::{
    most_recent, payment_history, sort_history, total_spent, transaction_count, HistorySortField,
    PaymentRow, SortDirection, SortState,
};
use crate::services::amount_to_seconds;
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/me/history", get(get_my_history))
        .route("/api/me/stream", get(stream_me))
        .route("/api/register", post(register))
}

/// Routes that need no session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/plans", get(list_plans))
        .route("/api/scan/settings", get(scan_settings))
        .route("/api/device/status", get(device_status))
}

// ─── Plans ───────────────────────────────────────────────────

/// A plan as offered to the customer.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PlanResponse {
    pub id: String,
    pub label: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub price: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub seconds: u64,
}

async fn list_plans() -> Json<Vec<PlanResponse>> {
    Json(
        PLANS
            .iter()
            .map(|p| PlanResponse {
                id: p.id.to_string(),
                label: p.label.to_string(),
                price: p.price,
                seconds: amount_to_seconds(p.price, p.label),
            })
            .collect(),
    )
}

// ─── Scanner settings ────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ScanSettingsResponse {
    /// How long the client's acquisition loop waits for a matching code.
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub timeout_secs: u64,
}

async fn scan_settings(State(state): State<Arc<AppState>>) -> Json<ScanSettingsResponse> {
    Json(ScanSettingsResponse {
        timeout_secs: state.config.scan_timeout.as_secs(),
    })
}

// ─── Charger status ──────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeviceStatusResponse {
    /// Most recently authorized duration; 0 before the first payment.
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub seconds: u64,
    pub updated_at: Option<String>,
}

async fn device_status(State(state): State<Arc<AppState>>) -> Result<Json<DeviceStatusResponse>> {
    let status = state.store.get_device_status().await?;
    Ok(Json(match status {
        Some(s) => DeviceStatusResponse {
            seconds: s.seconds,
            updated_at: Some(s.updated_at),
        },
        None => DeviceStatusResponse {
            seconds: 0,
            updated_at: None,
        },
    }))
}

// ─── User Profile ────────────────────────────────────────────

/// Profile page payload.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub user: User,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_spent: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub transaction_count: usize,
    pub last_transaction: Option<HistoryEntry>,
    pub history: Vec<PaymentRow>,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    Ok(Json(load_me(&state, &auth.user_id).await?))
}

async fn load_me(state: &AppState, user_id: &str) -> Result<MeResponse> {
    let user = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} is not registered", user_id)))?;

    let history = state.store.get_history(user_id).await?;

    Ok(MeResponse {
        user,
        total_spent: total_spent(&history),
        transaction_count: transaction_count(&history),
        last_transaction: most_recent(&history).cloned(),
        history: payment_history(history),
    })
}

/// Profile as server-sent events: a `snapshot` on connect and after each
/// write under `users/{id}`.
async fn stream_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let changes = state.store.subscribe();
    let watched = RecordPath::User(auth.user_id);
    Sse::new(profile_stream(state, changes, watched)).keep_alive(KeepAlive::default())
}

fn profile_stream(
    state: Arc<AppState>,
    changes: broadcast::Receiver<RecordChange>,
    watched: RecordPath,
) -> impl Stream<Item = std::result::Result<Event, axum::Error>> {
    stream::unfold(
        (state, changes, watched, true),
        |(state, mut changes, watched, first)| async move {
            if !first {
                loop {
                    match changes.recv().await {
                        Ok(change) if change.path.is_under(&watched) => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(_)) => break,
                        Err(RecvError::Closed) => return None,
                    }
                }
            }

            let user_id = watched.user_id().unwrap_or_default();
            let event = match load_me(&state, user_id).await {
                Ok(me) => Event::default().event("snapshot").json_data(me),
                Err(e) => Ok(Event::default().event("error").data(e.to_string())),
            };

            Some((event, (state, changes, watched, false)))
        },
    )
}

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    sort: Option<HistorySortField>,
    #[serde(default)]
    dir: Option<SortDirection>,
}

/// History table with a caller-chosen sort; newest first by default.
async fn get_my_history(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PaymentRow>>> {
    let mut history = state.store.get_history(&auth.user_id).await?;

    let sort = match (query.sort, query.dir) {
        (None, None) => SortState::new(HistorySortField::Date, SortDirection::Desc),
        (field, dir) => SortState::new(field.unwrap_or_default(), dir.unwrap_or_default()),
    };
    sort_history(&mut history, sort);

    Ok(Json(history.into_iter().map(PaymentRow::from).collect()))
}

// ─── Registration ────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    name: String,
    #[validate(custom(function = "validate_phone"))]
    phone: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    address: String,
}

impl RegisterRequest {
    fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
        }
    }
}

/// Exactly ten ASCII digits.
fn validate_phone(phone: &str) -> std::result::Result<(), ValidationError> {
    if phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message("phone must be exactly 10 digits".into()))
    }
}

/// One-time profile creation after first sign-in.
async fn register(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let body = body.trimmed();
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if state.store.get_user(&auth.user_id).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "User {} is already registered",
            auth.user_id
        )));
    }

    let now = now_rfc3339();
    let user = User {
        id: auth.user_id.clone(),
        name: body.name,
        email: auth.email.clone(),
        phone: body.phone,
        address: body.address,
        created_at: now.clone(),
        last_login: now,
    };
    state.store.upsert_user(&user).await?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_validation() {
        assert!(validate_phone("9876543210").is_ok());
        assert!(validate_phone("987654321").is_err());
        assert!(validate_phone("98765432100").is_err());
        assert!(validate_phone("98765-4321").is_err());
        assert!(validate_phone("").is_err());
    }

    #[test]
    fn registration_trims_before_validating() {
        let req = RegisterRequest {
            name: "   ".to_string(),
            phone: " 9876543210 ".to_string(),
            address: String::new(),
        }
        .trimmed();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(!errors.field_errors().contains_key("phone"));
    }
}
