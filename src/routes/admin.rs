// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin dashboard API. Gated by the allow-list in routes/mod.rs.

use crate::db::RecordChange;
use crate::error::{AppError, Result};
use crate::services::aggregation::{
    dashboard_totals, filter_rows, payment_history, project_users, sort_rows, AdminUserRow,
    DashboardTotals, PaymentRow, SortDirection, SortState, UserSortField,
};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{id}", get(get_user))
        .route("/api/admin/stats", get(get_stats))
        .route("/api/admin/stream", get(stream_snapshots))
}

/// Admin list view.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AdminUsersResponse {
    pub totals: DashboardTotals,
    pub users: Vec<AdminUserRow>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminUsersQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    sort: UserSortField,
    #[serde(default)]
    dir: SortDirection,
}

/// Snapshot of every user with derived figures, in store order.
async fn load_rows(state: &AppState) -> Result<Vec<AdminUserRow>> {
    let users = state.store.list_users().await?;
    let history = state.store.list_all_history().await?;
    Ok(project_users(users, history))
}

/// Totals over everything; rows filtered then sorted.
fn build_view(rows: Vec<AdminUserRow>, query: &AdminUsersQuery) -> AdminUsersResponse {
    let totals = dashboard_totals(&rows);
    let mut users = filter_rows(rows, query.q.trim());
    sort_rows(&mut users, SortState::new(query.sort, query.dir));
    AdminUsersResponse { totals, users }
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminUsersQuery>,
) -> Result<Json<AdminUsersResponse>> {
    let rows = load_rows(&state).await?;
    Ok(Json(build_view(rows, &query)))
}

/// One user with their payments, newest first.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AdminUserDetail {
    pub user: AdminUserRow,
    pub payments: Vec<PaymentRow>,
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AdminUserDetail>> {
    let user = state
        .store
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
    let history = state.store.get_history(&id).await?;

    Ok(Json(AdminUserDetail {
        user: AdminUserRow::new(user, &history),
        payments: payment_history(history),
    }))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<DashboardTotals>> {
    let rows = load_rows(&state).await?;
    Ok(Json(dashboard_totals(&rows)))
}

// ─── Live view ───────────────────────────────────────────────

/// Server-sent events: a full `snapshot` on connect and after every user or
/// history write. Query parameters shape each snapshot like `/api/admin/users`.
async fn stream_snapshots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminUsersQuery>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let changes = state.store.subscribe();
    tracing::debug!("Admin live view connected");
    Sse::new(snapshot_stream(state, changes, query)).keep_alive(KeepAlive::default())
}

fn snapshot_stream(
    state: Arc<AppState>,
    changes: broadcast::Receiver<RecordChange>,
    query: AdminUsersQuery,
) -> impl Stream<Item = std::result::Result<Event, axum::Error>> {
    stream::unfold(
        (state, changes, query, true),
        |(state, mut changes, query, first)| async move {
            if !first {
                loop {
                    match changes.recv().await {
                        Ok(change) if affects_admin_view(&change) => break,
                        Ok(_) => continue,
                        // Missed some; a fresh snapshot covers them.
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "Admin live view lagged");
                            break;
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }

            let event = match load_rows(&state).await {
                Ok(rows) => Event::default()
                    .event("snapshot")
                    .json_data(build_view(rows, &query)),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to build admin snapshot");
                    Ok(Event::default().event("error").data(e.to_string()))
                }
            };

            Some((event, (state, changes, query, false)))
        },
    )
}

fn affects_admin_view(change: &RecordChange) -> bool {
    change.path.user_id().is_some()
}
