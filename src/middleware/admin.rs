// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin allow-list gate. Runs after [`require_auth`](super::require_auth).

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Reject sessions whose email is not on the admin allow-list.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AppError::AuthRequired)?;

    if !state.config.is_admin_email(&user.email) {
        tracing::warn!(user_id = %user.user_id, email = %user.email, "Admin access denied");
        return Err(AppError::Forbidden("admin access required".to_string()));
    }

    Ok(next.run(request).await)
}
