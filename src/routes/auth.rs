// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in and session routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, AuthUser, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", post(google_sign_in))
        .route("/auth/logout", post(logout))
}

#[derive(Deserialize)]
pub struct GoogleSignInRequest {
    id_token: String,
}

/// Session issued after sign-in.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub name: String,
    /// No profile yet: the client should show the registration form.
    pub needs_registration: bool,
    pub is_admin: bool,
}

/// Exchange a Google ID token for a session.
async fn google_sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<GoogleSignInRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let identity = state.identity.verify(&body.id_token).await?;

    let existing = state.store.get_user(&identity.subject).await?;
    let needs_registration = existing.is_none();

    // Keep the registered name if there is one.
    let name = match existing {
        Some(mut user) => {
            user.last_login = now_rfc3339();
            state.store.upsert_user(&user).await?;
            user.name
        }
        None => identity.name.clone(),
    };

    let session = AuthUser {
        user_id: identity.subject,
        email: identity.email,
        name,
    };
    let token = create_jwt(&session, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(
        user_id = %session.user_id,
        needs_registration,
        "User signed in"
    );

    let cookie = session_cookie(token.clone(), state.config.secure_cookies());
    let is_admin = state.config.is_admin_email(&session.email);

    Ok((
        jar.add(cookie),
        Json(SessionResponse {
            token,
            user_id: session.user_id,
            email: session.email,
            name: session.name,
            needs_registration,
            is_admin,
        }),
    ))
}

/// Clear the session cookie.
async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build()
}
