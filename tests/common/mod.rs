// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use evcharge_api::config::Config;
use evcharge_api::db::{FirestoreDb, MemoryStore, NewHistoryEntry, RecordStore};
use evcharge_api::middleware::auth::{create_jwt, AuthUser};
use evcharge_api::models::User;
use evcharge_api::routes::create_router;
use evcharge_api::services::GoogleIdTokenVerifier;
use evcharge_api::AppState;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Key id and secret the test identity verifier accepts.
#[allow(dead_code)]
pub const ID_TOKEN_KID: &str = "test-kid";
#[allow(dead_code)]
pub const ID_TOKEN_KEY: &[u8] = b"test-google-signing-key";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app over an in-memory store.
/// Returns the router, the shared state and the store handle (for injecting
/// write failures).
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryStore>) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>, Arc<MemoryStore>) {
    let mem = Arc::new(MemoryStore::new());
    let store = RecordStore::with_memory(mem.clone());
    let identity = GoogleIdTokenVerifier::with_static_key(
        &config,
        ID_TOKEN_KID,
        DecodingKey::from_secret(ID_TOKEN_KEY),
        Algorithm::HS256,
    )
    .expect("static verifier");

    let state = Arc::new(AppState::new(config, store, Arc::new(identity)).expect("app state"));
    (create_router(state.clone()), state, mem)
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Session JWT for `user_id`, signed with the test key.
#[allow(dead_code)]
pub fn session_token(state: &AppState, user_id: &str, email: &str) -> String {
    create_jwt(
        &AuthUser {
            user_id: user_id.to_string(),
            email: email.to_string(),
            name: "Test User".to_string(),
        },
        &state.config.jwt_signing_key,
    )
    .unwrap()
}

/// Google-style ID token accepted by the test verifier. `overrides` is merged
/// over the default claims.
#[allow(dead_code)]
pub fn id_token(state: &AppState, sub: &str, email: &str, overrides: Value) -> String {
    let now = now();
    let mut claims = json!({
        "iss": "https://accounts.google.com",
        "aud": state.config.google_client_id,
        "sub": sub,
        "email": email,
        "email_verified": true,
        "name": "Google Name",
        "iat": now,
        "exp": now + 3600,
    });
    if let (Some(claims), Some(overrides)) = (claims.as_object_mut(), overrides.as_object()) {
        for (k, v) in overrides {
            claims.insert(k.clone(), v.clone());
        }
    }

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(ID_TOKEN_KID.to_string());
    encode(&header, &claims, &EncodingKey::from_secret(ID_TOKEN_KEY)).unwrap()
}

/// GET with an optional bearer token.
#[allow(dead_code)]
pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// POST a JSON body with an optional bearer token.
#[allow(dead_code)]
pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Registered user with a fixed profile.
#[allow(dead_code)]
pub fn test_user(id: &str, name: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        phone: "9876543210".to_string(),
        address: "12 MG Road".to_string(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
        last_login: "2026-01-01T00:00:00Z".to_string(),
    }
}

/// Write a user and their payments straight to the store.
#[allow(dead_code)]
pub async fn seed_user(state: &AppState, user: &User, payments: &[(&str, u64, u64)]) {
    state.store.upsert_user(user).await.unwrap();
    for (i, (plan, amount, seconds)) in payments.iter().enumerate() {
        state
            .store
            .append_history(
                &user.id,
                NewHistoryEntry {
                    plan: plan.to_string(),
                    amount: *amount,
                    seconds: *seconds,
                    transaction_id: format!("pay_{}_{}", user.id, i),
                },
            )
            .await
            .unwrap();
        // Distinct millisecond timestamps keep "newest" well defined.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
}
