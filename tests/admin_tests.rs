// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin dashboard: totals, search, sorting and per-user detail.

use axum::http::StatusCode;
use axum::Router;
use evcharge_api::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

mod common;
use common::{body_json, create_test_app, get, seed_user, session_token, test_user};

/// Three customers:
/// - Asha: two payments, 300 total
/// - Ben: one payment, 400 total
/// - Chitra: registered, never paid
async fn seeded_app() -> (Router, Arc<AppState>, String) {
    let (app, state, _) = create_test_app();
    seed_user(
        &state,
        &test_user("u-asha", "Asha", "asha@example.com"),
        &[("30 Minutes", 100, 1800), ("65 Minutes", 200, 3900)],
    )
    .await;
    seed_user(
        &state,
        &test_user("u-ben", "Ben", "ben@charge.in"),
        &[("2 Hours", 400, 7200)],
    )
    .await;
    seed_user(&state, &test_user("u-chitra", "Chitra", "chitra@example.com"), &[]).await;

    let token = session_token(&state, "admin-1", "admin@example.com");
    (app, state, token)
}

fn ids(users: &Value) -> Vec<&str> {
    users
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_stats_cover_everyone() {
    let (app, _, token) = seeded_app().await;

    let response = app.oneshot(get("/api/admin/stats", Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_users"], 3);
    assert_eq!(body["total_payments"], 700);
}

#[tokio::test]
async fn test_user_rows_carry_derived_figures() {
    let (app, _, token) = seeded_app().await;

    let response = app.oneshot(get("/api/admin/users", Some(&token))).await.unwrap();

    let body = body_json(response).await;
    assert_eq!(ids(&body["users"]), vec!["u-asha", "u-ben", "u-chitra"]);

    let asha = &body["users"][0];
    assert_eq!(asha["total_spent"], 300);
    assert_eq!(asha["transaction_count"], 2);
    assert_eq!(asha["last_transaction"]["plan"], "65 Minutes");

    let chitra = &body["users"][2];
    assert_eq!(chitra["total_spent"], 0);
    assert_eq!(chitra["transaction_count"], 0);
    assert!(chitra["last_transaction"].is_null());
}

#[tokio::test]
async fn test_search_filters_rows_but_not_totals() {
    let (app, _, token) = seeded_app().await;

    let response = app
        .clone()
        .oneshot(get("/api/admin/users?q=CHARGE.IN", Some(&token)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(ids(&body["users"]), vec!["u-ben"]);
    assert_eq!(body["totals"]["total_users"], 3);
    assert_eq!(body["totals"]["total_payments"], 700);

    let response = app
        .oneshot(get("/api/admin/users?q=nobody", Some(&token)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert!(body["users"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_sort_by_total_spent() {
    let (app, _, token) = seeded_app().await;

    let response = app
        .clone()
        .oneshot(get("/api/admin/users?sort=total_spent&dir=desc", Some(&token)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(ids(&body["users"]), vec!["u-ben", "u-asha", "u-chitra"]);

    let response = app
        .oneshot(get(
            "/api/admin/users?sort=transaction_count&dir=asc",
            Some(&token),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(ids(&body["users"]), vec!["u-chitra", "u-ben", "u-asha"]);
}

#[tokio::test]
async fn test_bad_sort_field_rejected() {
    let (app, _, token) = seeded_app().await;

    let response = app
        .oneshot(get("/api/admin/users?sort=phone", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_detail() {
    let (app, _, token) = seeded_app().await;

    let response = app
        .oneshot(get("/api/admin/users/u-asha", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["name"], "Asha");
    assert_eq!(body["user"]["total_spent"], 300);

    let payments = body["payments"].as_array().unwrap();
    assert_eq!(payments.len(), 2);
    // Newest first
    assert_eq!(payments[0]["plan"], "65 Minutes");
    assert_eq!(payments[1]["plan"], "30 Minutes");
    assert!(payments[0]["formatted_date"].is_string());
}

#[tokio::test]
async fn test_user_detail_not_found() {
    let (app, _, token) = seeded_app().await;

    let response = app
        .oneshot(get("/api/admin/users/u-nobody", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_history_sort_options() {
    let (app, state, _) = seeded_app().await;
    let token = session_token(&state, "u-asha", "asha@example.com");

    let response = app
        .clone()
        .oneshot(get("/api/me/history?sort=amount&dir=asc", Some(&token)))
        .await
        .unwrap();
    let body = body_json(response).await;
    let amounts: Vec<u64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["amount"].as_u64().unwrap())
        .collect();
    assert_eq!(amounts, vec![100, 200]);

    let response = app
        .oneshot(get("/api/me/history", Some(&token)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body[0]["amount"], 200);
}
