// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-sent event streams: admin live view and profile stream.

use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use futures_util::{Stream, StreamExt};
use std::time::Duration;
use tower::ServiceExt;

mod common;
use common::{create_test_app, get, seed_user, session_token, test_user};

type EventBytes = Result<Bytes, axum::Error>;

/// Read from an event stream until one complete event containing `needle`
/// has arrived.
async fn next_event_containing(
    body: &mut (impl Stream<Item = EventBytes> + Unpin),
    needle: &str,
) -> String {
    let mut buf = String::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let chunk = body.next().await.expect("stream ended").unwrap();
            buf.push_str(&String::from_utf8_lossy(&chunk));
            if buf.contains(needle) && buf.ends_with("\n\n") {
                return;
            }
        }
    })
    .await
    .expect("timed out waiting for event");
    buf
}

fn into_stream(body: Body) -> impl Stream<Item = EventBytes> + Unpin {
    body.into_data_stream()
}

#[tokio::test]
async fn test_admin_stream_snapshots_on_change() {
    let (app, state, _) = create_test_app();
    seed_user(&state, &test_user("u-asha", "Asha", "asha@example.com"), &[]).await;
    let token = session_token(&state, "admin-1", "admin@example.com");

    let response = app
        .oneshot(get("/api/admin/stream", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut events = into_stream(response.into_body());

    let first = next_event_containing(&mut events, "snapshot").await;
    assert!(first.contains("u-asha"));
    assert!(!first.contains("u-ben"));

    // A device write alone does not produce a snapshot; the user write does.
    state.store.set_device_status(5).await.unwrap();
    seed_user(&state, &test_user("u-ben", "Ben", "ben@example.com"), &[]).await;

    let second = next_event_containing(&mut events, "u-ben").await;
    assert!(second.contains("\"total_users\":2"));
}

#[tokio::test]
async fn test_admin_stream_requires_admin() {
    let (app, state, _) = create_test_app();
    let token = session_token(&state, "u1", "someone@example.com");

    let response = app
        .oneshot(get("/api/admin/stream", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_profile_stream_follows_own_history() {
    let (app, state, _) = create_test_app();
    seed_user(&state, &test_user("u1", "Asha", "asha@example.com"), &[]).await;
    seed_user(&state, &test_user("u2", "Ben", "ben@example.com"), &[]).await;
    let token = session_token(&state, "u1", "asha@example.com");

    let response = app
        .oneshot(get("/api/me/stream", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut events = into_stream(response.into_body());

    let first = next_event_containing(&mut events, "snapshot").await;
    assert!(first.contains("\"transaction_count\":0"));

    // Someone else's payment, then ours.
    let ben = test_user("u2", "Ben", "ben@example.com");
    seed_user(&state, &ben, &[("2 Hours", 400, 7200)]).await;
    let asha = test_user("u1", "Asha", "asha@example.com");
    seed_user(&state, &asha, &[("30 Minutes", 100, 1800)]).await;

    let next = next_event_containing(&mut events, "\"transaction_count\":1").await;
    assert!(next.contains("\"total_spent\":100"));
    assert!(!next.contains("2 Hours"));
}
