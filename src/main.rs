// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! EV charging payment API server
//!
//! Signs customers in with Google, verifies the charger QR scan, takes
//! payment for a plan and authorizes the charger for the purchased time.

use evcharge_api::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, RecordStore},
    services::GoogleIdTokenVerifier,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting EV charging API");

    let store = match config.store_backend {
        StoreBackend::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            RecordStore::firestore(db)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory record store; data is lost on restart");
            RecordStore::in_memory()
        }
    };

    let identity = Arc::new(GoogleIdTokenVerifier::new(&config)?);
    tracing::info!(
        admins = config.admin_emails.len(),
        checkout_remote = config.checkout_api_url.is_some(),
        "Services initialized"
    );

    // Build shared state
    let port = config.port;
    let state = Arc::new(AppState::new(config, store, identity)?);

    // Build router
    let app = evcharge_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("evcharge_api=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
