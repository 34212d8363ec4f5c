// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! EV charging payments: scan a charger's QR code, pay for a plan, authorize
//! the charger.
//!
//! This crate provides the backend API (Google sign-in, checkout orders,
//! payment verification, session recording, admin views) and the QR
//! acquisition state machine used by scanning clients.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod scanner;
pub mod services;
pub mod time_utils;

use config::Config;
use db::RecordStore;
use error::AppError;
use services::{CheckoutService, GoogleIdTokenVerifier, ScanTicketSigner, SessionRecorder};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: RecordStore,
    pub identity: Arc<GoogleIdTokenVerifier>,
    pub checkout: CheckoutService,
    pub recorder: SessionRecorder,
    pub scan_tickets: ScanTicketSigner,
}

impl AppState {
    /// Wire services around a store and identity verifier.
    pub fn new(
        config: Config,
        store: RecordStore,
        identity: Arc<GoogleIdTokenVerifier>,
    ) -> Result<Self, AppError> {
        let checkout = CheckoutService::new(&config)?;
        let recorder = SessionRecorder::new(store.clone());
        let scan_tickets = ScanTicketSigner::new(&config.jwt_signing_key)?;

        Ok(Self {
            config,
            store,
            identity,
            checkout,
            recorder,
            scan_tickets,
        })
    }
}
