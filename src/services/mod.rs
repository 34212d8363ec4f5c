// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod aggregation;
pub mod checkout;
pub mod google_oidc;
pub mod pricing;
pub mod recorder;
pub mod scan_ticket;

pub use checkout::{CheckoutOptions, CheckoutService};
pub use google_oidc::{GoogleIdTokenVerifier, OidcError, VerifiedIdentity};
pub use pricing::amount_to_seconds;
pub use recorder::{RecordedSession, SessionRecorder};
pub use scan_ticket::ScanTicketSigner;
