// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment history entries.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One completed payment / charging session, stored under
/// `users/{user_id}/history/{id}`.
///
/// Entries are append-only: written once after a verified payment and never
/// updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HistoryEntry {
    /// Push key (time-ordered)
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Plan label, e.g. "30 Minutes"
    pub plan: String,
    /// Amount paid in whole currency units
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount: u64,
    /// Authorized duration
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub seconds: u64,
    /// Provider payment id
    pub transaction_id: String,
    /// When the payment was recorded (ISO 8601)
    pub date: String,
}
