// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Writes a charging session after a verified payment.
//!
//! Two independent writes, in order:
//! 1. overwrite `device/status` with the authorized seconds
//! 2. append a history entry under the paying user
//!
//! They are not atomic. Each failure point maps to its own error so the
//! caller can tell "charger not authorized" apart from "charger authorized,
//! ledger entry missing".

use crate::db::{NewHistoryEntry, RecordStore};
use crate::error::AppError;
use crate::models::{DeviceStatus, HistoryEntry, Plan};
use crate::services::pricing::amount_to_seconds;

/// Result of a fully recorded session.
#[derive(Debug, Clone)]
pub struct RecordedSession {
    pub seconds: u64,
    pub device_status: DeviceStatus,
    pub entry: HistoryEntry,
}

#[derive(Clone)]
pub struct SessionRecorder {
    store: RecordStore,
}

impl SessionRecorder {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Record a paid session for `user_id`.
    ///
    /// Returns `Ok(None)` without touching the store when there is no user.
    pub async fn record(
        &self,
        user_id: Option<&str>,
        plan: &Plan,
        transaction_id: &str,
    ) -> Result<Option<RecordedSession>, AppError> {
        let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
            tracing::warn!(
                transaction_id = %transaction_id,
                "No authenticated user, skipping session record"
            );
            return Ok(None);
        };

        let seconds = amount_to_seconds(plan.price, plan.label);

        let device_status = self
            .store
            .set_device_status(seconds)
            .await
            .map_err(|e| AppError::DeviceStatusWrite(e.to_string()))?;

        tracing::info!(user_id, seconds, "Charger authorized");

        let entry = self
            .store
            .append_history(
                user_id,
                NewHistoryEntry {
                    plan: plan.label.to_string(),
                    amount: plan.price,
                    seconds,
                    transaction_id: transaction_id.to_string(),
                },
            )
            .await
            .map_err(|e| AppError::HistoryWrite {
                seconds,
                transaction_id: transaction_id.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            user_id,
            key = %entry.id,
            transaction_id = %transaction_id,
            amount = plan.price,
            "Session recorded"
        );

        Ok(Some(RecordedSession {
            seconds,
            device_status,
            entry,
        }))
    }
}
