// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Maps the logical record paths onto collections:
//! - `users/{id}` → `users/{id}`
//! - `users/{id}/history/{key}` → `history/{id}_{key}` (queried by `user_id`)
//! - `device/status` → `device/status`

use crate::db::collections;
use crate::error::AppError;
use crate::models::{DeviceStatus, HistoryEntry, User};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// All user profiles.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── History Operations ──────────────────────────────────────

    /// Write a history entry under its push key.
    pub async fn insert_history(&self, entry: &HistoryEntry) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::HISTORY)
            .document_id(history_doc_id(&entry.user_id, &entry.id))
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// All history entries for one user (unordered).
    pub async fn get_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::HISTORY)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every history entry across all users (unordered).
    pub async fn list_all_history(&self) -> Result<Vec<HistoryEntry>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::HISTORY)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Device Status ───────────────────────────────────────────

    /// Overwrite the shared device status cell.
    pub async fn set_device_status(&self, status: &DeviceStatus) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::DEVICE)
            .document_id(collections::DEVICE_STATUS_DOC)
            .object(status)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Read the shared device status cell.
    pub async fn get_device_status(&self) -> Result<Option<DeviceStatus>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::DEVICE)
            .obj()
            .one(collections::DEVICE_STATUS_DOC)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Document ID for a history entry: the URL-encoded user id, `_`, then the
/// push key. Push keys are hex, so the last `_` always ends the user id.
fn history_doc_id(user_id: &str, key: &str) -> String {
    format!("{}_{}", urlencoding::encode(user_id), key)
}
