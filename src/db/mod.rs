//! Record store layer (Firestore or in-memory).
//!
//! [`RecordStore`] is the single entry point used by services and routes. It
//! dispatches to a backend and publishes a [`RecordChange`] on its change feed
//! after every successful write, which is what realtime subscribers (the
//! admin live view) listen to.

pub mod firestore;
pub mod memory;
pub mod path;

pub use firestore::FirestoreDb;
pub use memory::{MemoryStore, WriteTarget};
pub use path::RecordPath;

use crate::error::AppError;
use crate::models::{DeviceStatus, HistoryEntry, User};
use crate::time_utils::now_rfc3339;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// History entries (keyed by `{user_id}_{push_key}`)
    pub const HISTORY: &str = "history";
    pub const DEVICE: &str = "device";
    pub const DEVICE_STATUS_DOC: &str = "status";
}

const CHANGE_FEED_CAPACITY: usize = 64;

/// A write that landed in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    pub path: RecordPath,
}

/// Fields of a history entry before it has a key and timestamp.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub plan: String,
    pub amount: u64,
    pub seconds: u64,
    pub transaction_id: String,
}

#[derive(Clone)]
enum Backend {
    Firestore(FirestoreDb),
    Memory(Arc<MemoryStore>),
}

/// Path-addressed record store with a change feed.
#[derive(Clone)]
pub struct RecordStore {
    backend: Backend,
    changes: broadcast::Sender<RecordChange>,
}

impl RecordStore {
    /// Store backed by Firestore.
    pub fn firestore(db: FirestoreDb) -> Self {
        Self::with_backend(Backend::Firestore(db))
    }

    /// Fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::with_memory(Arc::new(MemoryStore::new()))
    }

    /// In-memory store sharing `store` with the caller (tests keep the handle
    /// to inject failures).
    pub fn with_memory(store: Arc<MemoryStore>) -> Self {
        Self::with_backend(Backend::Memory(store))
    }

    fn with_backend(backend: Backend) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { backend, changes }
    }

    /// Subscribe to writes made through this store.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordChange> {
        self.changes.subscribe()
    }

    fn publish(&self, path: RecordPath) {
        // No receivers is fine.
        let _ = self.changes.send(RecordChange { path });
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.get_user(user_id).await,
            Backend::Memory(mem) => Ok(mem.get_user(user_id)),
        }
    }

    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.upsert_user(user).await?,
            Backend::Memory(mem) => mem.upsert_user(user)?,
        }
        self.publish(RecordPath::User(user.id.clone()));
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.list_users().await,
            Backend::Memory(mem) => Ok(mem.list_users()),
        }
    }

    // ─── History ─────────────────────────────────────────────────

    /// Append a history entry under `users/{user_id}/history` with a fresh
    /// push key and the current timestamp.
    pub async fn append_history(
        &self,
        user_id: &str,
        new_entry: NewHistoryEntry,
    ) -> Result<HistoryEntry, AppError> {
        let entry = HistoryEntry {
            id: push_key()?,
            user_id: user_id.to_string(),
            plan: new_entry.plan,
            amount: new_entry.amount,
            seconds: new_entry.seconds,
            transaction_id: new_entry.transaction_id,
            date: now_rfc3339(),
        };

        match &self.backend {
            Backend::Firestore(db) => db.insert_history(&entry).await?,
            Backend::Memory(mem) => mem.insert_history(&entry)?,
        }

        self.publish(RecordPath::HistoryEntry {
            user_id: entry.user_id.clone(),
            key: entry.id.clone(),
        });
        Ok(entry)
    }

    /// A user's history entries, unordered.
    pub async fn get_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.get_history(user_id).await,
            Backend::Memory(mem) => Ok(mem.get_history(user_id)),
        }
    }

    pub async fn list_all_history(&self) -> Result<Vec<HistoryEntry>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.list_all_history().await,
            Backend::Memory(mem) => Ok(mem.list_all_history()),
        }
    }

    // ─── Device Status ───────────────────────────────────────────

    /// Overwrite `device/status` (last writer wins).
    pub async fn set_device_status(&self, seconds: u64) -> Result<DeviceStatus, AppError> {
        let status = DeviceStatus {
            seconds,
            updated_at: now_rfc3339(),
        };
        match &self.backend {
            Backend::Firestore(db) => db.set_device_status(&status).await?,
            Backend::Memory(mem) => mem.set_device_status(&status)?,
        }
        self.publish(RecordPath::DeviceStatus);
        Ok(status)
    }

    pub async fn get_device_status(&self) -> Result<Option<DeviceStatus>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.get_device_status().await,
            Backend::Memory(mem) => mem.get_device_status(),
        }
    }
}

/// Generate a time-ordered push key: 12 hex digits of milliseconds since the
/// epoch followed by 16 random hex digits.
pub fn push_key() -> Result<String, AppError> {
    let millis = chrono::Utc::now().timestamp_millis().max(0);
    let mut suffix = [0u8; 8];
    SystemRandom::new()
        .fill(&mut suffix)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;
    Ok(format!("{:012x}{}", millis, hex::encode(suffix)))
}
