// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process record store.
//!
//! Backs local development (`RECORD_STORE=memory`) and the test suite. Write
//! failures can be injected per target so the recorder's partial-failure
//! paths are reachable without a real outage.

use crate::error::AppError;
use crate::models::{DeviceStatus, HistoryEntry, User};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Write targets that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    Users,
    History,
    DeviceStatus,
}

/// Thread-safe in-memory storage.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    /// user id → push key → entry. BTreeMap keeps push keys in time order.
    history: DashMap<String, BTreeMap<String, HistoryEntry>>,
    device_status: RwLock<Option<DeviceStatus>>,
    fail_users: AtomicBool,
    fail_history: AtomicBool,
    fail_device_status: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write to `target` fail (or succeed again).
    pub fn set_write_failure(&self, target: WriteTarget, fail: bool) {
        self.flag(target).store(fail, Ordering::SeqCst);
    }

    fn flag(&self, target: WriteTarget) -> &AtomicBool {
        match target {
            WriteTarget::Users => &self.fail_users,
            WriteTarget::History => &self.fail_history,
            WriteTarget::DeviceStatus => &self.fail_device_status,
        }
    }

    fn check_write(&self, target: WriteTarget) -> Result<(), AppError> {
        if self.flag(target).load(Ordering::SeqCst) {
            return Err(AppError::Database(format!(
                "injected write failure ({:?})",
                target
            )));
        }
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).map(|u| u.value().clone())
    }

    pub fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.check_write(WriteTarget::Users)?;
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    /// Users ordered by id so snapshots are deterministic.
    pub fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    pub fn insert_history(&self, entry: &HistoryEntry) -> Result<(), AppError> {
        self.check_write(WriteTarget::History)?;
        self.history
            .entry(entry.user_id.clone())
            .or_default()
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    pub fn get_history(&self, user_id: &str) -> Vec<HistoryEntry> {
        self.history
            .get(user_id)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_all_history(&self) -> Vec<HistoryEntry> {
        self.history
            .iter()
            .flat_map(|entries| entries.value().values().cloned().collect::<Vec<_>>())
            .collect()
    }

    pub fn set_device_status(&self, status: &DeviceStatus) -> Result<(), AppError> {
        self.check_write(WriteTarget::DeviceStatus)?;
        let mut cell = self
            .device_status
            .write()
            .map_err(|_| AppError::Database("device status lock poisoned".to_string()))?;
        *cell = Some(status.clone());
        Ok(())
    }

    pub fn get_device_status(&self) -> Result<Option<DeviceStatus>, AppError> {
        self.device_status
            .read()
            .map(|cell| cell.clone())
            .map_err(|_| AppError::Database("device status lock poisoned".to_string()))
    }
}
