// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Logical record paths.
//!
//! The record store is addressed hierarchically:
//!
//! - `users/{id}` - profile fields
//! - `users/{id}/history` - a user's history map
//! - `users/{id}/history/{key}` - a single history entry
//! - `device/status` - the shared authorized-duration cell

use std::fmt;

/// A record path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordPath {
    User(String),
    History(String),
    HistoryEntry { user_id: String, key: String },
    DeviceStatus,
}

impl RecordPath {
    /// The user this path belongs to, if any.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            RecordPath::User(id) | RecordPath::History(id) => Some(id),
            RecordPath::HistoryEntry { user_id, .. } => Some(user_id),
            RecordPath::DeviceStatus => None,
        }
    }

    /// Whether a change at `self` is visible to a subscriber of `prefix`.
    pub fn is_under(&self, prefix: &RecordPath) -> bool {
        match (prefix, self) {
            (RecordPath::DeviceStatus, RecordPath::DeviceStatus) => true,
            (RecordPath::User(a), _) => self.user_id() == Some(a.as_str()),
            (RecordPath::History(a), RecordPath::History(b))
            | (RecordPath::History(a), RecordPath::HistoryEntry { user_id: b, .. }) => a == b,
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordPath::User(id) => write!(f, "users/{id}"),
            RecordPath::History(id) => write!(f, "users/{id}/history"),
            RecordPath::HistoryEntry { user_id, key } => {
                write!(f, "users/{user_id}/history/{key}")
            }
            RecordPath::DeviceStatus => f.write_str("device/status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_paths() {
        assert_eq!(RecordPath::User("abc".to_string()).to_string(), "users/abc");
        assert_eq!(
            RecordPath::History("abc".to_string()).to_string(),
            "users/abc/history"
        );
        assert_eq!(
            RecordPath::HistoryEntry {
                user_id: "abc".to_string(),
                key: "k1".to_string()
            }
            .to_string(),
            "users/abc/history/k1"
        );
        assert_eq!(RecordPath::DeviceStatus.to_string(), "device/status");
    }

    #[test]
    fn subscription_prefixes() {
        let entry = RecordPath::HistoryEntry {
            user_id: "u1".to_string(),
            key: "k".to_string(),
        };
        assert!(entry.is_under(&RecordPath::User("u1".to_string())));
        assert!(entry.is_under(&RecordPath::History("u1".to_string())));
        assert!(!entry.is_under(&RecordPath::User("u2".to_string())));
        assert!(!entry.is_under(&RecordPath::DeviceStatus));
        assert!(RecordPath::DeviceStatus.is_under(&RecordPath::DeviceStatus));
    }
}
