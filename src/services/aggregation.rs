// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Derived views over users and their payment history.
//!
//! Everything here is a pure function of a snapshot: the admin list and the
//! profile page recompute from scratch whenever the record store changes.

use crate::models::{HistoryEntry, User};
use crate::time_utils::{format_display_date, parse_rfc3339};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

// ─── Folds ───────────────────────────────────────────────────────

/// Sum of amounts (saturating).
pub fn total_spent(entries: &[HistoryEntry]) -> u64 {
    entries
        .iter()
        .fold(0u64, |acc, e| acc.saturating_add(e.amount))
}

pub fn transaction_count(entries: &[HistoryEntry]) -> usize {
    entries.len()
}

/// Entry with the greatest parsed date.
///
/// Ties go to the entry encountered first. An unparseable date never beats a
/// parseable one; if nothing parses, the first entry is returned.
pub fn most_recent(entries: &[HistoryEntry]) -> Option<&HistoryEntry> {
    let mut best: Option<(&HistoryEntry, Option<DateTime<Utc>>)> = None;

    for entry in entries {
        let ts = parse_rfc3339(&entry.date);
        best = match best {
            None => Some((entry, ts)),
            Some((_, best_ts)) if ts > best_ts => Some((entry, ts)),
            keep => keep,
        };
    }

    best.map(|(entry, _)| entry)
}

// ─── Sorting ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

/// Sortable columns of the admin user table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSortField {
    #[default]
    Name,
    Email,
    TransactionCount,
    TotalSpent,
    LastTransaction,
}

/// Sortable columns of a payment history table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySortField {
    #[default]
    Date,
    Amount,
    Seconds,
    Plan,
}

/// Current sort column and direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortState<F> {
    pub field: F,
    pub direction: SortDirection,
}

impl<F: Copy + PartialEq> SortState<F> {
    pub fn new(field: F, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Column header click: the same field flips direction, a different field
    /// starts ascending.
    pub fn select(&mut self, field: F) {
        if field == self.field {
            self.direction = self.direction.flipped();
        } else {
            self.field = field;
            self.direction = SortDirection::Asc;
        }
    }
}

// ─── Admin user table ────────────────────────────────────────────

/// One row of the admin user table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AdminUserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub created_at: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_spent: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub transaction_count: usize,
    pub last_transaction: Option<HistoryEntry>,
}

impl AdminUserRow {
    pub fn new(user: User, history: &[HistoryEntry]) -> Self {
        Self {
            total_spent: total_spent(history),
            transaction_count: transaction_count(history),
            last_transaction: most_recent(history).cloned(),
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            address: user.address,
            created_at: user.created_at,
        }
    }

    /// Millis of the last transaction, 0 when there is none (or it won't parse).
    fn last_transaction_millis(&self) -> i64 {
        self.last_transaction
            .as_ref()
            .and_then(|e| parse_rfc3339(&e.date))
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Join users with their history into admin rows (users keep their order).
pub fn project_users(users: Vec<User>, history: Vec<HistoryEntry>) -> Vec<AdminUserRow> {
    let mut by_user: HashMap<String, Vec<HistoryEntry>> = HashMap::new();
    for entry in history {
        by_user.entry(entry.user_id.clone()).or_default().push(entry);
    }

    users
        .into_iter()
        .map(|user| {
            let entries = by_user.remove(&user.id).unwrap_or_default();
            AdminUserRow::new(user, &entries)
        })
        .collect()
}

/// Whether `row` matches a search query: case-insensitive substring of name
/// or email, or raw substring of phone.
pub fn matches_query(row: &AdminUserRow, query: &str) -> bool {
    let needle = query.to_lowercase();
    row.name.to_lowercase().contains(&needle)
        || row.email.to_lowercase().contains(&needle)
        || row.phone.contains(query)
}

pub fn filter_rows(rows: Vec<AdminUserRow>, query: &str) -> Vec<AdminUserRow> {
    rows.into_iter().filter(|r| matches_query(r, query)).collect()
}

/// Stable sort; equal keys keep their relative order in both directions.
pub fn sort_rows(rows: &mut [AdminUserRow], sort: SortState<UserSortField>) {
    rows.sort_by(|a, b| {
        let ord = match sort.field {
            UserSortField::Name => a.name.cmp(&b.name),
            UserSortField::Email => a.email.cmp(&b.email),
            UserSortField::TransactionCount => a.transaction_count.cmp(&b.transaction_count),
            UserSortField::TotalSpent => a.total_spent.cmp(&b.total_spent),
            UserSortField::LastTransaction => a
                .last_transaction_millis()
                .cmp(&b.last_transaction_millis()),
        };
        sort.direction.apply(ord)
    });
}

/// Header figures of the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardTotals {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_users: usize,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_payments: u64,
}

/// Totals over all rows (computed before any filtering).
pub fn dashboard_totals(rows: &[AdminUserRow]) -> DashboardTotals {
    DashboardTotals {
        total_users: rows.len(),
        total_payments: rows
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.total_spent)),
    }
}

// ─── Payment history ─────────────────────────────────────────────

/// History entry as shown in a payments table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PaymentRow {
    pub id: String,
    pub date: String,
    pub formatted_date: String,
    pub plan: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub seconds: u64,
    pub transaction_id: String,
}

impl From<HistoryEntry> for PaymentRow {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            formatted_date: format_display_date(&entry.date),
            id: entry.id,
            date: entry.date,
            plan: entry.plan,
            amount: entry.amount,
            seconds: entry.seconds,
            transaction_id: entry.transaction_id,
        }
    }
}

/// Stable sort of history entries.
///
/// By date, unparseable dates order before every parseable one.
pub fn sort_history(entries: &mut [HistoryEntry], sort: SortState<HistorySortField>) {
    entries.sort_by(|a, b| {
        let ord = match sort.field {
            HistorySortField::Date => parse_rfc3339(&a.date).cmp(&parse_rfc3339(&b.date)),
            HistorySortField::Amount => a.amount.cmp(&b.amount),
            HistorySortField::Seconds => a.seconds.cmp(&b.seconds),
            HistorySortField::Plan => a.plan.cmp(&b.plan),
        };
        sort.direction.apply(ord)
    });
}

/// Payments table for one user: newest first.
pub fn payment_history(mut entries: Vec<HistoryEntry>) -> Vec<PaymentRow> {
    sort_history(
        &mut entries,
        SortState::new(HistorySortField::Date, SortDirection::Desc),
    );
    entries.into_iter().map(PaymentRow::from).collect()
}
