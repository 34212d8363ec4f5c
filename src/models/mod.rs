// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod device;
pub mod history;
pub mod plan;
pub mod user;

pub use device::DeviceStatus;
pub use history::HistoryEntry;
pub use plan::Plan;
pub use user::User;
