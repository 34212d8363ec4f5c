//! User model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User profile stored at `users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    /// Identity provider subject (also used as document ID)
    pub id: String,
    /// Display name from the registration form
    pub name: String,
    /// Email from the identity provider
    pub email: String,
    /// Ten-digit phone number
    pub phone: String,
    /// Postal address
    #[serde(default)]
    pub address: String,
    /// When the user registered (ISO 8601)
    pub created_at: String,
    /// Last sign-in timestamp (ISO 8601)
    #[serde(default)]
    pub last_login: String,
}
