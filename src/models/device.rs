//! Shared charger authorization cell.

use serde::{Deserialize, Serialize};

/// The most recently authorized charging duration, stored at `device/status`.
///
/// There is exactly one of these; every successful payment overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Authorized duration in seconds
    pub seconds: u64,
    /// When the value was written (ISO 8601)
    #[serde(default)]
    pub updated_at: String,
}
