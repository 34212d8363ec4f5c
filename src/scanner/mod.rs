// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! QR acquisition: camera → per-frame decode → match against the charger token.
//!
//! The loop moves through `Idle → Requesting → Scanning → {Success | Failure}`.
//! Hardware sits behind the [`Camera`], [`FrameClock`] and [`QrDecoder`]
//! traits so the state machine runs the same against a real device and
//! against scripted fakes.

pub mod acquisition;
pub mod camera;
pub mod decoder;

pub use acquisition::{AcquisitionLoop, ScanCanceller, ScanHandle};
pub use camera::{
    Camera, CameraError, FacingMode, FrameBuffer, FrameClock, IntervalClock, VideoStream,
};
pub use decoder::{QrDecoder, RqrrDecoder};

use serde::Serialize;
use std::fmt;

/// Acquisition state as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Requesting,
    Scanning,
    Success,
    Failure(ScanFailure),
}

impl ScanState {
    /// `Success` and `Failure` stay put until the caller retries.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Success | ScanState::Failure(_))
    }
}

/// Why an acquisition attempt ended without a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "kebab-case")]
pub enum ScanFailure {
    #[error("camera-unavailable")]
    CameraUnavailable,
    #[error("permission-denied")]
    PermissionDenied,
    #[error("no-match-timeout")]
    NoMatchTimeout,
    #[error("cancelled")]
    Cancelled,
}

impl From<CameraError> for ScanFailure {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::Unavailable => ScanFailure::CameraUnavailable,
            CameraError::PermissionDenied => ScanFailure::PermissionDenied,
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Idle => f.write_str("idle"),
            ScanState::Requesting => f.write_str("requesting"),
            ScanState::Scanning => f.write_str("scanning"),
            ScanState::Success => f.write_str("success"),
            ScanState::Failure(reason) => write!(f, "failure({reason})"),
        }
    }
}

/// Normalize a decoded payload for comparison: trim whitespace, lowercase.
pub fn normalize_payload(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Whether a decoded payload is the expected charger token.
///
/// `expected` is compared after the same normalization, so callers may pass
/// it in any case.
pub fn matches_token(payload: &str, expected: &str) -> bool {
    normalize_payload(payload) == normalize_payload(expected)
}
