// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Short-lived proof that a user scanned the charger's QR code.
//!
//! Format: `b64(user_id|expires_unix) . b64(HMAC-SHA256(payload))`, keyed
//! with a subkey derived from the session signing key.

use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// How long a scan stays good for checkout.
pub const SCAN_TICKET_TTL_SECS: u64 = 10 * 60;

const HKDF_SALT: &[u8] = b"evcharge-scan-ticket-salt";
const HKDF_INFO: &[u8] = b"evcharge-scan-ticket-v1";

/// Issues and checks scan tickets.
#[derive(Clone)]
pub struct ScanTicketSigner {
    key: [u8; 32],
}

impl std::fmt::Debug for ScanTicketSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ScanTicketSigner")
    }
}

impl ScanTicketSigner {
    /// Derive the ticket key from the session signing key.
    pub fn new(signing_key: &[u8]) -> Result<Self, AppError> {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), signing_key);
        let mut key = [0u8; 32];
        hk.expand(HKDF_INFO, &mut key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("ticket key derivation: {}", e)))?;
        Ok(Self { key })
    }

    /// Ticket for `user_id`, valid until `now + SCAN_TICKET_TTL_SECS`.
    pub fn issue(&self, user_id: &str, now: u64) -> Result<String, AppError> {
        let payload = format!("{}|{}", user_id, now.saturating_add(SCAN_TICKET_TTL_SECS));
        let signature = self.mac(payload.as_bytes())?.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Check `ticket` was issued to `user_id` and has not expired.
    pub fn verify(&self, ticket: &str, user_id: &str, now: u64) -> Result<(), AppError> {
        let (payload_b64, sig_b64) = ticket.split_once('.').ok_or(AppError::ScanRequired)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AppError::ScanRequired)?;
        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AppError::ScanRequired)?;

        if self.mac(&payload)?.verify_slice(&signature).is_err() {
            tracing::warn!(user_id, "Scan ticket signature mismatch");
            return Err(AppError::ScanRequired);
        }

        let payload = String::from_utf8(payload).map_err(|_| AppError::ScanRequired)?;
        let (ticket_user, expires) = payload.rsplit_once('|').ok_or(AppError::ScanRequired)?;
        let expires: u64 = expires.parse().map_err(|_| AppError::ScanRequired)?;

        if ticket_user != user_id {
            tracing::warn!(user_id, "Scan ticket issued to a different user");
            return Err(AppError::ScanRequired);
        }
        if now >= expires {
            return Err(AppError::ScanRequired);
        }

        Ok(())
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
        mac.update(payload);
        Ok(mac)
    }
}
