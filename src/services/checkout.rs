// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hosted checkout provider: order creation and payment signature checks.
//!
//! The browser widget is opened with the options built here. When the
//! customer pays, the widget hands back `(order_id, payment_id, signature)`
//! and the signature must check out before anything is recorded.

use crate::config::Config;
use crate::error::AppError;
use crate::models::Plan;
use crate::services::scan_ticket::SCAN_TICKET_TTL_SECS;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::time::Instant;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

type HmacSha256 = Hmac<Sha256>;

const ORDER_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const STATION_ADDRESS: &str = "Bolt.Earth Charging Station";
const THEME_COLOR: &str = "#00c853";
/// Open orders expire along with the scan ticket that unlocked them.
const ORDER_TTL: Duration = Duration::from_secs(SCAN_TICKET_TTL_SECS);

/// An order the widget can be opened against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOrder {
    pub order_id: String,
    /// Minor currency units
    pub amount: u64,
    pub currency: String,
}

/// Options passed straight to the checkout widget.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckoutOptions {
    pub key: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount: u64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    pub prefill: CheckoutPrefill,
    pub notes: CheckoutNotes,
    pub theme: CheckoutTheme,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct CheckoutPrefill {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct CheckoutNotes {
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct CheckoutTheme {
    pub color: String,
}

/// Who an open order belongs to and what it pays for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOrder {
    pub user_id: String,
    pub plan_id: &'static str,
    pub opened_at: Instant,
}

impl PendingOrder {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.opened_at) >= ORDER_TTL
    }
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: u64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    id: String,
}

/// Client for the checkout provider.
#[derive(Clone)]
pub struct CheckoutService {
    http: reqwest::Client,
    /// `None` mints order ids locally instead of calling the provider.
    api_url: Option<String>,
    key_id: String,
    key_secret: String,
    currency: String,
    merchant_name: String,
    /// Orders created here and not yet completed, by order id.
    pending: Arc<DashMap<String, PendingOrder>>,
}

impl CheckoutService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(ORDER_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("checkout HTTP client: {}", e)))?;

        if config.checkout_api_url.is_none() {
            tracing::warn!("CHECKOUT_API_URL not set, minting local order ids");
        }

        Ok(Self {
            http,
            api_url: config.checkout_api_url.clone(),
            key_id: config.checkout_key_id.clone(),
            key_secret: config.checkout_key_secret.clone(),
            currency: config.checkout_currency.clone(),
            merchant_name: config.merchant_name.clone(),
            pending: Arc::new(DashMap::new()),
        })
    }

    /// Create an order for `plan` on behalf of `user_id`.
    ///
    /// The order is remembered until [`complete`](Self::complete) consumes it
    /// or it expires. Expired orders are swept on every insert.
    pub async fn create_order(&self, plan: &Plan, user_id: &str) -> Result<CheckoutOrder, AppError> {
        let order = match &self.api_url {
            Some(api_url) => self.create_remote_order(api_url, plan, user_id).await?,
            None => CheckoutOrder {
                order_id: local_order_id()?,
                amount: plan.amount_minor(),
                currency: self.currency.clone(),
            },
        };

        let now = Instant::now();
        self.evict_expired(now);
        self.pending.insert(
            order.order_id.clone(),
            PendingOrder {
                user_id: user_id.to_string(),
                plan_id: plan.id,
                opened_at: now,
            },
        );
        Ok(order)
    }

    fn evict_expired(&self, now: Instant) {
        let before = self.pending.len();
        self.pending.retain(|_, order| !order.is_expired(now));
        let evicted = before.saturating_sub(self.pending.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Expired checkout orders dropped");
        }
    }

    async fn create_remote_order(
        &self,
        api_url: &str,
        plan: &Plan,
        receipt: &str,
    ) -> Result<CheckoutOrder, AppError> {
        let amount = plan.amount_minor();

        let response = self
            .http
            .post(format!("{}/orders", api_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderRequest {
                amount,
                currency: &self.currency,
                receipt,
            })
            .send()
            .await
            .map_err(|e| AppError::CheckoutUnavailable(format!("order request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Checkout order creation failed");
            return Err(AppError::CheckoutUnavailable(format!(
                "order request returned {}",
                status
            )));
        }

        let created: CreateOrderResponse = response.json().await.map_err(|e| {
            AppError::CheckoutUnavailable(format!("failed to parse order response: {}", e))
        })?;

        tracing::info!(order_id = %created.id, amount, plan = plan.id, "Checkout order created");

        Ok(CheckoutOrder {
            order_id: created.id,
            amount,
            currency: self.currency.clone(),
        })
    }

    /// Widget options for an order.
    pub fn options(
        &self,
        plan: &Plan,
        order: &CheckoutOrder,
        name: &str,
        email: &str,
    ) -> CheckoutOptions {
        CheckoutOptions {
            key: self.key_id.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            name: self.merchant_name.clone(),
            description: format!("{} Charging Payment", plan.label),
            order_id: order.order_id.clone(),
            prefill: CheckoutPrefill {
                name: name.to_string(),
                email: email.to_string(),
            },
            notes: CheckoutNotes {
                address: STATION_ADDRESS.to_string(),
            },
            theme: CheckoutTheme {
                color: THEME_COLOR.to_string(),
            },
        }
    }

    /// Check the widget's completion signature, then consume the pending
    /// order. Fails without consuming anything if the order is unknown,
    /// expired, already completed, belongs to another user or was opened for
    /// a different plan.
    pub fn complete(
        &self,
        user_id: &str,
        plan_id: &str,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<PendingOrder, AppError> {
        verify_payment_signature(order_id, payment_id, signature, self.key_secret.as_bytes())?;
        self.evict_expired(Instant::now());

        let removed = self.pending.remove_if(order_id, |_, pending| {
            pending.user_id == user_id && pending.plan_id == plan_id
        });

        match removed {
            Some((_, order)) => {
                tracing::info!(order_id, payment_id, plan = order.plan_id, "Payment verified");
                Ok(order)
            }
            None => {
                let reason = match self.pending.get(order_id) {
                    Some(open) if open.user_id == user_id => format!(
                        "order {} was opened for plan {}, not {}",
                        order_id, open.plan_id, plan_id
                    ),
                    _ => format!("no open order {} for this user", order_id),
                };
                Err(AppError::PaymentVerification(reason))
            }
        }
    }
}

/// `hex(HMAC-SHA256(secret, "{order_id}|{payment_id}"))`
pub fn payment_signature(order_id: &str, payment_id: &str, secret: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of a provided signature against the expected one.
pub fn verify_payment_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    secret: &[u8],
) -> Result<(), AppError> {
    if order_id.is_empty() || payment_id.is_empty() {
        return Err(AppError::PaymentVerification(
            "missing order or payment id".to_string(),
        ));
    }

    let expected = payment_signature(order_id, payment_id, secret)?;
    let provided = signature.trim().to_ascii_lowercase();

    if expected.as_bytes().ct_eq(provided.as_bytes()).into() {
        Ok(())
    } else {
        Err(AppError::PaymentVerification(format!(
            "signature mismatch for order {}",
            order_id
        )))
    }
}

/// `order_` followed by 14 random hex digits.
fn local_order_id() -> Result<String, AppError> {
    let mut bytes = [0u8; 7];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;
    Ok(format!("order_{}", hex::encode(bytes)))
}
