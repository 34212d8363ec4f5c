//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment (or a
//! local `.env` file) and read once at startup.

use std::env;
use std::time::Duration;

/// Payload a charger QR code must carry (after trim + lowercase).
pub const DEFAULT_QR_TOKEN: &str = "infispark";

/// How long the acquisition loop waits for a matching code.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Which record store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL (CORS origin)
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// OAuth client ID the Google ID tokens are issued for
    pub google_client_id: String,
    /// Emails allowed into the admin dashboard (lowercased)
    pub admin_emails: Vec<String>,
    /// Expected charger QR payload
    pub qr_expected_token: String,
    /// QR acquisition timeout
    pub scan_timeout: Duration,
    /// Record store backend
    pub store_backend: StoreBackend,

    // --- Checkout provider ---
    /// Public key id handed to the checkout widget
    pub checkout_key_id: String,
    /// Base URL of the provider's orders API. `None` mints local order ids.
    pub checkout_api_url: Option<String>,
    /// ISO currency code
    pub checkout_currency: String,
    /// Merchant name shown in the widget
    pub merchant_name: String,

    // --- Secrets ---
    /// Shared secret used to verify payment signatures
    pub checkout_key_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            google_client_id: "test-client.apps.googleusercontent.com".to_string(),
            admin_emails: vec!["admin@example.com".to_string()],
            qr_expected_token: DEFAULT_QR_TOKEN.to_string(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            store_backend: StoreBackend::Memory,
            checkout_key_id: "rzp_test_key".to_string(),
            checkout_api_url: None,
            checkout_currency: "INR".to_string(),
            merchant_name: "Bolt.Earth".to_string(),
            checkout_key_secret: "test_checkout_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("RECORD_STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("firestore") | Err(_) => StoreBackend::Firestore,
            Ok(other) => return Err(ConfigError::Invalid("RECORD_STORE", other.to_string())),
        };

        let scan_timeout = match env::var("SCAN_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::Invalid("SCAN_TIMEOUT_SECS", raw))?,
            Err(_) => DEFAULT_SCAN_TIMEOUT,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            admin_emails: parse_admin_emails(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            qr_expected_token: env::var("QR_EXPECTED_TOKEN")
                .map(|v| v.trim().to_lowercase())
                .unwrap_or_else(|_| DEFAULT_QR_TOKEN.to_string()),
            scan_timeout,
            store_backend,

            checkout_key_id: env::var("CHECKOUT_KEY_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CHECKOUT_KEY_ID"))?,
            checkout_api_url: env::var("CHECKOUT_API_URL")
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty()),
            checkout_currency: env::var("CHECKOUT_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            merchant_name: env::var("MERCHANT_NAME").unwrap_or_else(|_| "Bolt.Earth".to_string()),

            checkout_key_secret: env::var("CHECKOUT_KEY_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CHECKOUT_KEY_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Session cookies get `Secure` unless the frontend is served locally.
    pub fn secure_cookies(&self) -> bool {
        !(self.frontend_url.starts_with("http://localhost")
            || self.frontend_url.starts_with("http://127.0.0.1"))
    }

    /// Whether `email` is on the admin allow-list (ASCII case-insensitive).
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim();
        !email.is_empty()
            && self
                .admin_emails
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(email))
    }
}

/// Split a comma-separated allow-list, dropping blanks.
pub fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
