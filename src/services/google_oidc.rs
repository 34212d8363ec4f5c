// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in: verification of ID tokens posted by the browser.
//!
//! Signing keys come from Google's JWKS endpoint (located through OIDC
//! discovery) and are cached for as long as `Cache-Control: max-age` allows.
//! An unknown `kid` forces one refresh before the token is rejected.

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::{HeaderMap, CACHE_CONTROL};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
const FALLBACK_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const LEEWAY_SECS: u64 = 60;

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Stable Google account id (`sub`)
    pub subject: String,
    pub email: String,
    /// Display name, empty when the token carries none
    pub name: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OidcError {
    /// Bad signature, wrong audience, unverified email, ...
    #[error("ID token rejected: {0}")]
    Rejected(String),
    /// Keys could not be fetched.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl From<OidcError> for AppError {
    fn from(err: OidcError) -> Self {
        match err {
            OidcError::Rejected(reason) => {
                tracing::warn!(reason = %reason, "Google ID token rejected");
                AppError::InvalidToken
            }
            OidcError::Unavailable(reason) => {
                AppError::Internal(anyhow::anyhow!("Google JWKS unavailable: {}", reason))
            }
        }
    }
}

struct Cached<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Cached<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn fresh(&self) -> Option<&T> {
        (self.expires_at > Instant::now()).then_some(&self.value)
    }
}

type KeyMap = HashMap<String, Arc<DecodingKey>>;

/// Google's published signing keys, fetched lazily.
struct JwksCache {
    http: reqwest::Client,
    jwks_uri: RwLock<Option<Cached<String>>>,
    keys: RwLock<Option<Cached<KeyMap>>>,
    refresh_lock: Mutex<()>,
}

enum KeySource {
    Google(JwksCache),
    /// Fixed key for tests; accepts only `kid` signed with `algorithm`.
    Static {
        kid: String,
        key: Arc<DecodingKey>,
        algorithm: Algorithm,
    },
}

/// Verifies Google ID tokens issued for this app's OAuth client.
pub struct GoogleIdTokenVerifier {
    client_id: String,
    keys: KeySource,
}

impl GoogleIdTokenVerifier {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building OIDC HTTP client")?;

        tracing::info!(client_id = %config.google_client_id, "Google ID token verifier ready");

        Ok(Self {
            client_id: config.google_client_id.clone(),
            keys: KeySource::Google(JwksCache {
                http,
                jwks_uri: RwLock::new(None),
                keys: RwLock::new(None),
                refresh_lock: Mutex::new(()),
            }),
        })
    }

    /// Verifier with a fixed key, for tests that mint their own tokens.
    pub fn with_static_key(
        config: &Config,
        kid: impl Into<String>,
        key: DecodingKey,
        algorithm: Algorithm,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static key id must not be empty");
        }

        Ok(Self {
            client_id: config.google_client_id.clone(),
            keys: KeySource::Static {
                kid,
                key: Arc::new(key),
                algorithm,
            },
        })
    }

    /// Verify an ID token and return the identity it asserts.
    pub async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, OidcError> {
        let id_token = id_token.trim();
        if id_token.is_empty() {
            return Err(OidcError::Rejected("empty ID token".to_string()));
        }

        let header = decode_header(id_token)
            .map_err(|e| OidcError::Rejected(format!("invalid JWT header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| OidcError::Rejected("missing kid".to_string()))?;

        let (key, algorithm) = match &self.keys {
            KeySource::Static {
                kid: static_kid,
                key,
                algorithm,
            } => {
                if &kid != static_kid {
                    return Err(OidcError::Rejected(format!("unknown kid: {kid}")));
                }
                (key.clone(), *algorithm)
            }
            KeySource::Google(cache) => (cache.key_for(&kid).await?, Algorithm::RS256),
        };

        if header.alg != algorithm {
            return Err(OidcError::Rejected(format!(
                "unexpected alg: {:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = LEEWAY_SECS;

        let claims = decode::<IdTokenClaims>(id_token, key.as_ref(), &validation)
            .map_err(|e| OidcError::Rejected(format!("validation failed: {e}")))?
            .claims;

        check_claims(claims, now_unix_secs())
    }
}

impl JwksCache {
    async fn key_for(&self, kid: &str) -> Result<Arc<DecodingKey>, OidcError> {
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        // Stale cache first, then a forced refetch for rotated keys.
        for force in [false, true] {
            self.refresh(force).await?;
            if let Some(key) = self.cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(OidcError::Rejected(format!("kid not in JWKS: {kid}")))
    }

    async fn cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        self.keys
            .read()
            .await
            .as_ref()
            .and_then(Cached::fresh)
            .and_then(|keys| keys.get(kid))
            .cloned()
    }

    async fn refresh(&self, force: bool) -> Result<(), OidcError> {
        let _guard = self.refresh_lock.lock().await;

        if !force
            && self
                .keys
                .read()
                .await
                .as_ref()
                .and_then(Cached::fresh)
                .is_some()
        {
            return Ok(());
        }

        let jwks_uri = self.jwks_uri(force).await?;
        tracing::debug!(jwks_uri = %jwks_uri, "Fetching Google JWKS");

        let response = self
            .http
            .get(&jwks_uri)
            .send()
            .await
            .map_err(|e| OidcError::Unavailable(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(OidcError::Unavailable(format!(
                "JWKS request returned {}",
                response.status()
            )));
        }

        let ttl = max_age(response.headers()).unwrap_or(DEFAULT_CACHE_TTL);
        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| OidcError::Unavailable(format!("invalid JWKS JSON: {e}")))?;

        let keys = usable_keys(jwks);
        if keys.is_empty() {
            return Err(OidcError::Unavailable(
                "JWKS contained no usable RSA keys".to_string(),
            ));
        }

        tracing::debug!(count = keys.len(), ttl_secs = ttl.as_secs(), "Google JWKS cached");
        *self.keys.write().await = Some(Cached::new(keys, ttl));
        Ok(())
    }

    /// JWKS location from discovery. Discovery failures fall back to the last
    /// known URI, then to the well-known default.
    async fn jwks_uri(&self, force: bool) -> Result<String, OidcError> {
        let previous = {
            let cached = self.jwks_uri.read().await;
            if !force {
                if let Some(uri) = cached.as_ref().and_then(Cached::fresh) {
                    return Ok(uri.clone());
                }
            }
            cached.as_ref().map(|c| c.value.clone())
        };
        let fallback = || previous.clone().unwrap_or_else(|| FALLBACK_JWKS_URL.to_string());

        let response = match self.http.get(DISCOVERY_URL).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "OIDC discovery failed, using fallback JWKS URI");
                return Ok(fallback());
            }
            Err(e) => {
                tracing::warn!(error = %e, "OIDC discovery failed, using fallback JWKS URI");
                return Ok(fallback());
            }
        };

        let ttl = max_age(response.headers()).unwrap_or(DEFAULT_CACHE_TTL);
        let discovery: Discovery = response
            .json()
            .await
            .map_err(|e| OidcError::Unavailable(format!("invalid discovery JSON: {e}")))?;

        *self.jwks_uri.write().await = Some(Cached::new(discovery.jwks_uri.clone(), ttl));
        Ok(discovery.jwks_uri)
    }
}

#[derive(Deserialize)]
struct Discovery {
    jwks_uri: String,
}

#[derive(Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    n: String,
    e: String,
}

impl Jwk {
    fn is_rs256_signing_key(&self) -> bool {
        self.kty == "RSA"
            && !self.kid.trim().is_empty()
            && self.alg.as_deref().is_none_or(|alg| alg == "RS256")
            && self.key_use.as_deref().is_none_or(|u| u == "sig")
    }
}

fn usable_keys(jwks: Jwks) -> KeyMap {
    jwks.keys
        .into_iter()
        .filter(Jwk::is_rs256_signing_key)
        .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => Some((jwk.kid, Arc::new(key))),
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping malformed JWKS key");
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    iat: Option<u64>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

/// Checks beyond what `jsonwebtoken` validates.
fn check_claims(claims: IdTokenClaims, now: u64) -> Result<VerifiedIdentity, OidcError> {
    match claims.iat {
        Some(iat) if iat > now + LEEWAY_SECS => {
            return Err(OidcError::Rejected("iat is in the future".to_string()));
        }
        Some(_) => {}
        None => return Err(OidcError::Rejected("missing iat".to_string())),
    }

    let email = claims
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| OidcError::Rejected("missing email".to_string()))?;

    if claims.email_verified != Some(true) {
        return Err(OidcError::Rejected(format!("email not verified: {email}")));
    }

    Ok(VerifiedIdentity {
        subject: claims.sub,
        email,
        name: claims.name.unwrap_or_default(),
    })
}

fn max_age(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_max_age)
        .map(Duration::from_secs)
}

fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control
        .split(',')
        .filter_map(|d| d.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse().ok())
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
