// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Every setting has a literal fallback so a checkout of the repo runs
//! against a local backend stack. Fallbacks only ever name local or test-mode
//! resources; each one used is logged at startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BACKEND_URL: &str = "http://localhost:54321";
const DEFAULT_BACKEND_ANON_KEY: &str = "local-anon-key";
const DEFAULT_PAYMENT_PUBLISHABLE_KEY: &str = "pk_test_local";
const DEFAULT_PAYMENT_PRICE_ID: &str = "price_local_placeholder";
const DEFAULT_PAYMENT_API_URL: &str = "http://localhost:12111";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Backend (auth + store + push) ---
    /// Base URL of the backend REST/auth API
    pub backend_url: String,
    /// Public (anon) API key sent with client requests
    pub backend_anon_key: String,
    /// Privileged key used by the billing webhook to update profiles
    pub backend_service_key: Option<String>,
    /// Where the signed-in session is persisted between runs
    pub session_file: Option<PathBuf>,

    // --- Payments ---
    /// Publishable key handed to the frontend checkout widget
    pub payment_publishable_key: String,
    /// Secret key for creating checkout sessions (server only)
    pub payment_secret_key: Option<String>,
    /// Subscription plan/price identifier
    pub payment_price_id: String,
    pub payment_api_url: String,
    /// Shared secret used to sign billing webhooks
    pub webhook_signing_secret: Option<String>,

    // --- Server ---
    /// Frontend URL (CORS origin, checkout return URL)
    pub frontend_url: String,
    pub port: u16,

    // --- Timeouts ---
    pub profile_fetch_timeout: Duration,
    pub auth_init_timeout: Duration,
    pub list_timeout: Duration,
}

/// Deadlines applied by the session reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthTimeouts {
    /// Upper bound on a single profile fetch before falling back.
    pub profile_fetch: Duration,
    /// Upper bound on startup before forcing guest mode.
    pub init_safety: Duration,
}

impl Default for AuthTimeouts {
    fn default() -> Self {
        Self {
            profile_fetch: Duration::from_secs(2),
            init_safety: Duration::from_secs(3),
        }
    }
}

/// Deadlines applied by the live data synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimeouts {
    pub list: Duration,
}

impl Default for SyncTimeouts {
    fn default() -> Self {
        Self {
            list: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            backend_url: env_or_fallback("BACKEND_URL", DEFAULT_BACKEND_URL),
            backend_anon_key: env_or_fallback("BACKEND_ANON_KEY", DEFAULT_BACKEND_ANON_KEY),
            backend_service_key: optional_env("BACKEND_SERVICE_KEY"),
            session_file: optional_env("SESSION_FILE").map(PathBuf::from),

            payment_publishable_key: env_or_fallback(
                "PAYMENT_PUBLISHABLE_KEY",
                DEFAULT_PAYMENT_PUBLISHABLE_KEY,
            ),
            payment_secret_key: optional_env("PAYMENT_SECRET_KEY"),
            payment_price_id: env_or_fallback("PAYMENT_PRICE_ID", DEFAULT_PAYMENT_PRICE_ID),
            payment_api_url: env_or_fallback("PAYMENT_API_URL", DEFAULT_PAYMENT_API_URL),
            webhook_signing_secret: optional_env("WEBHOOK_SIGNING_SECRET"),

            frontend_url: env_or_fallback("FRONTEND_URL", DEFAULT_FRONTEND_URL),
            port: parse_env("PORT", 8080)?,

            profile_fetch_timeout: Duration::from_millis(parse_env(
                "PROFILE_FETCH_TIMEOUT_MS",
                2000,
            )?),
            auth_init_timeout: Duration::from_millis(parse_env("AUTH_INIT_TIMEOUT_MS", 3000)?),
            list_timeout: Duration::from_millis(parse_env("LIST_TIMEOUT_MS", 10_000)?),
        })
    }

    /// Config for tests: local-only endpoints and short deadlines.
    pub fn test_default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            backend_anon_key: "test-anon-key".to_string(),
            backend_service_key: Some("test-service-key".to_string()),
            session_file: None,
            payment_publishable_key: "pk_test_local".to_string(),
            payment_secret_key: Some("sk_test_local".to_string()),
            payment_price_id: "price_test".to_string(),
            payment_api_url: "http://localhost:12111".to_string(),
            webhook_signing_secret: Some("whsec_test_secret".to_string()),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            profile_fetch_timeout: Duration::from_secs(2),
            auth_init_timeout: Duration::from_secs(3),
            list_timeout: Duration::from_secs(10),
        }
    }

    pub fn auth_timeouts(&self) -> AuthTimeouts {
        AuthTimeouts {
            profile_fetch: self.profile_fetch_timeout,
            init_safety: self.auth_init_timeout,
        }
    }

    pub fn sync_timeouts(&self) -> SyncTimeouts {
        SyncTimeouts {
            list: self.list_timeout,
        }
    }
}

fn env_or_fallback(key: &'static str, fallback: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => {
            tracing::warn!(key, fallback, "Environment variable not set, using local fallback");
            fallback.to_string()
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
