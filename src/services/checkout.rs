// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hosted checkout session creation.

use crate::config::Config;
use crate::error::{AppError, Result};
use serde::Deserialize;

/// Placeholder the payment provider replaces with the real session id.
const SESSION_ID_TEMPLATE: &str = "{CHECKOUT_SESSION_ID}";

/// Request body for `POST /api/create-checkout-session`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub price_id: Option<String>,
    pub return_url: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
}

/// Validated checkout parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutParams {
    pub price_id: String,
    pub return_url: String,
    pub user_id: String,
    pub email: String,
}

/// Server-side values used when the request leaves them out.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutDefaults {
    pub price_id: String,
    pub return_url: String,
}

impl CheckoutRequest {
    /// Require user and email. Price and return URL fall back to the
    /// configured plan and frontend.
    pub fn validate(self, defaults: &CheckoutDefaults) -> Result<CheckoutParams> {
        let present = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        match (present(self.user_id), present(self.email)) {
            (Some(user_id), Some(email)) => Ok(CheckoutParams {
                price_id: present(self.price_id).unwrap_or_else(|| defaults.price_id.clone()),
                return_url: present(self.return_url).unwrap_or_else(|| defaults.return_url.clone()),
                user_id,
                email,
            }),
            _ => Err(AppError::BadRequest("Missing parameters".to_string())),
        }
    }
}

impl CheckoutParams {
    /// Form fields for the provider's checkout-session endpoint.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price]", self.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "success_url",
                format!("{}?session_id={}", self.return_url, SESSION_ID_TEMPLATE),
            ),
            ("cancel_url", self.return_url.clone()),
            ("customer_email", self.email.clone()),
            ("metadata[user_id]", self.user_id.clone()),
        ]
    }
}

#[derive(Deserialize)]
struct CheckoutSessionResponse {
    url: Option<String>,
}

/// Client for the payment provider's checkout API.
pub struct CheckoutService {
    http: reqwest::Client,
    api_url: String,
    secret_key: Option<String>,
    defaults: CheckoutDefaults,
}

impl CheckoutService {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.payment_api_url.trim_end_matches('/').to_string(),
            secret_key: config.payment_secret_key.clone(),
            defaults: CheckoutDefaults {
                price_id: config.payment_price_id.clone(),
                return_url: config.frontend_url.clone(),
            },
        }
    }

    /// Create a hosted checkout session and return its redirect URL.
    pub async fn create_session(&self, request: CheckoutRequest) -> Result<String> {
        let params = request.validate(&self.defaults)?;
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Payment secret key not configured")))?;

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_url))
            .bearer_auth(secret_key)
            .form(&params.form_fields())
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("Checkout request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Payment(format!("HTTP {}: {}", status, body)));
        }

        let session: CheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Payment(format!("JSON parse error: {}", e)))?;

        let url = session
            .url
            .ok_or_else(|| AppError::Payment("Checkout session has no URL".to_string()))?;
        tracing::info!(user_id = %params.user_id, "Created checkout session");
        Ok(url)
    }
}
