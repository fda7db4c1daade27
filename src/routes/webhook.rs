// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for billing events.

use crate::gateway::BillingStore;
use crate::services::billing::{apply_event, verify_signature, BillingEvent, SignatureError};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Header carrying the `t=...,v1=...` signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Webhook routes.
pub fn routes<B: BillingStore>() -> Router<Arc<AppState<B>>> {
    Router::new().route("/api/webhook", post(handle_event::<B>))
}

#[derive(Serialize)]
struct Acknowledged {
    received: bool,
}

fn webhook_error(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, format!("Webhook Error: {}", message)).into_response()
}

/// Handle a billing event (POST). The raw body is needed for signature
/// verification, so it is taken as bytes.
async fn handle_event<B: BillingStore>(
    State(state): State<Arc<AppState<B>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(secret) = state.config.webhook_signing_secret.as_deref() else {
        tracing::error!("Billing webhook received but no signing secret is configured");
        return webhook_error(StatusCode::BAD_REQUEST, SignatureError::NotConfigured);
    };

    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!("Security Alert: Billing webhook without signature header");
        return webhook_error(StatusCode::BAD_REQUEST, SignatureError::MissingHeader);
    };

    if let Err(e) = verify_signature(&body, signature, secret, chrono::Utc::now().timestamp()) {
        tracing::warn!(error = %e, "Security Alert: Billing webhook signature rejected");
        return webhook_error(StatusCode::BAD_REQUEST, e);
    }

    let event = match BillingEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse billing event");
            return webhook_error(StatusCode::BAD_REQUEST, e);
        }
    };

    if let Err(e) = apply_event(state.billing.as_ref(), &event).await {
        if e.is_transient() {
            // Let the provider redeliver
            tracing::error!(error = %e, "Failed to apply billing event, requesting retry");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        tracing::error!(error = %e, "Failed to apply billing event");
    }

    (StatusCode::OK, Json(Acknowledged { received: true })).into_response()
}
