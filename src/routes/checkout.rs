// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hosted checkout redirect and the public payment settings the frontend
//! needs to start one.

use crate::error::Result;
use crate::gateway::BillingStore;
use crate::services::CheckoutRequest;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes<B: BillingStore>() -> Router<Arc<AppState<B>>> {
    Router::new()
        .route(
            "/api/create-checkout-session",
            post(create_checkout_session::<B>),
        )
        .route("/api/payment-config", get(payment_config::<B>))
}

/// Publishable settings only; the secret key never leaves the server.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PaymentConfigResponse {
    pub publishable_key: String,
    pub price_id: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckoutResponse {
    pub url: String,
}

async fn create_checkout_session<B: BillingStore>(
    State(state): State<Arc<AppState<B>>>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let url = state.checkout.create_session(request).await?;
    Ok(Json(CheckoutResponse { url }))
}

async fn payment_config<B: BillingStore>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<PaymentConfigResponse> {
    Json(PaymentConfigResponse {
        publishable_key: state.config.payment_publishable_key.clone(),
        price_id: state.config.payment_price_id.clone(),
    })
}
