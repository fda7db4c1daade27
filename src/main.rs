// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! VegasVault API Server
//!
//! Creates hosted checkout sessions and applies signed billing webhooks to
//! subscriber profiles.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vegasvault::{config::Config, gateway::RestGateway, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting VegasVault API");

    if config.webhook_signing_secret.is_none() {
        tracing::warn!("WEBHOOK_SIGNING_SECRET not set, billing webhooks will be rejected");
    }
    if config.backend_service_key.is_none() {
        tracing::warn!("BACKEND_SERVICE_KEY not set, subscription updates from webhooks will fail");
    }

    let gateway = Arc::new(RestGateway::new(&config)?);
    tracing::info!(backend = %config.backend_url, "Backend gateway initialized");

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), gateway));

    // Build router
    let app = vegasvault::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vegasvault=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
