// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! VegasVault: premium sports picks with a subscription paywall
//!
//! This crate provides the client-side core (session reconciliation, live
//! feed synchronization and entitlement rules) plus the small HTTP backend
//! for checkout and billing webhooks.

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use gateway::RestGateway;
use services::CheckoutService;
use std::sync::Arc;

/// Shared application state.
pub struct AppState<B = RestGateway> {
    pub config: Config,
    pub checkout: CheckoutService,
    pub billing: Arc<B>,
}

impl<B> AppState<B> {
    pub fn new(config: Config, billing: Arc<B>) -> Self {
        Self {
            checkout: CheckoutService::new(&config),
            config,
            billing,
        }
    }
}
