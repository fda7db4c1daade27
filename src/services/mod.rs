// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod billing;
pub mod catalog;
pub mod checkout;
pub mod entitlement;
pub mod session;
pub mod sync;

pub use billing::{BillingEvent, SignatureError};
pub use catalog::AdminCatalog;
pub use checkout::{CheckoutDefaults, CheckoutRequest, CheckoutService};
pub use entitlement::{BodyView, PredictionView};
pub use session::{AuthPhase, AuthSnapshot, AuthView, SessionReconciler};
pub use sync::{demo_feed, FeedSnapshot, FeedSource, LiveDataSynchronizer};
