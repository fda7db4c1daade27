// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod prediction;
pub mod profile;
pub mod session;
pub mod stats;

pub use prediction::{
    NewPrediction, Prediction, PredictionStatus, PredictionUpdate, Settlement, Sport,
};
pub use profile::{Profile, SubscriptionStatus};
pub use session::{AuthEvent, AuthEventKind, DataChange, Session, SessionUser};
pub use stats::{compute_stats, performance_series, AggregateStats, PerformancePoint};
