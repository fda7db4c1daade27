// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::Arc;
use std::time::Duration;
use vegasvault::config::Config;
use vegasvault::gateway::{InMemoryGateway, RemoteGateway};
use vegasvault::models::{
    NewPrediction, Prediction, PredictionStatus, Profile, Session, SessionUser, Sport,
    SubscriptionStatus,
};
use vegasvault::routes::create_router;
use vegasvault::services::{AuthSnapshot, FeedSnapshot, LiveDataSynchronizer, SessionReconciler};
use vegasvault::AppState;

/// Upper bound for waiting on state changes. With a paused clock this is
/// virtual time, so a wrong expectation fails quickly instead of hanging.
#[allow(dead_code)]
pub const WAIT_LIMIT: Duration = Duration::from_secs(60);

#[allow(dead_code)]
pub fn profile(id: &str, status: SubscriptionStatus) -> Profile {
    Profile {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        is_admin: false,
        subscription_status: status,
        billing_customer_ref: None,
    }
}

#[allow(dead_code)]
pub fn admin(id: &str) -> Profile {
    Profile {
        is_admin: true,
        ..profile(id, SubscriptionStatus::Active)
    }
}

#[allow(dead_code)]
pub fn session_for(user_id: &str) -> Session {
    Session {
        access_token: format!("access-{}", user_id),
        refresh_token: Some(format!("refresh-{}", user_id)),
        expires_at: None,
        user: SessionUser {
            id: user_id.to_string(),
            email: Some(format!("{}@example.com", user_id)),
        },
    }
}

#[allow(dead_code)]
pub fn prediction(id: &str, created_at: &str, status: PredictionStatus, units: u8, odds: &str) -> Prediction {
    Prediction {
        id: id.to_string(),
        created_at: created_at.to_string(),
        matchup_time: "2026-02-01T00:00:00Z".to_string(),
        category: Sport::Nba,
        title: format!("Matchup {}", id),
        wager_description: "Home -3.5".to_string(),
        odds: odds.to_string(),
        stake_units: units,
        body: "Short analysis.".to_string(),
        is_premium: false,
        status,
        settled_score: None,
    }
}

#[allow(dead_code)]
pub fn draft(title: &str) -> NewPrediction {
    NewPrediction {
        matchup_time: "2026-03-01T00:00:00Z".to_string(),
        category: Sport::Nfl,
        title: title.to_string(),
        wager_description: "Under 41.5".to_string(),
        odds: "1.91".to_string(),
        stake_units: 2,
        body: "Weather game.".to_string(),
        is_premium: true,
    }
}

/// Wait until the reconciler's state satisfies `pred`.
#[allow(dead_code)]
pub async fn wait_for_auth<G: RemoteGateway>(
    reconciler: &SessionReconciler<G>,
    pred: impl FnMut(&AuthSnapshot) -> bool,
) -> AuthSnapshot {
    let mut rx = reconciler.subscribe();
    let snapshot = tokio::time::timeout(WAIT_LIMIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for auth state")
        .expect("auth state channel closed")
        .clone();
    snapshot
}

/// Wait until the synchronizer's state satisfies `pred`.
#[allow(dead_code)]
pub async fn wait_for_feed<G: RemoteGateway>(
    sync: &LiveDataSynchronizer<G>,
    pred: impl FnMut(&FeedSnapshot) -> bool,
) -> FeedSnapshot {
    let mut rx = sync.subscribe();
    let snapshot = tokio::time::timeout(WAIT_LIMIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for feed state")
        .expect("feed state channel closed")
        .clone();
    snapshot
}

/// Create a test app backed by an in-memory store.
/// Returns the router and the store.
#[allow(dead_code)]
pub fn create_test_app(gateway: InMemoryGateway) -> (axum::Router, Arc<InMemoryGateway>) {
    create_test_app_with_config(Config::test_default(), gateway)
}

#[allow(dead_code)]
pub fn create_test_app_with_config(
    config: Config,
    gateway: InMemoryGateway,
) -> (axum::Router, Arc<InMemoryGateway>) {
    let gateway = Arc::new(gateway);
    let state = Arc::new(AppState::new(config, Arc::clone(&gateway)));
    (create_router(state), gateway)
}
