// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live copy of the predictions feed.
//!
//! Loads the full collection once, then reloads on every change
//! notification. Bursts of notifications that arrive while a reload is in
//! flight collapse into a single follow-up reload.

use crate::config::SyncTimeouts;
use crate::error::GatewayError;
use crate::gateway::{RemoteGateway, Subscription};
use crate::models::{
    compute_stats, AggregateStats, DataChange, NewPrediction, Prediction, PredictionStatus, Sport,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;

/// Where the held collection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedSource {
    /// Nothing loaded yet.
    #[default]
    Empty,
    Remote,
    /// Backend unreachable; showing the fallback collection.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedSnapshot {
    /// Newest first.
    pub predictions: Vec<Prediction>,
    pub stats: AggregateStats,
    /// The change subscription is live.
    pub connected: bool,
    /// No load has resolved yet.
    pub loading: bool,
    pub source: FeedSource,
    applied_seq: u64,
}

struct Shared<G> {
    gateway: Arc<G>,
    timeouts: SyncTimeouts,
    fallback: Vec<Prediction>,
    state: watch::Sender<FeedSnapshot>,
    next_seq: AtomicU64,
    active: AtomicBool,
}

impl<G: RemoteGateway> Shared<G> {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn load(&self) -> Vec<Prediction> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let deadline = self.timeouts.list;
        let result = timeout(deadline, self.gateway.list_items())
            .await
            .unwrap_or(Err(GatewayError::Timeout(deadline)));
        let fetched = match result {
            Ok(mut items) => {
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Some(items)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load predictions");
                None
            }
        };

        if !self.is_active() {
            return fetched.unwrap_or_default();
        }

        self.state.send_if_modified(|s| {
            if seq <= s.applied_seq {
                tracing::debug!(seq, applied = s.applied_seq, "Discarding stale load");
                return false;
            }
            s.applied_seq = seq;
            s.loading = false;
            match &fetched {
                Some(items) => {
                    s.predictions = items.clone();
                    s.source = FeedSource::Remote;
                }
                // Keep good data through a blip; otherwise show the fallback.
                None if s.source == FeedSource::Remote => {}
                None => {
                    s.predictions = self.fallback.clone();
                    s.source = FeedSource::Fallback;
                }
            }
            s.stats = compute_stats(&s.predictions);
            true
        });

        fetched.unwrap_or_default()
    }

    async fn listen(self: Arc<Self>, mut changes: Subscription<DataChange>) {
        while let Some(change) = changes.recv().await {
            let mut coalesced = 0usize;
            while changes.try_recv().is_some() {
                coalesced += 1;
            }
            if !self.is_active() {
                break;
            }
            tracing::debug!(record_id = ?change.record_id, coalesced, "Predictions changed, reloading");
            self.load().await;
        }

        if self.is_active() {
            tracing::warn!("Change notification channel closed");
            self.state.send_if_modified(|s| std::mem::replace(&mut s.connected, false));
        }
    }
}

/// Owns the cached predictions collection and its derived stats.
pub struct LiveDataSynchronizer<G: RemoteGateway> {
    shared: Arc<Shared<G>>,
    tasks: JoinSet<()>,
}

impl<G: RemoteGateway> LiveDataSynchronizer<G> {
    /// Subscribe to changes and start the initial load.
    pub fn start(gateway: Arc<G>, timeouts: SyncTimeouts) -> Self {
        Self::start_with_fallback(gateway, timeouts, Vec::new())
    }

    /// Like [`LiveDataSynchronizer::start`], showing `fallback` whenever the
    /// backend cannot be reached and nothing has been loaded.
    pub fn start_with_fallback(
        gateway: Arc<G>,
        timeouts: SyncTimeouts,
        mut fallback: Vec<Prediction>,
    ) -> Self {
        fallback.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let changes = gateway.on_data_change();
        let (state, _) = watch::channel(FeedSnapshot {
            connected: true,
            loading: true,
            ..Default::default()
        });

        let shared = Arc::new(Shared {
            gateway,
            timeouts,
            fallback,
            state,
            next_seq: AtomicU64::new(0),
            active: AtomicBool::new(true),
        });

        let mut tasks = JoinSet::new();
        tasks.spawn(Arc::clone(&shared).listen(changes));
        let initial = Arc::clone(&shared);
        tasks.spawn(async move {
            initial.load().await;
        });

        Self { shared, tasks }
    }

    /// Reload now. Resolves to the freshly fetched items, or empty if the
    /// backend failed or timed out.
    pub async fn load(&self) -> Vec<Prediction> {
        self.shared.load().await
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn predictions(&self) -> Vec<Prediction> {
        self.shared.state.borrow().predictions.clone()
    }

    pub fn stats(&self) -> AggregateStats {
        self.shared.state.borrow().stats
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.borrow().connected
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.shared.state.subscribe()
    }

    /// Wait for the first load to resolve.
    pub async fn loaded(&self) -> FeedSnapshot {
        let mut rx = self.subscribe();
        let snapshot = match rx.wait_for(|s| !s.loading).await {
            Ok(s) => s.clone(),
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    /// Unsubscribe and stop. Loads still in flight are discarded.
    pub async fn shutdown(&mut self) {
        self.shared
            .state
            .send_if_modified(|s| std::mem::replace(&mut s.connected, false));
        self.shared.active.store(false, Ordering::SeqCst);
        self.tasks.shutdown().await;
    }
}

impl<G: RemoteGateway> Drop for LiveDataSynchronizer<G> {
    fn drop(&mut self) {
        self.shared.active.store(false, Ordering::SeqCst);
        self.tasks.abort_all();
    }
}

/// Sample feed shown when running without a backend.
pub fn demo_feed() -> Vec<Prediction> {
    let pick = |id: &str, created_at: &str, draft: NewPrediction, status, score: Option<&str>| {
        let mut p = Prediction::publish(id.to_string(), created_at.to_string(), draft);
        p.status = status;
        p.settled_score = score.map(str::to_string);
        p
    };

    vec![
        pick(
            "demo-1",
            "2026-01-03T18:00:00Z",
            NewPrediction {
                matchup_time: "2026-01-04T01:00:00Z".to_string(),
                category: Sport::Nba,
                title: "Lakers vs Celtics".to_string(),
                wager_description: "Celtics -4.5".to_string(),
                odds: "1.91".to_string(),
                stake_units: 3,
                body: "Boston's half-court defense has held opponents under 105 in six straight."
                    .to_string(),
                is_premium: true,
            },
            PredictionStatus::Pending,
            None,
        ),
        pick(
            "demo-2",
            "2026-01-02T15:00:00Z",
            NewPrediction {
                matchup_time: "2026-01-02T21:25:00Z".to_string(),
                category: Sport::Nfl,
                title: "Chiefs vs Bills".to_string(),
                wager_description: "Over 47.5".to_string(),
                odds: "2.10".to_string(),
                stake_units: 2,
                body: "Both offenses rank top five in early-down success rate.".to_string(),
                is_premium: false,
            },
            PredictionStatus::Won,
            Some("31-27"),
        ),
        pick(
            "demo-3",
            "2026-01-01T12:00:00Z",
            NewPrediction {
                matchup_time: "2026-01-01T19:00:00Z".to_string(),
                category: Sport::Nhl,
                title: "Rangers vs Devils".to_string(),
                wager_description: "Rangers ML".to_string(),
                odds: "1.75".to_string(),
                stake_units: 1,
                body: "Back-to-back spot for New Jersey with the backup in net.".to_string(),
                is_premium: false,
            },
            PredictionStatus::Lost,
            Some("2-4"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_feed_is_newest_first() {
        let feed = demo_feed();
        assert!(feed
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn test_demo_feed_stats() {
        let stats = compute_stats(&demo_feed());
        assert_eq!(stats.total_wins, 1);
        assert_eq!(stats.total_losses, 1);
        assert!((stats.net_units - (2.0 * 1.10 - 1.0)).abs() < 1e-9);
    }
}
