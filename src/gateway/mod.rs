// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend capability boundary (auth, store and push channel).
//!
//! Nothing behind [`RemoteGateway`] imposes a deadline: every call may fail
//! or hang, and callers apply their own timeouts.

pub mod memory;
pub mod rest;

pub use memory::InMemoryGateway;
pub use rest::RestGateway;

use crate::error::GatewayError;
use crate::models::{
    AuthEvent, DataChange, NewPrediction, Prediction, PredictionUpdate, Profile, Session,
    Settlement,
};
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    pub const PREDICTIONS: &str = "predictions";
}

/// Result type for backend calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Operations the app consumes from the backend.
pub trait RemoteGateway: Send + Sync + 'static {
    // ─── Auth ────────────────────────────────────────────────────

    /// Current persisted session, if any.
    ///
    /// Returns [`GatewayError::CorruptSession`] when the stored credential
    /// exists but cannot be used.
    fn get_session(&self) -> impl Future<Output = GatewayResult<Option<Session>>> + Send;

    /// Register for auth state changes. Dropping the handle unsubscribes.
    fn on_auth_event(&self) -> Subscription<AuthEvent>;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = GatewayResult<Session>> + Send;

    /// Create an account. `None` when the provider requires email
    /// confirmation before issuing a session.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = GatewayResult<Option<Session>>> + Send;

    fn sign_out(&self) -> impl Future<Output = GatewayResult<()>> + Send;

    // ─── Profiles ────────────────────────────────────────────────

    fn fetch_profile(
        &self,
        user_id: &str,
    ) -> impl Future<Output = GatewayResult<Option<Profile>>> + Send;

    // ─── Predictions ─────────────────────────────────────────────

    fn list_items(&self) -> impl Future<Output = GatewayResult<Vec<Prediction>>> + Send;

    fn create_item(
        &self,
        draft: NewPrediction,
    ) -> impl Future<Output = GatewayResult<Prediction>> + Send;

    fn update_item(
        &self,
        id: &str,
        update: PredictionUpdate,
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    fn delete_item(&self, id: &str) -> impl Future<Output = GatewayResult<()>> + Send;

    fn settle_item(
        &self,
        id: &str,
        settlement: Settlement,
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Register for change notifications on the predictions collection.
    fn on_data_change(&self) -> Subscription<DataChange>;
}

/// Privileged profile writes performed by the billing webhook.
pub trait BillingStore: Send + Sync + 'static {
    /// Mark a user's subscription active and remember their customer ref.
    fn activate_subscription(
        &self,
        user_id: &str,
        customer_ref: Option<&str>,
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Mark every profile with this customer ref inactive.
    fn deactivate_subscription(
        &self,
        customer_ref: &str,
    ) -> impl Future<Output = GatewayResult<()>> + Send;
}

/// Handle for a registered listener.
///
/// Events arrive in the order they were published. Dropping the handle (or
/// calling [`Subscription::unsubscribe`]) releases the registration.
pub struct Subscription<E> {
    rx: mpsc::UnboundedReceiver<E>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl<E> Subscription<E> {
    pub fn new(rx: mpsc::UnboundedReceiver<E>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            rx,
            release: Some(Box::new(release)),
        }
    }

    /// Next event, or `None` once the publisher has gone away.
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Next already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Fan-out of events to every live [`Subscription`].
pub struct SubscriberHub<E> {
    next_id: AtomicU64,
    senders: Arc<DashMap<u64, mpsc::UnboundedSender<E>>>,
}

impl<E: Clone + Send + 'static> SubscriberHub<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            senders: Arc::new(DashMap::new()),
        }
    }

    pub fn subscribe(&self) -> Subscription<E> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(id, tx);

        let senders = Arc::clone(&self.senders);
        Subscription::new(rx, move || {
            senders.remove(&id);
        })
    }

    /// Deliver to all subscribers; dead receivers are pruned.
    pub fn publish(&self, event: E) {
        self.senders
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    /// Drop every registration. Subscribers see their stream end.
    pub fn close_all(&self) {
        self.senders.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.len()
    }
}

impl<E: Clone + Send + 'static> Default for SubscriberHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hub_delivers_in_order() {
        let hub = SubscriberHub::<u32>::new();
        let mut sub = hub.subscribe();
        hub.publish(1);
        hub.publish(2);
        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_drop_releases_registration() {
        let hub = SubscriberHub::<u32>::new();
        let sub = hub.subscribe();
        let _other = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        sub.unsubscribe();
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_close_all_ends_streams() {
        let hub = SubscriberHub::<u32>::new();
        let mut sub = hub.subscribe();
        hub.close_all();
        assert_eq!(sub.recv().await, None);
    }
}
