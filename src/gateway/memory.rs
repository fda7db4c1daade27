// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process backend used for offline demo mode and tests.
//!
//! All state lives in this object; nothing is shared through globals.
//! Individual operations can be made to fail, hang or lag so callers'
//! timeout and fallback paths can be exercised deterministically.

use super::{BillingStore, GatewayResult, RemoteGateway, SubscriberHub, Subscription};
use crate::error::GatewayError;
use crate::models::{
    AuthEvent, DataChange, NewPrediction, Prediction, PredictionUpdate, Profile, Session,
    SessionUser, Settlement, SubscriptionStatus,
};
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Gateway operations that can have faults injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetSession,
    SignIn,
    SignOut,
    FetchProfile,
    ListItems,
    WriteItem,
}

/// Injected behavior for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// Fail with a transport error.
    Fail,
    /// Never complete.
    Hang,
    /// Complete normally after a delay.
    Delay(Duration),
}

struct Account {
    password: String,
    user_id: String,
}

/// In-memory [`RemoteGateway`].
pub struct InMemoryGateway {
    accounts: DashMap<String, Account>,
    profiles: DashMap<String, Profile>,
    predictions: RwLock<Vec<Prediction>>,
    session: RwLock<Option<Session>>,
    corrupt_session: AtomicBool,
    auth_events: SubscriberHub<AuthEvent>,
    data_events: SubscriberHub<DataChange>,
    sticky_faults: DashMap<Op, Fault>,
    queued_faults: DashMap<Op, VecDeque<Fault>>,
    calls: DashMap<Op, u64>,
    next_id: AtomicU64,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            profiles: DashMap::new(),
            predictions: RwLock::new(Vec::new()),
            session: RwLock::new(None),
            corrupt_session: AtomicBool::new(false),
            auth_events: SubscriberHub::new(),
            data_events: SubscriberHub::new(),
            sticky_faults: DashMap::new(),
            queued_faults: DashMap::new(),
            calls: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    // ─── Seeding ─────────────────────────────────────────────────

    /// Register an account with a stored profile.
    pub fn with_account(self, email: &str, password: &str, profile: Profile) -> Self {
        self.accounts.insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user_id: profile.id.clone(),
            },
        );
        self.profiles.insert(profile.id.clone(), profile);
        self
    }

    pub fn with_profile(self, profile: Profile) -> Self {
        self.profiles.insert(profile.id.clone(), profile);
        self
    }

    pub fn with_predictions(mut self, predictions: Vec<Prediction>) -> Self {
        *self.predictions.get_mut() = predictions;
        self
    }

    /// Start with a persisted session, as if restored from storage.
    pub fn with_persisted_session(mut self, session: Session) -> Self {
        *self.session.get_mut() = Some(session);
        self
    }

    /// Make the persisted credential unreadable until the next sign-out.
    pub fn with_corrupt_session(self) -> Self {
        self.corrupt_session.store(true, Ordering::SeqCst);
        self
    }

    // ─── Test controls ───────────────────────────────────────────

    /// Apply `fault` to every call of `op` until changed.
    pub fn set_fault(&self, op: Op, fault: Fault) {
        self.sticky_faults.insert(op, fault);
    }

    /// Apply `fault` to the next call of `op` only (queued after earlier ones).
    pub fn push_fault_once(&self, op: Op, fault: Fault) {
        self.queued_faults.entry(op).or_default().push_back(fault);
    }

    /// Number of times `op` has been invoked.
    pub fn calls(&self, op: Op) -> u64 {
        self.calls.get(&op).map(|c| *c).unwrap_or(0)
    }

    /// Deliver an auth event as if the provider emitted it.
    pub fn emit_auth_event(&self, event: AuthEvent) {
        self.auth_events.publish(event);
    }

    /// Deliver a change notification as if another client wrote a row.
    pub fn emit_data_change(&self) {
        self.data_events.publish(DataChange::default());
    }

    /// Simulate the push channel dropping: all data subscribers see their
    /// stream end.
    pub fn disconnect_data_channel(&self) {
        self.data_events.close_all();
    }

    pub fn auth_subscriber_count(&self) -> usize {
        self.auth_events.subscriber_count()
    }

    pub fn data_subscriber_count(&self) -> usize {
        self.data_events.subscriber_count()
    }

    /// Overwrite a stored profile without emitting any event.
    pub fn put_profile(&self, profile: Profile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Issue a fresh token for the current session and announce it.
    pub async fn refresh_token(&self) -> Option<Session> {
        let mut guard = self.session.write().await;
        let current = guard.as_ref()?;
        let refreshed = self.issue_session(current.user.clone());
        *guard = Some(refreshed.clone());
        drop(guard);
        self.auth_events
            .publish(AuthEvent::token_refreshed(refreshed.clone()));
        Some(refreshed)
    }

    // ─── Internals ───────────────────────────────────────────────

    async fn enter(&self, op: Op) -> GatewayResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;

        let queued = self
            .queued_faults
            .get_mut(&op)
            .and_then(|mut q| q.pop_front());
        let fault = queued.unwrap_or_else(|| {
            self.sticky_faults
                .get(&op)
                .map(|f| *f)
                .unwrap_or_default()
        });

        match fault {
            Fault::None => Ok(()),
            Fault::Fail => Err(GatewayError::Transport(format!("injected failure in {:?}", op))),
            Fault::Hang => std::future::pending().await,
            Fault::Delay(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
        }
    }

    fn issue_session(&self, user: SessionUser) -> Session {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        Session {
            access_token: format!("mem-{}-{}", user.id, n),
            refresh_token: Some(format!("mem-refresh-{}", n)),
            expires_at: Some(Utc::now().timestamp() + 3600),
            user,
        }
    }

    fn current_session_for(&self, session: &Option<Session>, user_id: &str) -> Option<Session> {
        session.as_ref().filter(|s| s.user.id == user_id).cloned()
    }
}

impl RemoteGateway for InMemoryGateway {
    async fn get_session(&self) -> GatewayResult<Option<Session>> {
        self.enter(Op::GetSession).await?;
        if self.corrupt_session.load(Ordering::SeqCst) {
            return Err(GatewayError::CorruptSession(
                "stored session could not be decoded".to_string(),
            ));
        }
        Ok(self.session.read().await.clone())
    }

    fn on_auth_event(&self) -> Subscription<AuthEvent> {
        self.auth_events.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Session> {
        self.enter(Op::SignIn).await?;
        let user_id = match self.accounts.get(&email.to_lowercase()) {
            Some(account) if account.password == password => account.user_id.clone(),
            _ => return Err(GatewayError::InvalidCredentials),
        };

        let session = self.issue_session(SessionUser {
            id: user_id,
            email: Some(email.to_string()),
        });
        *self.session.write().await = Some(session.clone());
        self.corrupt_session.store(false, Ordering::SeqCst);
        self.auth_events.publish(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> GatewayResult<Option<Session>> {
        self.enter(Op::SignIn).await?;
        let key = email.to_lowercase();
        if self.accounts.contains_key(&key) {
            return Err(GatewayError::Rejected {
                status: 422,
                message: "User already registered".to_string(),
            });
        }

        let user_id = format!("user-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.accounts.insert(
            key,
            Account {
                password: password.to_string(),
                user_id: user_id.clone(),
            },
        );
        self.profiles.insert(
            user_id.clone(),
            Profile {
                id: user_id.clone(),
                email: email.to_string(),
                is_admin: false,
                subscription_status: SubscriptionStatus::None,
                billing_customer_ref: None,
            },
        );

        let session = self.issue_session(SessionUser {
            id: user_id,
            email: Some(email.to_string()),
        });
        *self.session.write().await = Some(session.clone());
        self.auth_events.publish(AuthEvent::signed_in(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        self.enter(Op::SignOut).await?;
        *self.session.write().await = None;
        self.corrupt_session.store(false, Ordering::SeqCst);
        self.auth_events.publish(AuthEvent::signed_out());
        Ok(())
    }

    async fn fetch_profile(&self, user_id: &str) -> GatewayResult<Option<Profile>> {
        self.enter(Op::FetchProfile).await?;
        Ok(self.profiles.get(user_id).map(|p| p.clone()))
    }

    async fn list_items(&self) -> GatewayResult<Vec<Prediction>> {
        self.enter(Op::ListItems).await?;
        let mut items = self.predictions.read().await.clone();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn create_item(&self, draft: NewPrediction) -> GatewayResult<Prediction> {
        self.enter(Op::WriteItem).await?;
        let id = format!("pred-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let prediction = Prediction::publish(id, format_utc_rfc3339(Utc::now()), draft);
        self.predictions.write().await.insert(0, prediction.clone());
        self.data_events.publish(DataChange {
            record_id: Some(prediction.id.clone()),
        });
        Ok(prediction)
    }

    async fn update_item(&self, id: &str, update: PredictionUpdate) -> GatewayResult<()> {
        self.enter(Op::WriteItem).await?;
        {
            let mut items = self.predictions.write().await;
            let item = items
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| GatewayError::NotFound(format!("Prediction {}", id)))?;
            item.apply_update(&update);
        }
        self.data_events.publish(DataChange {
            record_id: Some(id.to_string()),
        });
        Ok(())
    }

    async fn delete_item(&self, id: &str) -> GatewayResult<()> {
        self.enter(Op::WriteItem).await?;
        {
            let mut items = self.predictions.write().await;
            let before = items.len();
            items.retain(|p| p.id != id);
            if items.len() == before {
                return Err(GatewayError::NotFound(format!("Prediction {}", id)));
            }
        }
        self.data_events.publish(DataChange {
            record_id: Some(id.to_string()),
        });
        Ok(())
    }

    async fn settle_item(&self, id: &str, settlement: Settlement) -> GatewayResult<()> {
        self.enter(Op::WriteItem).await?;
        {
            let mut items = self.predictions.write().await;
            let item = items
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| GatewayError::NotFound(format!("Prediction {}", id)))?;
            item.apply_settlement(&settlement);
        }
        self.data_events.publish(DataChange {
            record_id: Some(id.to_string()),
        });
        Ok(())
    }

    fn on_data_change(&self) -> Subscription<DataChange> {
        self.data_events.subscribe()
    }
}

impl BillingStore for InMemoryGateway {
    async fn activate_subscription(
        &self,
        user_id: &str,
        customer_ref: Option<&str>,
    ) -> GatewayResult<()> {
        {
            let mut profile = self
                .profiles
                .get_mut(user_id)
                .ok_or_else(|| GatewayError::NotFound(format!("Profile {}", user_id)))?;
            profile.subscription_status = SubscriptionStatus::Active;
            if let Some(customer_ref) = customer_ref {
                profile.billing_customer_ref = Some(customer_ref.to_string());
            }
        }

        let session = self.session.read().await;
        if let Some(session) = self.current_session_for(&session, user_id) {
            self.auth_events.publish(AuthEvent::user_updated(session));
        }
        Ok(())
    }

    async fn deactivate_subscription(&self, customer_ref: &str) -> GatewayResult<()> {
        let mut affected = Vec::new();
        for mut profile in self.profiles.iter_mut() {
            if profile.billing_customer_ref.as_deref() == Some(customer_ref) {
                profile.subscription_status = SubscriptionStatus::Inactive;
                affected.push(profile.id.clone());
            }
        }

        let session = self.session.read().await;
        for user_id in affected {
            if let Some(session) = self.current_session_for(&session, &user_id) {
                self.auth_events.publish(AuthEvent::user_updated(session));
            }
        }
        Ok(())
    }
}
