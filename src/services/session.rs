// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session reconciliation: who the user is, kept consistent across the
//! startup bootstrap, the auth-event stream and explicit calls.
//!
//! Two tasks race at startup: the bootstrap (`get_session` then profile
//! fetch) and the auth-event listener. Arbitration rules:
//! - Once the listener has delivered anything, it owns the state; the
//!   bootstrap only ever fills in state the listener has not touched.
//! - The bootstrap never clears a stored credential the listener has
//!   already confirmed.
//! - Every profile write is tagged with the sign-out epoch it started in
//!   and dropped if a sign-out happened meanwhile.
//!
//! Deadlines: each profile fetch is bounded and falls back to a minimal
//! profile; startup as a whole is bounded and falls back to guest mode.

use crate::config::AuthTimeouts;
use crate::error::GatewayError;
use crate::gateway::{RemoteGateway, Subscription};
use crate::models::{AuthEvent, AuthEventKind, Profile, Session};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;

/// Lifecycle of the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPhase {
    #[default]
    Uninitialized,
    Initializing,
    Authenticated,
    Anonymous,
}

/// Full reconciler state, as published to observers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthSnapshot {
    pub phase: AuthPhase,
    pub session: Option<Session>,
    /// Always `Some` while `session` is `Some`.
    pub profile: Option<Profile>,
    /// The auth-event stream has delivered at least one event.
    pub listener_established: bool,
    /// Bumped on every sign-out.
    epoch: u64,
    /// Subject of the most recent session-bearing auth event.
    target: Option<String>,
    /// Bumped whenever the listener starts a profile fetch.
    fetch_seq: u64,
}

impl AuthSnapshot {
    pub fn loading(&self) -> bool {
        self.phase == AuthPhase::Initializing
    }

    pub fn view(&self) -> AuthView {
        AuthView {
            user: self.profile.clone(),
            loading: self.loading(),
        }
    }

    fn establish(&mut self, session: Session, fetched: Option<Profile>) {
        let retained = self
            .profile
            .take()
            .filter(|p| p.id == session.user.id);
        let profile = fetched
            .or(retained)
            .unwrap_or_else(|| Profile::synthesized(&session));
        self.session = Some(session);
        self.profile = Some(profile);
        self.phase = AuthPhase::Authenticated;
    }

    fn clear(&mut self) {
        self.session = None;
        self.profile = None;
        self.phase = AuthPhase::Anonymous;
        self.target = None;
        self.epoch += 1;
    }
}

/// The stable view consumers render from.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthView {
    pub user: Option<Profile>,
    pub loading: bool,
}

struct Shared<G> {
    gateway: Arc<G>,
    timeouts: AuthTimeouts,
    state: watch::Sender<AuthSnapshot>,
    active: AtomicBool,
}

impl<G: RemoteGateway> Shared<G> {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Mutate state unless torn down. `f` returns whether anything changed.
    fn update(&self, f: impl FnOnce(&mut AuthSnapshot) -> bool) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state.send_if_modified(f)
    }

    /// Fetch the stored profile within the deadline. `None` means "use a
    /// fallback"; the reason has already been logged.
    async fn fetch_profile_bounded(&self, session: &Session) -> Option<Profile> {
        let user_id = session.subject();
        let deadline = self.timeouts.profile_fetch;
        let result = timeout(deadline, self.gateway.fetch_profile(user_id))
            .await
            .unwrap_or(Err(GatewayError::Timeout(deadline)));
        match result {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "Profile record missing, using minimal profile");
                None
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Profile fetch failed, using fallback");
                None
            }
        }
    }

    async fn bootstrap(self: Arc<Self>) {
        let epoch = self.state.borrow().epoch;

        match self.gateway.get_session().await {
            Ok(Some(session)) => {
                if self.state.borrow().listener_established {
                    tracing::debug!("Auth listener already settled state, skipping bootstrap session");
                    return;
                }
                let fetched = self.fetch_profile_bounded(&session).await;
                let applied = self.update(|s| {
                    if s.listener_established || s.epoch != epoch {
                        return false;
                    }
                    s.establish(session, fetched);
                    true
                });
                if applied {
                    tracing::info!("Restored session from storage");
                }
            }
            Ok(None) => self.settle_guest(epoch),
            Err(e) if e.is_corrupt_session() => {
                let confirmed = {
                    let s = self.state.borrow();
                    s.listener_established && s.session.is_some()
                };
                if confirmed {
                    tracing::warn!(
                        error = %e,
                        "Stored session unreadable but listener holds a valid session, not clearing"
                    );
                    return;
                }

                tracing::error!(error = %e, "Detected corrupt stored session, clearing it");
                if let Err(e) = self.gateway.sign_out().await {
                    tracing::warn!(error = %e, "Failed to clear corrupt session remotely");
                }
                self.settle_guest(epoch);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session retrieval failed, continuing as guest");
                self.settle_guest(epoch);
            }
        }
    }

    /// Finish startup as a guest, unless the listener or a sign-out has
    /// already decided.
    fn settle_guest(&self, epoch: u64) {
        self.update(|s| {
            if s.listener_established || s.epoch != epoch || s.phase != AuthPhase::Initializing {
                return false;
            }
            s.phase = AuthPhase::Anonymous;
            true
        });
    }

    async fn safety_timer(self: Arc<Self>) {
        tokio::time::sleep(self.timeouts.init_safety).await;
        let forced = self.update(|s| {
            if s.phase != AuthPhase::Initializing {
                return false;
            }
            s.phase = AuthPhase::Anonymous;
            true
        });
        if forced {
            tracing::warn!(
                timeout_ms = self.timeouts.init_safety.as_millis() as u64,
                "Auth initialization timed out, forcing guest mode"
            );
        }
    }

    /// Profile fetches run off the event loop so a later event, sign-out
    /// in particular, is applied as soon as it arrives.
    async fn listen(self: Arc<Self>, mut events: Subscription<AuthEvent>) {
        let mut fetches = JoinSet::new();
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if !self.is_active() {
                        break;
                    }
                    self.handle_event(event, &mut fetches);
                }
                Some(_) = fetches.join_next(), if !fetches.is_empty() => {}
            }
        }
        tracing::debug!("Auth event stream ended");
    }

    fn handle_event(self: &Arc<Self>, event: AuthEvent, fetches: &mut JoinSet<()>) {
        tracing::debug!(kind = ?event.kind, "Auth event");

        let session = match (event.kind, event.session) {
            (AuthEventKind::SignedOut, _) | (_, None) => {
                self.update(|s| {
                    s.listener_established = true;
                    s.clear();
                    true
                });
                return;
            }
            (_, Some(session)) => session,
        };

        let mut held_subject = None;
        self.update(|s| {
            held_subject = s.profile.as_ref().map(|p| p.id.clone());
            s.target = Some(session.subject().to_string());
            let first = !s.listener_established;
            s.listener_established = true;
            first
        });

        // Token refreshes keep the held profile; the subject rarely changes
        // but if it does this is a different user.
        let needs_fetch = match event.kind {
            AuthEventKind::UserUpdated => true,
            AuthEventKind::SignedIn | AuthEventKind::TokenRefreshed => {
                held_subject.as_deref() != Some(session.subject())
            }
            AuthEventKind::SignedOut => false,
        };

        if !needs_fetch {
            self.update(|s| apply_event_session(s, session, None));
            return;
        }

        let mut ticket = (0, 0);
        self.update(|s| {
            s.fetch_seq += 1;
            ticket = (s.epoch, s.fetch_seq);
            false
        });
        let (epoch, seq) = ticket;

        let shared = Arc::clone(self);
        fetches.spawn(async move {
            let fetched = shared.fetch_profile_bounded(&session).await;
            shared.update(|s| {
                let superseded = s.epoch != epoch
                    || s.fetch_seq != seq
                    || s.target.as_deref() != Some(session.subject());
                if superseded {
                    tracing::debug!(user_id = %session.subject(), "Discarding superseded profile fetch");
                    return false;
                }
                apply_event_session(s, session, fetched)
            });
        });
    }
}

/// Establish `session` from an auth event. Returns whether anything changed.
fn apply_event_session(s: &mut AuthSnapshot, session: Session, fetched: Option<Profile>) -> bool {
    let before = (s.session.clone(), s.profile.clone(), s.phase);
    s.establish(session, fetched);
    before != (s.session.clone(), s.profile.clone(), s.phase)
}

/// Owns the current session and profile.
///
/// Must be started inside a tokio runtime. Dropping the reconciler (or
/// calling [`SessionReconciler::shutdown`]) unsubscribes from the auth
/// stream and discards any late results.
pub struct SessionReconciler<G: RemoteGateway> {
    shared: Arc<Shared<G>>,
    tasks: JoinSet<()>,
}

impl<G: RemoteGateway> SessionReconciler<G> {
    /// Begin initialization: register the auth listener, start the
    /// bootstrap and arm the safety timer, all concurrently.
    pub fn start(gateway: Arc<G>, timeouts: AuthTimeouts) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::default());
        state.send_modify(|s| s.phase = AuthPhase::Initializing);

        let shared = Arc::new(Shared {
            gateway,
            timeouts,
            state,
            active: AtomicBool::new(true),
        });

        // Register before bootstrapping so no event is missed.
        let events = shared.gateway.on_auth_event();

        let mut tasks = JoinSet::new();
        tasks.spawn(Arc::clone(&shared).listen(events));
        tasks.spawn(Arc::clone(&shared).bootstrap());
        tasks.spawn(Arc::clone(&shared).safety_timer());

        Self { shared, tasks }
    }

    pub fn view(&self) -> AuthView {
        self.shared.state.borrow().view()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn user(&self) -> Option<Profile> {
        self.shared.state.borrow().profile.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.shared.state.borrow().session.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().loading()
    }

    /// Watch for state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.shared.state.subscribe()
    }

    /// Wait until initialization has finished one way or another.
    pub async fn settled(&self) -> AuthView {
        let mut rx = self.subscribe();
        let view = match rx.wait_for(|s| !s.loading()).await {
            Ok(s) => s.view(),
            Err(_) => self.view(),
        };
        view
    }

    /// Password sign-in. Failures are returned to the caller; the
    /// resulting state change arrives through the auth stream.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, GatewayError> {
        let session = self.shared.gateway.sign_in(email, password).await?;
        tracing::info!(user_id = %session.subject(), "Sign-in accepted");
        Ok(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, GatewayError> {
        let session = self.shared.gateway.sign_up(email, password).await?;
        tracing::info!(confirmed = session.is_some(), "Sign-up accepted");
        Ok(session)
    }

    /// Sign out. Local state is cleared even when the remote call fails;
    /// the remote error is still reported.
    pub async fn sign_out(&self) -> Result<(), GatewayError> {
        let result = self.shared.gateway.sign_out().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Remote sign-out failed, clearing local session anyway");
        }
        self.shared.update(|s| {
            s.clear();
            true
        });
        result
    }

    /// Re-fetch the profile for the held session. No-op without a session.
    ///
    /// On failure the last known profile for this user is kept.
    pub async fn refresh_profile(&self) -> Option<Profile> {
        let (session, epoch) = {
            let s = self.shared.state.borrow();
            (s.session.clone()?, s.epoch)
        };

        let fetched = self.shared.fetch_profile_bounded(&session).await;
        self.shared.update(|s| {
            let same_subject = s.session.as_ref().map(Session::subject) == Some(session.subject());
            if s.epoch != epoch || !same_subject {
                return false;
            }
            let before = s.profile.clone();
            let current = s.session.clone().unwrap_or(session);
            s.establish(current, fetched);
            before != s.profile
        });

        self.user()
    }

    /// Unsubscribe and stop all background work. Later results are dropped.
    pub async fn shutdown(&mut self) {
        self.shared.active.store(false, Ordering::SeqCst);
        self.tasks.shutdown().await;
    }
}

impl<G: RemoteGateway> Drop for SessionReconciler<G> {
    fn drop(&mut self) {
        self.shared.active.store(false, Ordering::SeqCst);
        self.tasks.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionUser, SubscriptionStatus};

    fn session(user_id: &str) -> Session {
        Session {
            access_token: format!("tok-{}", user_id),
            refresh_token: None,
            expires_at: None,
            user: SessionUser {
                id: user_id.to_string(),
                email: Some(format!("{}@x.io", user_id)),
            },
        }
    }

    fn stored(user_id: &str) -> Profile {
        Profile {
            id: user_id.to_string(),
            email: format!("{}@x.io", user_id),
            is_admin: false,
            subscription_status: SubscriptionStatus::Active,
            billing_customer_ref: None,
        }
    }

    #[test]
    fn test_establish_keeps_profile_for_same_subject() {
        let mut s = AuthSnapshot::default();
        s.establish(session("a"), Some(stored("a")));
        s.establish(session("a"), None);
        assert_eq!(s.profile, Some(stored("a")));
        assert_eq!(s.phase, AuthPhase::Authenticated);
    }

    #[test]
    fn test_establish_synthesizes_for_new_subject() {
        let mut s = AuthSnapshot::default();
        s.establish(session("a"), Some(stored("a")));
        s.establish(session("b"), None);
        let profile = s.profile.unwrap();
        assert_eq!(profile.id, "b");
        assert_eq!(profile.subscription_status, SubscriptionStatus::None);
    }

    #[test]
    fn test_clear_bumps_epoch() {
        let mut s = AuthSnapshot::default();
        s.establish(session("a"), None);
        s.clear();
        assert_eq!(s.epoch, 1);
        assert!(s.session.is_none() && s.profile.is_none());
        assert_eq!(s.view().user, None);
        assert!(!s.view().loading);
    }
}
