// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth session and push-notification event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity carried by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Auth subject id (also the profile key)
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Credential issued by the auth provider.
///
/// Opaque to the app: replaced wholesale on every auth event, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

impl Session {
    pub fn subject(&self) -> &str {
        &self.user.id
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now.timestamp())
    }
}

/// Kind of auth state change reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// One delivery on the auth-event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn signed_in(session: Session) -> Self {
        Self {
            kind: AuthEventKind::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: AuthEventKind::SignedOut,
            session: None,
        }
    }

    pub fn token_refreshed(session: Session) -> Self {
        Self {
            kind: AuthEventKind::TokenRefreshed,
            session: Some(session),
        }
    }

    pub fn user_updated(session: Session) -> Self {
        Self {
            kind: AuthEventKind::UserUpdated,
            session: Some(session),
        }
    }
}

/// "Something changed" notification on the predictions collection.
///
/// Carries no payload guarantee; consumers always reload in full.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataChange {
    pub record_id: Option<String>,
}
