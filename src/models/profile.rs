// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile model.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::Session;

/// Billing state of a user's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    #[default]
    None,
}

/// User profile stored in the `profiles` collection (keyed by auth subject id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    /// Payment processor customer id, set by the billing webhook
    #[serde(
        rename = "stripe_customer_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub billing_customer_ref: Option<String>,
}

impl Profile {
    /// Minimal profile used when the stored record is missing or unreachable.
    ///
    /// Never grants admin rights or an active subscription.
    pub fn synthesized(session: &Session) -> Self {
        Self {
            id: session.user.id.clone(),
            email: session.user.email.clone().unwrap_or_default(),
            is_admin: false,
            subscription_status: SubscriptionStatus::None,
            billing_customer_ref: None,
        }
    }

    pub fn has_active_subscription(&self) -> bool {
        self.subscription_status == SubscriptionStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionUser;

    #[test]
    fn test_synthesized_profile_is_unprivileged() {
        let session = Session {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: None,
            user: SessionUser {
                id: "u-1".to_string(),
                email: None,
            },
        };
        let profile = Profile::synthesized(&session);
        assert_eq!(profile.id, "u-1");
        assert_eq!(profile.email, "");
        assert!(!profile.is_admin);
        assert_eq!(profile.subscription_status, SubscriptionStatus::None);
        assert!(!profile.has_active_subscription());
    }

    #[test]
    fn test_deserialize_sparse_row() {
        let profile: Profile = serde_json::from_str(r#"{"id":"u-2"}"#).unwrap();
        assert_eq!(profile.subscription_status, SubscriptionStatus::None);
        assert!(profile.billing_customer_ref.is_none());
    }
}
