// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Billing webhook: signature verification and subscription updates.
//!
//! The provider signs each delivery with a header of the form
//! `t=<unix seconds>,v1=<hex hmac>` where the HMAC-SHA256 covers
//! `"<t>.<raw body>"`. Several `v1` entries may be present during secret
//! rotation; any match is accepted.

use crate::gateway::{BillingStore, GatewayResult};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age (and clock skew) accepted for a signed delivery.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing signature header")]
    MissingHeader,
    #[error("Unable to extract timestamp and signatures from header")]
    Malformed,
    #[error("Timestamp outside the tolerance zone")]
    Expired,
    #[error("No signatures found matching the expected signature for payload")]
    Mismatch,
    #[error("Webhook signing secret not configured")]
    NotConfigured,
}

/// Verify a signed delivery against `secret` at time `now` (unix seconds).
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => {
                if let Ok(sig) = hex::decode(value) {
                    candidates.push(sig);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }

    let expected = compute_signature(payload, timestamp, secret)?;
    let matched = candidates
        .iter()
        .any(|sig| sig.len() == expected.len() && bool::from(sig.as_slice().ct_eq(&expected)));
    if !matched {
        return Err(SignatureError::Mismatch);
    }

    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    Ok(())
}

/// Build a signature header for `payload`, as the provider would.
pub fn sign_payload(payload: &[u8], timestamp: i64, secret: &str) -> String {
    match compute_signature(payload, timestamp, secret) {
        Ok(sig) => format!("t={},v1={}", timestamp, hex::encode(sig)),
        Err(_) => format!("t={}", timestamp),
    }
}

fn compute_signature(payload: &[u8], timestamp: i64, secret: &str) -> Result<Vec<u8>, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::NotConfigured)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Billing events this app acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    CheckoutCompleted {
        user_id: Option<String>,
        customer_ref: Option<String>,
    },
    SubscriptionDeleted {
        customer_ref: Option<String>,
    },
    Ignored(String),
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: RawObject,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawObject {
    customer: Option<String>,
    metadata: Option<RawMetadata>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawMetadata {
    user_id: Option<String>,
}

impl BillingEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawEvent = serde_json::from_slice(payload)?;
        let object = raw.data.object;
        Ok(match raw.kind.as_str() {
            "checkout.session.completed" => BillingEvent::CheckoutCompleted {
                user_id: object.metadata.and_then(|m| m.user_id),
                customer_ref: object.customer,
            },
            "customer.subscription.deleted" => BillingEvent::SubscriptionDeleted {
                customer_ref: object.customer,
            },
            _ => BillingEvent::Ignored(raw.kind.clone()),
        })
    }
}

/// Apply `event` to the stored profiles.
pub async fn apply_event<B: BillingStore>(store: &B, event: &BillingEvent) -> GatewayResult<()> {
    match event {
        BillingEvent::CheckoutCompleted {
            user_id: Some(user_id),
            customer_ref,
        } => {
            store
                .activate_subscription(user_id, customer_ref.as_deref())
                .await?;
            tracing::info!(user_id = %user_id, "Subscription activated");
        }
        BillingEvent::CheckoutCompleted { user_id: None, .. } => {
            tracing::warn!("Checkout completed without a user id in metadata, ignoring");
        }
        BillingEvent::SubscriptionDeleted {
            customer_ref: Some(customer_ref),
        } => {
            store.deactivate_subscription(customer_ref).await?;
            tracing::info!(customer_ref = %customer_ref, "Subscription cancelled");
        }
        BillingEvent::SubscriptionDeleted { customer_ref: None } => {
            tracing::warn!("Subscription deletion without a customer ref, ignoring");
        }
        BillingEvent::Ignored(kind) => {
            tracing::debug!(kind = %kind, "Ignoring billing event");
        }
    }
    Ok(())
}
