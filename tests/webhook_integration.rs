// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests for billing webhook handling.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{create_test_app, create_test_app_with_config, profile};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;
use vegasvault::config::{AuthTimeouts, Config};
use vegasvault::gateway::{InMemoryGateway, RemoteGateway};
use vegasvault::models::{Profile, SubscriptionStatus};
use vegasvault::routes::webhook::SIGNATURE_HEADER;
use vegasvault::services::billing::sign_payload;
use vegasvault::services::SessionReconciler;

fn secret() -> String {
    Config::test_default()
        .webhook_signing_secret
        .expect("test config has a signing secret")
}

fn signed_request(body: &serde_json::Value) -> Request<Body> {
    let payload = serde_json::to_vec(body).unwrap();
    let header = sign_payload(&payload, chrono::Utc::now().timestamp(), &secret());
    Request::builder()
        .method("POST")
        .uri("/api/webhook")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, header)
        .body(Body::from(payload))
        .unwrap()
}

fn checkout_completed(user_id: &str, customer: &str) -> serde_json::Value {
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "customer": customer,
            "metadata": { "user_id": user_id }
        }}
    })
}

async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_checkout_completed_activates_subscription() {
    let (app, gw) = create_test_app(
        InMemoryGateway::new().with_profile(profile("u-1", SubscriptionStatus::None)),
    );

    let response = app
        .oneshot(signed_request(&checkout_completed("u-1", "cus_123")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["received"], true);

    let stored = gw.fetch_profile("u-1").await.unwrap().unwrap();
    assert_eq!(stored.subscription_status, SubscriptionStatus::Active);
    assert_eq!(stored.billing_customer_ref.as_deref(), Some("cus_123"));
}

#[tokio::test]
async fn test_subscription_deleted_deactivates() {
    let (app, gw) = create_test_app(InMemoryGateway::new().with_profile(Profile {
        billing_customer_ref: Some("cus_123".to_string()),
        ..profile("u-1", SubscriptionStatus::Active)
    }));

    let event = json!({
        "type": "customer.subscription.deleted",
        "data": { "object": { "id": "sub_1", "customer": "cus_123" } }
    });
    let response = app.oneshot(signed_request(&event)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = gw.fetch_profile("u-1").await.unwrap().unwrap();
    assert_eq!(stored.subscription_status, SubscriptionStatus::Inactive);
}

#[tokio::test]
async fn test_unhandled_event_acknowledged() {
    let (app, _gw) = create_test_app(InMemoryGateway::new());

    let event = json!({
        "type": "invoice.paid",
        "data": { "object": { "customer": "cus_123" } }
    });
    let response = app.oneshot(signed_request(&event)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bad_signature_rejected() {
    let (app, gw) = create_test_app(
        InMemoryGateway::new().with_profile(profile("u-1", SubscriptionStatus::None)),
    );

    let payload = serde_json::to_vec(&checkout_completed("u-1", "cus_123")).unwrap();
    let forged = sign_payload(&payload, chrono::Utc::now().timestamp(), "whsec_wrong");
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/webhook")
                .header(SIGNATURE_HEADER, forged)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.starts_with("Webhook Error:"));

    let stored = gw.fetch_profile("u-1").await.unwrap().unwrap();
    assert_eq!(stored.subscription_status, SubscriptionStatus::None);
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let (app, _gw) = create_test_app(InMemoryGateway::new());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/webhook")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_replayed_delivery_rejected() {
    let (app, _gw) = create_test_app(InMemoryGateway::new());

    let payload = serde_json::to_vec(&checkout_completed("u-1", "cus_123")).unwrap();
    let old = sign_payload(&payload, chrono::Utc::now().timestamp() - 3600, &secret());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/webhook")
                .header(SIGNATURE_HEADER, old)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_in_client_sees_activation() {
    let (app, gw) = create_test_app(InMemoryGateway::new().with_account(
        "u-1@example.com",
        "pw",
        profile("u-1", SubscriptionStatus::None),
    ));
    let reconciler = SessionReconciler::start(Arc::clone(&gw), AuthTimeouts::default());
    reconciler.settled().await;
    reconciler.sign_in("u-1@example.com", "pw").await.unwrap();
    common::wait_for_auth(&reconciler, |s| s.profile.is_some()).await;

    let response = app
        .oneshot(signed_request(&checkout_completed("u-1", "cus_9")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot = common::wait_for_auth(&reconciler, |s| {
        s.profile
            .as_ref()
            .is_some_and(Profile::has_active_subscription)
    })
    .await;
    assert_eq!(
        snapshot.profile.and_then(|p| p.billing_customer_ref),
        Some("cus_9".to_string())
    );
}

#[tokio::test]
async fn test_checkout_missing_parameters() {
    let (app, _gw) = create_test_app(InMemoryGateway::new());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/create-checkout-session")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_string(&json!({ "priceId": "price_test", "userId": "u-1" }))
                        .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_health() {
    let (app, _gw) = create_test_app(InMemoryGateway::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_unconfigured_secret_rejected() {
    let mut config = Config::test_default();
    config.webhook_signing_secret = None;
    let (app, gw) = create_test_app_with_config(
        config,
        InMemoryGateway::new().with_profile(profile("u-1", SubscriptionStatus::None)),
    );

    let event = json!({
        "type": "checkout.session.completed",
        "data": { "object": { "customer": "cus_1", "metadata": { "user_id": "u-1" } } }
    });
    let response = app.oneshot(signed_request(&event)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.starts_with("Webhook Error:"));
    let stored = gw.fetch_profile("u-1").await.unwrap().unwrap();
    assert_eq!(stored.subscription_status, SubscriptionStatus::None);
}

#[tokio::test]
async fn test_payment_config_exposes_public_settings() {
    let (app, _gw) = create_test_app(InMemoryGateway::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/payment-config")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["publishableKey"], "pk_test_local");
    assert_eq!(json["priceId"], "price_test");
    assert!(json.get("secretKey").is_none());
}
