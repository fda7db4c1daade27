// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP adapter for a hosted auth + REST backend.
//!
//! Handles:
//! - Password sign-in/sign-up/sign-out and refresh-token exchange
//! - Restoring (and validating) a session persisted to disk
//! - Row reads/writes on `profiles` and `predictions`
//! - Privileged profile updates for billing (service key)
//!
//! The backend's realtime transport is not spoken here: change
//! notifications are published for writes made through this adapter, and an
//! external push bridge can feed more via [`RestGateway::notify_data_change`].

use super::{
    collections, BillingStore, GatewayResult, RemoteGateway, SubscriberHub, Subscription,
};
use crate::config::Config;
use crate::error::GatewayError;
use crate::models::{
    AuthEvent, DataChange, NewPrediction, Prediction, PredictionStatus, PredictionUpdate,
    Profile, Session, SessionUser, Settlement, SubscriptionStatus,
};
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Claims we rely on from the provider's access token.
#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: String,
}

/// Token grant response from the auth API.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthUserResponse,
}

#[derive(Debug, Deserialize)]
struct AuthUserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Body for creating a prediction row.
#[derive(Serialize)]
struct InsertPrediction<'a> {
    #[serde(flatten)]
    draft: &'a NewPrediction,
    status: PredictionStatus,
}

#[derive(Serialize)]
struct ProfileBillingPatch<'a> {
    subscription_status: SubscriptionStatus,
    #[serde(rename = "stripe_customer_id", skip_serializing_if = "Option::is_none")]
    billing_customer_ref: Option<&'a str>,
}

/// [`RemoteGateway`] over HTTP.
pub struct RestGateway {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_key: Option<String>,
    session_file: Option<PathBuf>,
    /// `None` until the persisted session has been read once.
    session: RwLock<Option<Option<Session>>>,
    auth_events: SubscriberHub<AuthEvent>,
    data_events: SubscriberHub<DataChange>,
}

impl RestGateway {
    pub fn new(config: &Config) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed building HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.backend_anon_key.clone(),
            service_key: config.backend_service_key.clone(),
            session_file: config.session_file.clone(),
            session: RwLock::new(None),
            auth_events: SubscriberHub::new(),
            data_events: SubscriberHub::new(),
        })
    }

    /// Feed a change notification received from an external push bridge.
    pub fn notify_data_change(&self, change: DataChange) {
        self.data_events.publish(change);
    }

    // ─── Session persistence ─────────────────────────────────────

    /// Read and validate the persisted credential.
    async fn load_persisted(&self) -> GatewayResult<Option<Session>> {
        let Some(path) = &self.session_file else {
            return Ok(None);
        };

        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GatewayError::CorruptSession(e.to_string())),
        };

        let session: Session = serde_json::from_str(&raw)
            .map_err(|e| GatewayError::CorruptSession(format!("undecodable session: {}", e)))?;
        validate_access_token(&session)?;
        Ok(Some(session))
    }

    async fn persist(&self, session: Option<&Session>) {
        let Some(path) = &self.session_file else {
            return;
        };

        let result = match session {
            Some(session) => match serde_json::to_string(session) {
                Ok(json) => tokio::fs::write(path, json).await,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode session");
                    return;
                }
            },
            None => match tokio::fs::remove_file(path).await {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, path = %path.display(), "Failed to persist session");
        }
    }

    async fn store_session(&self, session: Option<Session>) {
        self.persist(session.as_ref()).await;
        *self.session.write().await = Some(session);
    }

    async fn refresh(&self, refresh_token: &str) -> GatewayResult<Session> {
        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(transport)?;

        match check_response_json::<TokenResponse>(response).await {
            Ok(token) => Ok(session_from_token(token)),
            Err(GatewayError::Rejected { status, message }) if status < 500 => Err(
                GatewayError::CorruptSession(format!("refresh token rejected: {}", message)),
            ),
            Err(e) => Err(e),
        }
    }

    // ─── Request helpers ─────────────────────────────────────────

    fn rest_url(&self, table: &str, query: &str) -> String {
        format!("{}/rest/v1/{}?{}", self.base_url, table, query)
    }

    /// Request authenticated as the current user (or anonymously).
    async fn user_request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let bearer = match self.session.read().await.as_ref() {
            Some(Some(session)) => session.access_token.clone(),
            _ => self.anon_key.clone(),
        };
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn service_request(&self, method: reqwest::Method, url: &str) -> GatewayResult<reqwest::RequestBuilder> {
        let key = self.service_key.as_ref().ok_or_else(|| GatewayError::Rejected {
            status: 401,
            message: "service key not configured".to_string(),
        })?;
        Ok(self
            .http
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(key))
    }

    async fn patch_prediction<T: Serialize + ?Sized>(&self, id: &str, body: &T) -> GatewayResult<()> {
        let url = self.rest_url(
            collections::PREDICTIONS,
            &format!("id=eq.{}", urlencoding::encode(id)),
        );
        let response = self
            .user_request(reqwest::Method::PATCH, &url)
            .await
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        let rows: Vec<Prediction> = check_response_json(response).await?;
        if rows.is_empty() {
            return Err(GatewayError::NotFound(format!("Prediction {}", id)));
        }
        self.data_events.publish(DataChange {
            record_id: Some(id.to_string()),
        });
        Ok(())
    }
}

impl RemoteGateway for RestGateway {
    async fn get_session(&self) -> GatewayResult<Option<Session>> {
        let cached = self.session.read().await.clone();
        let session = match cached {
            Some(session) => session,
            None => {
                let loaded = self.load_persisted().await?;
                *self.session.write().await = Some(loaded.clone());
                loaded
            }
        };

        let Some(session) = session else {
            return Ok(None);
        };
        if !session.is_expired_at(Utc::now()) {
            return Ok(Some(session));
        }

        let refresh_token = session.refresh_token.as_deref().ok_or_else(|| {
            GatewayError::CorruptSession("expired session without refresh token".to_string())
        })?;
        let refreshed = self.refresh(refresh_token).await?;
        self.store_session(Some(refreshed.clone())).await;
        self.auth_events
            .publish(AuthEvent::token_refreshed(refreshed.clone()));
        Ok(Some(refreshed))
    }

    fn on_auth_event(&self) -> Subscription<AuthEvent> {
        self.auth_events.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Session> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport)?;

        let token: TokenResponse = match check_response_json(response).await {
            Ok(token) => token,
            Err(GatewayError::Rejected { status: 400, .. }) => {
                return Err(GatewayError::InvalidCredentials)
            }
            Err(e) => return Err(e),
        };

        let session = session_from_token(token);
        self.store_session(Some(session.clone())).await;
        tracing::info!(user_id = %session.user.id, "Signed in");
        self.auth_events.publish(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> GatewayResult<Option<Session>> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport)?;

        let body: serde_json::Value = check_response_json(response).await?;
        if body.get("access_token").is_none() {
            tracing::info!("Sign-up pending email confirmation");
            return Ok(None);
        }

        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| GatewayError::Decode(e.to_string()))?;
        let session = session_from_token(token);
        self.store_session(Some(session.clone())).await;
        self.auth_events.publish(AuthEvent::signed_in(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let remote = match self.user_request(reqwest::Method::POST, &url).await.send().await {
            Ok(response) => check_response(response).await,
            Err(e) => Err(transport(e)),
        };

        // The local credential goes regardless of what the server said.
        self.store_session(None).await;
        self.auth_events.publish(AuthEvent::signed_out());
        remote
    }

    async fn fetch_profile(&self, user_id: &str) -> GatewayResult<Option<Profile>> {
        let url = self.rest_url(
            collections::PROFILES,
            &format!("id=eq.{}&select=*", urlencoding::encode(user_id)),
        );
        let response = self
            .user_request(reqwest::Method::GET, &url)
            .await
            .send()
            .await
            .map_err(transport)?;

        let rows: Vec<Profile> = check_response_json(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_items(&self) -> GatewayResult<Vec<Prediction>> {
        let url = self.rest_url(collections::PREDICTIONS, "select=*&order=created_at.desc");
        let response = self
            .user_request(reqwest::Method::GET, &url)
            .await
            .send()
            .await
            .map_err(transport)?;

        check_response_json(response).await
    }

    async fn create_item(&self, draft: NewPrediction) -> GatewayResult<Prediction> {
        let url = self.rest_url(collections::PREDICTIONS, "select=*");
        let body = InsertPrediction {
            draft: &draft,
            status: PredictionStatus::Pending,
        };
        let response = self
            .user_request(reqwest::Method::POST, &url)
            .await
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let rows: Vec<Prediction> = check_response_json(response).await?;
        let created = rows
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Decode("insert returned no rows".to_string()))?;
        self.data_events.publish(DataChange {
            record_id: Some(created.id.clone()),
        });
        Ok(created)
    }

    async fn update_item(&self, id: &str, update: PredictionUpdate) -> GatewayResult<()> {
        if update.status == Some(PredictionStatus::Pending) {
            let mut body = serde_json::to_value(&update)
                .map_err(|e| GatewayError::Decode(e.to_string()))?;
            body["result_score"] = serde_json::Value::Null;
            return self.patch_prediction(id, &body).await;
        }
        self.patch_prediction(id, &update).await
    }

    async fn delete_item(&self, id: &str) -> GatewayResult<()> {
        let url = self.rest_url(
            collections::PREDICTIONS,
            &format!("id=eq.{}", urlencoding::encode(id)),
        );
        let response = self
            .user_request(reqwest::Method::DELETE, &url)
            .await
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(transport)?;

        let rows: Vec<Prediction> = check_response_json(response).await?;
        if rows.is_empty() {
            return Err(GatewayError::NotFound(format!("Prediction {}", id)));
        }
        self.data_events.publish(DataChange {
            record_id: Some(id.to_string()),
        });
        Ok(())
    }

    async fn settle_item(&self, id: &str, settlement: Settlement) -> GatewayResult<()> {
        self.patch_prediction(id, &settlement).await
    }

    fn on_data_change(&self) -> Subscription<DataChange> {
        self.data_events.subscribe()
    }
}

impl BillingStore for RestGateway {
    async fn activate_subscription(
        &self,
        user_id: &str,
        customer_ref: Option<&str>,
    ) -> GatewayResult<()> {
        let url = self.rest_url(
            collections::PROFILES,
            &format!("id=eq.{}", urlencoding::encode(user_id)),
        );
        let body = ProfileBillingPatch {
            subscription_status: SubscriptionStatus::Active,
            billing_customer_ref: customer_ref,
        };
        let response = self
            .service_request(reqwest::Method::PATCH, &url)?
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        check_response(response).await
    }

    async fn deactivate_subscription(&self, customer_ref: &str) -> GatewayResult<()> {
        let url = self.rest_url(
            collections::PROFILES,
            &format!("stripe_customer_id=eq.{}", urlencoding::encode(customer_ref)),
        );
        let body = ProfileBillingPatch {
            subscription_status: SubscriptionStatus::Inactive,
            billing_customer_ref: None,
        };
        let response = self
            .service_request(reqwest::Method::PATCH, &url)?
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        check_response(response).await
    }
}

fn transport(e: reqwest::Error) -> GatewayError {
    GatewayError::Transport(e.to_string())
}

fn session_from_token(token: TokenResponse) -> Session {
    let expires_at = token
        .expires_at
        .or_else(|| token.expires_in.map(|secs| Utc::now().timestamp() + secs));
    Session {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at,
        user: SessionUser {
            id: token.user.id,
            email: token.user.email,
        },
    }
}

/// Check that the stored access token is a well-formed JWT issued for the
/// stored user. The signature is the provider's business, not ours.
fn validate_access_token(session: &Session) -> GatewayResult<()> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<AccessClaims>(
        &session.access_token,
        &DecodingKey::from_secret(&[]),
        &validation,
    )
    .map_err(|e| GatewayError::CorruptSession(format!("malformed access token: {}", e)))?;

    if data.claims.sub != session.user.id {
        return Err(GatewayError::CorruptSession(
            "access token subject does not match stored user".to_string(),
        ));
    }
    Ok(())
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> GatewayResult<()> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(status_error(response).await)
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> GatewayResult<T> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| GatewayError::Decode(format!("JSON parse error: {}", e)))
}

async fn status_error(response: reqwest::Response) -> GatewayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.as_u16() == 404 {
        return GatewayError::NotFound(body);
    }
    if status.is_server_error() {
        tracing::warn!(status = status.as_u16(), "Backend server error");
    }
    GatewayError::Rejected {
        status: status.as_u16(),
        message: body,
    }
}
