// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin-only write commands on the predictions collection.
//!
//! Every command checks the acting profile first, then validates input,
//! then hands off to the gateway. Failures are returned to the caller.

use crate::error::{AppError, GatewayError, Result};
use crate::gateway::RemoteGateway;
use crate::models::{NewPrediction, Prediction, PredictionStatus, PredictionUpdate, Profile, Settlement};
use std::sync::Arc;
use validator::Validate;

pub struct AdminCatalog<G> {
    gateway: Arc<G>,
}

impl<G: RemoteGateway> AdminCatalog<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub async fn create(&self, actor: Option<&Profile>, draft: NewPrediction) -> Result<Prediction> {
        let admin = require_admin(actor)?;
        draft.validate()?;

        let prediction = self.gateway.create_item(draft).await?;
        tracing::info!(
            admin_id = %admin.id,
            prediction_id = %prediction.id,
            premium = prediction.is_premium,
            "Published prediction"
        );
        Ok(prediction)
    }

    pub async fn update(
        &self,
        actor: Option<&Profile>,
        id: &str,
        update: PredictionUpdate,
    ) -> Result<()> {
        let admin = require_admin(actor)?;
        update.validate()?;

        self.gateway.update_item(id, update).await.map_err(missing_pick)?;
        tracing::info!(admin_id = %admin.id, prediction_id = %id, "Updated prediction");
        Ok(())
    }

    pub async fn delete(&self, actor: Option<&Profile>, id: &str) -> Result<()> {
        let admin = require_admin(actor)?;

        self.gateway.delete_item(id).await.map_err(missing_pick)?;
        tracing::info!(admin_id = %admin.id, prediction_id = %id, "Deleted prediction");
        Ok(())
    }

    /// Record the outcome of a pick. `pending` is not an outcome.
    pub async fn settle(
        &self,
        actor: Option<&Profile>,
        id: &str,
        settlement: Settlement,
    ) -> Result<()> {
        let admin = require_admin(actor)?;
        if settlement.status == PredictionStatus::Pending {
            return Err(AppError::Validation(
                "Settlement outcome must be won, lost or push".to_string(),
            ));
        }

        let status = settlement.status;
        self.gateway.settle_item(id, settlement).await.map_err(missing_pick)?;
        tracing::info!(admin_id = %admin.id, prediction_id = %id, status = ?status, "Settled prediction");
        Ok(())
    }
}

/// A write aimed at a pick that no longer exists.
fn missing_pick(err: GatewayError) -> AppError {
    match err {
        GatewayError::NotFound(what) => AppError::NotFound(what),
        other => AppError::Gateway(other),
    }
}

fn require_admin(actor: Option<&Profile>) -> Result<&Profile> {
    match actor {
        None => Err(AppError::Unauthorized),
        Some(profile) if profile.is_admin => Ok(profile),
        Some(profile) => {
            tracing::warn!(user_id = %profile.id, "Security Alert: non-admin attempted admin write");
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }
}
