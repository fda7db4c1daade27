// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Prediction (content item) model.

use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Sport category a pick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sport {
    Nba,
    Nfl,
    Mlb,
    Nhl,
    Ufc,
    Soccer,
}

/// Settlement state of a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    #[default]
    Pending,
    Won,
    Lost,
    Push,
}

impl PredictionStatus {
    /// True for any final outcome (won, lost or push).
    pub fn is_final(self) -> bool {
        !matches!(self, PredictionStatus::Pending)
    }

    /// True for outcomes that count towards the win/loss record.
    pub fn is_decided(self) -> bool {
        matches!(self, PredictionStatus::Won | PredictionStatus::Lost)
    }
}

/// A published pick, as stored in the `predictions` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Prediction {
    pub id: String,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// Game time (ISO 8601)
    #[serde(rename = "matchup_date")]
    pub matchup_time: String,
    #[serde(rename = "sport")]
    pub category: Sport,
    /// e.g. "Lakers vs Celtics"
    #[serde(rename = "matchup")]
    pub title: String,
    /// e.g. "Lakers -4.5"
    #[serde(rename = "wager_type")]
    pub wager_description: String,
    /// Decimal odds as entered by the admin, e.g. "1.91"
    pub odds: String,
    /// Confidence/stake, 1-5
    #[serde(rename = "units")]
    pub stake_units: u8,
    #[serde(rename = "analysis")]
    pub body: String,
    pub is_premium: bool,
    #[serde(default)]
    pub status: PredictionStatus,
    #[serde(
        rename = "result_score",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub settled_score: Option<String>,
}

impl Prediction {
    /// Build a freshly published pick. New picks always start pending.
    pub fn publish(id: String, created_at: String, draft: NewPrediction) -> Self {
        Self {
            id,
            created_at,
            matchup_time: draft.matchup_time,
            category: draft.category,
            title: draft.title,
            wager_description: draft.wager_description,
            odds: draft.odds,
            stake_units: draft.stake_units,
            body: draft.body,
            is_premium: draft.is_premium,
            status: PredictionStatus::Pending,
            settled_score: None,
        }
    }

    /// Apply a partial edit. Moving back to pending drops any recorded score.
    pub fn apply_update(&mut self, update: &PredictionUpdate) {
        if let Some(v) = &update.matchup_time {
            self.matchup_time = v.clone();
        }
        if let Some(v) = update.category {
            self.category = v;
        }
        if let Some(v) = &update.title {
            self.title = v.clone();
        }
        if let Some(v) = &update.wager_description {
            self.wager_description = v.clone();
        }
        if let Some(v) = &update.odds {
            self.odds = v.clone();
        }
        if let Some(v) = update.stake_units {
            self.stake_units = v;
        }
        if let Some(v) = &update.body {
            self.body = v.clone();
        }
        if let Some(v) = update.is_premium {
            self.is_premium = v;
        }
        if let Some(status) = update.status {
            self.status = status;
            if !status.is_final() {
                self.settled_score = None;
            }
        }
    }

    /// Record a final outcome.
    pub fn apply_settlement(&mut self, settlement: &Settlement) {
        self.status = settlement.status;
        self.settled_score = settlement.score.clone();
    }
}

/// Admin input for a new pick.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPrediction {
    #[serde(rename = "matchup_date")]
    #[validate(length(min = 1, message = "matchup date is required"))]
    pub matchup_time: String,
    #[serde(rename = "sport")]
    pub category: Sport,
    #[serde(rename = "matchup")]
    #[validate(length(min = 1, max = 200, message = "matchup must be 1-200 characters"))]
    pub title: String,
    #[serde(rename = "wager_type")]
    #[validate(length(min = 1, max = 200, message = "wager must be 1-200 characters"))]
    pub wager_description: String,
    #[validate(length(min = 1, max = 16, message = "odds are required"))]
    pub odds: String,
    #[serde(rename = "units")]
    #[validate(range(min = 1, max = 5, message = "units must be between 1 and 5"))]
    pub stake_units: u8,
    #[serde(rename = "analysis")]
    pub body: String,
    pub is_premium: bool,
}

/// Partial edit of an existing pick. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PredictionUpdate {
    #[serde(rename = "matchup_date", skip_serializing_if = "Option::is_none")]
    pub matchup_time: Option<String>,
    #[serde(rename = "sport", skip_serializing_if = "Option::is_none")]
    pub category: Option<Sport>,
    #[serde(rename = "matchup", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "matchup must be 1-200 characters"))]
    pub title: Option<String>,
    #[serde(rename = "wager_type", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "wager must be 1-200 characters"))]
    pub wager_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 16, message = "odds are required"))]
    pub odds: Option<String>,
    #[serde(rename = "units", skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 5, message = "units must be between 1 and 5"))]
    pub stake_units: Option<u8>,
    #[serde(rename = "analysis", skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PredictionStatus>,
}

/// Final outcome of a pick plus an optional score line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub status: PredictionStatus,
    #[serde(rename = "result_score")]
    pub score: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewPrediction {
        NewPrediction {
            matchup_time: "2026-01-10T01:00:00Z".to_string(),
            category: Sport::Nba,
            title: "Lakers vs Celtics".to_string(),
            wager_description: "Lakers -4.5".to_string(),
            odds: "1.91".to_string(),
            stake_units: 3,
            body: "Celtics on a back-to-back.".to_string(),
            is_premium: true,
        }
    }

    #[test]
    fn test_publish_starts_pending() {
        let p = Prediction::publish("abc".into(), "2026-01-09T12:00:00Z".into(), draft());
        assert_eq!(p.status, PredictionStatus::Pending);
        assert!(p.settled_score.is_none());
    }

    #[test]
    fn test_revert_to_pending_clears_score() {
        let mut p = Prediction::publish("abc".into(), "now".into(), draft());
        p.apply_settlement(&Settlement {
            status: PredictionStatus::Won,
            score: Some("112-104".to_string()),
        });
        assert_eq!(p.settled_score.as_deref(), Some("112-104"));

        p.apply_update(&PredictionUpdate {
            status: Some(PredictionStatus::Pending),
            ..Default::default()
        });
        assert_eq!(p.status, PredictionStatus::Pending);
        assert!(p.settled_score.is_none());
    }

    #[test]
    fn test_wire_field_names() {
        let p = Prediction::publish("abc".into(), "now".into(), draft());
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["sport"], "NBA");
        assert_eq!(json["units"], 3);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["wager_type"], "Lakers -4.5");
        assert!(json.get("result_score").is_none());
    }

    #[test]
    fn test_stake_units_validation() {
        let mut d = draft();
        assert!(d.validate().is_ok());
        d.stake_units = 6;
        assert!(d.validate().is_err());
        d.stake_units = 0;
        assert!(d.validate().is_err());
    }
}
