// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entitlement rules: who may see what of a pick.

use crate::models::{Prediction, PredictionStatus, Profile, Sport};
use crate::time_utils::is_upcoming;
use chrono::{DateTime, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Body length shown on an unlocked card before "read more".
pub const PREVIEW_CHARS: usize = 150;

/// Body length shown to users without access to a premium pick.
/// Always shorter than [`PREVIEW_CHARS`].
pub const TEASER_CHARS: usize = 120;

/// Whether `profile` may see `prediction` in full.
pub fn is_visible(prediction: &Prediction, profile: Option<&Profile>) -> bool {
    !prediction.is_premium || profile.is_some_and(Profile::has_active_subscription)
}

/// What the viewer gets to see of a pick's analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodyView {
    /// Short enough to show whole.
    Full { text: String },
    /// Unlocked but long: a preview, with the full text behind "read more".
    Preview { text: String, full_text: String },
    /// Locked premium content: a bounded teaser only.
    Teaser { text: String },
}

/// A pick as it may be rendered for a particular viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PredictionView {
    pub id: String,
    pub category: Sport,
    pub title: String,
    pub matchup_time: String,
    pub is_premium: bool,
    pub locked: bool,
    pub upcoming: bool,
    pub status: PredictionStatus,
    pub settled_score: Option<String>,
    /// Withheld when locked.
    pub wager_description: Option<String>,
    /// Withheld when locked.
    pub odds: Option<String>,
    pub stake_units: u8,
    pub body: BodyView,
}

/// Render a pick for `profile`, redacting what they are not entitled to.
pub fn render(prediction: &Prediction, profile: Option<&Profile>, now: DateTime<Utc>) -> PredictionView {
    let locked = !is_visible(prediction, profile);

    let body = if locked {
        BodyView::Teaser {
            text: truncate_chars(&prediction.body, TEASER_CHARS),
        }
    } else if prediction.body.chars().count() > PREVIEW_CHARS {
        BodyView::Preview {
            text: truncate_chars(&prediction.body, PREVIEW_CHARS),
            full_text: prediction.body.clone(),
        }
    } else {
        BodyView::Full {
            text: prediction.body.clone(),
        }
    };

    PredictionView {
        id: prediction.id.clone(),
        category: prediction.category,
        title: prediction.title.clone(),
        matchup_time: prediction.matchup_time.clone(),
        is_premium: prediction.is_premium,
        locked,
        upcoming: is_upcoming(&prediction.matchup_time, now),
        status: prediction.status,
        settled_score: prediction
            .settled_score
            .clone()
            .filter(|_| prediction.status.is_final()),
        wager_description: (!locked).then(|| prediction.wager_description.clone()),
        odds: (!locked).then(|| prediction.odds.clone()),
        stake_units: prediction.stake_units,
        body,
    }
}

/// Render a whole feed for one viewer, preserving order.
pub fn render_feed(
    predictions: &[Prediction],
    profile: Option<&Profile>,
    now: DateTime<Utc>,
) -> Vec<PredictionView> {
    predictions
        .iter()
        .map(|p| render(p, profile, now))
        .collect()
}

/// Picks still awaiting settlement (admin queue).
pub fn pending(predictions: &[Prediction]) -> Vec<&Prediction> {
    predictions
        .iter()
        .filter(|p| p.status == PredictionStatus::Pending)
        .collect()
}

/// Cut `text` to at most `max` characters, marking the cut with "...".
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionStatus;

    fn pick(is_premium: bool, body: &str) -> Prediction {
        Prediction {
            id: "p-1".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            matchup_time: "2026-01-02T00:00:00Z".to_string(),
            category: Sport::Nhl,
            title: "Rangers vs Devils".to_string(),
            wager_description: "Rangers ML".to_string(),
            odds: "2.05".to_string(),
            stake_units: 4,
            body: body.to_string(),
            is_premium,
            status: PredictionStatus::Pending,
            settled_score: None,
        }
    }

    fn profile(status: SubscriptionStatus) -> Profile {
        Profile {
            id: "u-1".to_string(),
            email: "u@x.io".to_string(),
            is_admin: false,
            subscription_status: status,
            billing_customer_ref: None,
        }
    }

    fn now() -> DateTime<Utc> {
        crate::time_utils::parse_utc_rfc3339("2026-01-01T12:00:00Z").unwrap()
    }

    #[test]
    fn test_free_pick_visible_to_everyone() {
        let p = pick(false, "");
        assert!(is_visible(&p, None));
        assert!(is_visible(&p, Some(&profile(SubscriptionStatus::None))));
        assert!(is_visible(&p, Some(&profile(SubscriptionStatus::Inactive))));
    }

    #[test]
    fn test_premium_pick_requires_active_subscription() {
        let p = pick(true, "");
        assert!(!is_visible(&p, None));
        assert!(!is_visible(&p, Some(&profile(SubscriptionStatus::None))));
        assert!(!is_visible(&p, Some(&profile(SubscriptionStatus::Inactive))));
        assert!(is_visible(&p, Some(&profile(SubscriptionStatus::Active))));
    }

    #[test]
    fn test_locked_render_redacts_wager() {
        let body = "x".repeat(400);
        let view = render(&pick(true, &body), None, now());
        assert!(view.locked);
        assert!(view.wager_description.is_none());
        assert!(view.odds.is_none());
        match view.body {
            BodyView::Teaser { text } => assert_eq!(text.chars().count(), TEASER_CHARS + 3),
            other => panic!("expected teaser, got {:?}", other),
        }
    }

    #[test]
    fn test_unlocked_long_body_gets_preview() {
        let body = "é".repeat(200);
        let view = render(&pick(false, &body), None, now());
        assert!(!view.locked);
        assert_eq!(view.wager_description.as_deref(), Some("Rangers ML"));
        match view.body {
            BodyView::Preview { text, full_text } => {
                assert_eq!(text.chars().count(), PREVIEW_CHARS + 3);
                assert_eq!(full_text, body);
            }
            other => panic!("expected preview, got {:?}", other),
        }
    }

    #[test]
    fn test_short_body_shown_whole() {
        let view = render(&pick(false, "Short take."), None, now());
        assert_eq!(
            view.body,
            BodyView::Full {
                text: "Short take.".to_string()
            }
        );
        assert!(view.upcoming);
    }

    #[test]
    fn test_teaser_shorter_than_preview() {
        assert!(TEASER_CHARS < PREVIEW_CHARS);
    }

    #[test]
    fn test_score_hidden_while_pending() {
        let mut p = pick(false, "");
        p.settled_score = Some("3-2".to_string());
        assert!(render(&p, None, now()).settled_score.is_none());
        p.status = PredictionStatus::Push;
        assert_eq!(render(&p, None, now()).settled_score.as_deref(), Some("3-2"));
    }

    #[test]
    fn test_pending_queue() {
        let mut settled = pick(false, "");
        settled.id = "p-2".to_string();
        settled.status = PredictionStatus::Won;
        let items = vec![pick(false, ""), settled];
        let queue = pending(&items);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, "p-1");
    }
}
