// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Track-record aggregates computed from settled picks.
//!
//! Nothing here is stored: stats are recomputed from the full collection
//! every time it changes.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Prediction, PredictionStatus};

/// Decimal odds assumed when the stored odds string does not parse
/// (the standard -110 line).
pub const FALLBACK_DECIMAL_ODDS: f64 = 1.91;

/// Aggregate performance over settled picks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    /// Percentage of decided picks that won (0-100)
    pub win_rate: f64,
    /// Net profit in units
    pub net_units: f64,
    /// Net units over units risked, as a percentage
    pub roi: f64,
    pub total_wins: u32,
    pub total_losses: u32,
}

/// One point of the cumulative net-units chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PerformancePoint {
    /// 1-based position in settlement order
    pub index: u32,
    pub net_units: f64,
    pub label: String,
}

/// Parse stored decimal odds, falling back to [`FALLBACK_DECIMAL_ODDS`].
pub fn decimal_odds(odds: &str) -> f64 {
    match odds.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => FALLBACK_DECIMAL_ODDS,
    }
}

/// Profit (positive) or loss (negative) in units for a single pick.
///
/// Pending and push picks contribute nothing.
pub fn unit_result(prediction: &Prediction) -> f64 {
    let stake = f64::from(prediction.stake_units);
    match prediction.status {
        PredictionStatus::Won => stake * (decimal_odds(&prediction.odds) - 1.0),
        PredictionStatus::Lost => -stake,
        PredictionStatus::Pending | PredictionStatus::Push => 0.0,
    }
}

/// Compute aggregate stats over a collection.
///
/// Only won/lost picks count. The result does not depend on input order:
/// per-pick results are summed in sorted order so float rounding is stable.
pub fn compute_stats(predictions: &[Prediction]) -> AggregateStats {
    let mut total_wins = 0u32;
    let mut total_losses = 0u32;
    let mut total_risked = 0u64;
    let mut results = Vec::new();

    for p in predictions.iter().filter(|p| p.status.is_decided()) {
        match p.status {
            PredictionStatus::Won => total_wins += 1,
            PredictionStatus::Lost => total_losses += 1,
            _ => {}
        }
        total_risked += u64::from(p.stake_units);
        results.push(unit_result(p));
    }

    results.sort_by(f64::total_cmp);
    let net_units: f64 = results.iter().sum();

    let settled = total_wins + total_losses;
    let win_rate = if settled > 0 {
        f64::from(total_wins) / f64::from(settled) * 100.0
    } else {
        0.0
    };
    let roi = if total_risked > 0 {
        net_units / total_risked as f64 * 100.0
    } else {
        0.0
    };

    AggregateStats {
        win_rate,
        net_units,
        roi,
        total_wins,
        total_losses,
    }
}

/// Running net units over decided picks, oldest first.
pub fn performance_series(predictions: &[Prediction]) -> Vec<PerformancePoint> {
    let mut settled: Vec<&Prediction> = predictions
        .iter()
        .filter(|p| p.status.is_decided())
        .collect();
    settled.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let mut running = 0.0;
    settled
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            running += unit_result(p);
            PerformancePoint {
                index: i as u32 + 1,
                net_units: running,
                label: p.title.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sport;

    const EPS: f64 = 1e-9;

    fn make_pick(id: &str, status: PredictionStatus, units: u8, odds: &str) -> Prediction {
        Prediction {
            id: id.to_string(),
            created_at: format!("2026-01-{:0>2}T00:00:00Z", id),
            matchup_time: "2026-02-01T00:00:00Z".to_string(),
            category: Sport::Nfl,
            title: format!("Game {}", id),
            wager_description: "Over 44.5".to_string(),
            odds: odds.to_string(),
            stake_units: units,
            body: String::new(),
            is_premium: false,
            status,
            settled_score: None,
        }
    }

    #[test]
    fn test_empty_collection() {
        assert_eq!(compute_stats(&[]), AggregateStats::default());
    }

    #[test]
    fn test_single_win_at_standard_odds() {
        let stats = compute_stats(&[make_pick("1", PredictionStatus::Won, 3, "1.91")]);
        assert!((stats.net_units - 2.73).abs() < EPS);
        assert_eq!(stats.total_wins, 1);
        assert_eq!(stats.win_rate, 100.0);
        assert!((stats.roi - 91.0).abs() < EPS);
    }

    #[test]
    fn test_unparseable_odds_fall_back() {
        let stats = compute_stats(&[make_pick("1", PredictionStatus::Won, 3, "not-a-number")]);
        assert!((stats.net_units - 3.0 * 0.91).abs() < EPS);

        let stats = compute_stats(&[make_pick("1", PredictionStatus::Won, 3, "inf")]);
        assert!((stats.net_units - 3.0 * 0.91).abs() < EPS);
    }

    #[test]
    fn test_push_and_pending_excluded() {
        let picks = vec![
            make_pick("1", PredictionStatus::Won, 2, "2.0"),
            make_pick("2", PredictionStatus::Lost, 1, "1.91"),
            make_pick("3", PredictionStatus::Push, 5, "1.91"),
            make_pick("4", PredictionStatus::Pending, 5, "1.91"),
        ];
        let stats = compute_stats(&picks);
        assert_eq!(stats.total_wins, 1);
        assert_eq!(stats.total_losses, 1);
        assert_eq!(stats.win_rate, 50.0);
        assert!((stats.net_units - 1.0).abs() < EPS);
        // Only won/lost stakes are risked: 2 + 1
        assert!((stats.roi - 100.0 / 3.0).abs() < EPS);
    }

    #[test]
    fn test_order_independent() {
        let picks = vec![
            make_pick("1", PredictionStatus::Won, 3, "1.87"),
            make_pick("2", PredictionStatus::Lost, 2, "2.10"),
            make_pick("3", PredictionStatus::Won, 1, "3.3"),
            make_pick("4", PredictionStatus::Won, 5, "1.1"),
            make_pick("5", PredictionStatus::Lost, 4, "1.5"),
            make_pick("6", PredictionStatus::Push, 2, "1.91"),
        ];
        let forward = compute_stats(&picks);

        let mut reversed = picks.clone();
        reversed.reverse();
        assert_eq!(compute_stats(&reversed), forward);

        let mut rotated = picks.clone();
        rotated.rotate_left(2);
        assert_eq!(compute_stats(&rotated), forward);
    }

    #[test]
    fn test_performance_series_oldest_first() {
        let picks = vec![
            make_pick("3", PredictionStatus::Lost, 1, "1.91"),
            make_pick("2", PredictionStatus::Push, 1, "1.91"),
            make_pick("1", PredictionStatus::Won, 2, "2.5"),
        ];
        let series = performance_series(&picks);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "Game 1");
        assert!((series[0].net_units - 3.0).abs() < EPS);
        assert_eq!(series[1].index, 2);
        assert!((series[1].net_units - 2.0).abs() < EPS);
    }
}
