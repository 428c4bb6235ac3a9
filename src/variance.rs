//! Variance Modeling
//!
//! Splits a player's recent scoring variance into components:
//! - Base: variance of the recent outcomes
//! - Trend-adjusted: variance left after removing a least-squares linear trend
//! - Matchup: mean variance within games against the same opponent
//! - Rest: mean variance within games played after the same number of rest days
//!
//! Matchup and rest components need `opponent_id` and `game_date` on the
//! outcomes; they are zero when that information is missing.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::config::VarianceConfig;
use crate::projection::{HistoricalOutcome, PlayerId};
use crate::stats;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VarianceModel {
    pub player_id: PlayerId,
    pub games: usize,
    pub base_variance: f64,
    /// Points per game gained or lost over the window.
    pub trend_slope: f64,
    pub trend_adjusted_variance: f64,
    pub matchup_variance: f64,
    pub rest_variance: f64,
    pub total_variance: f64,
}

/// Variance models for every player with at least `min_games` outcomes.
/// Only the most recent `recent_games` rows of each player are used.
pub fn variance_models(
    outcomes: &[HistoricalOutcome],
    config: &VarianceConfig,
) -> BTreeMap<PlayerId, VarianceModel> {
    let mut per_player: BTreeMap<PlayerId, Vec<&HistoricalOutcome>> = BTreeMap::new();
    for row in outcomes.iter().filter(|r| r.outcome.is_finite()) {
        per_player.entry(row.player_id).or_default().push(row);
    }

    let models: BTreeMap<PlayerId, VarianceModel> = per_player
        .into_iter()
        .filter_map(|(player_id, rows)| {
            let start = rows.len().saturating_sub(config.recent_games);
            let recent = &rows[start..];
            if recent.len() < config.min_games {
                return None;
            }
            Some((player_id, model_player(player_id, recent)))
        })
        .collect();

    debug!("built variance models for {} players", models.len());
    models
}

pub fn model_player(player_id: PlayerId, rows: &[&HistoricalOutcome]) -> VarianceModel {
    let points: Vec<f64> = rows.iter().map(|r| r.outcome).collect();
    let base_variance = stats::variance(&points);

    let (trend_slope, trend_adjusted_variance) = if points.len() > 5 {
        let slope = linear_slope(&points);
        let detrended: Vec<f64> = points
            .iter()
            .enumerate()
            .map(|(i, p)| p - slope * i as f64)
            .collect();
        (slope, stats::variance(&detrended))
    } else {
        (0.0, base_variance)
    };

    let matchup_variance = matchup_variance(rows);
    let rest_variance = rest_variance(rows);

    VarianceModel {
        player_id,
        games: points.len(),
        base_variance,
        trend_slope,
        trend_adjusted_variance,
        matchup_variance,
        rest_variance,
        total_variance: base_variance + matchup_variance + rest_variance,
    }
}

/// Least-squares slope of `values` against their index.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = stats::mean(values);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn mean_group_variance<K: Ord>(groups: BTreeMap<K, Vec<f64>>) -> f64 {
    let variances: Vec<f64> = groups
        .values()
        .filter(|g| g.len() > 1)
        .map(|g| stats::variance(g))
        .collect();
    stats::mean(&variances)
}

fn matchup_variance(rows: &[&HistoricalOutcome]) -> f64 {
    let mut groups: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for row in rows {
        if let Some(opponent) = row.opponent_id {
            groups.entry(opponent).or_default().push(row.outcome);
        }
    }
    mean_group_variance(groups)
}

fn rest_variance(rows: &[&HistoricalOutcome]) -> f64 {
    let mut dated: Vec<_> = rows
        .iter()
        .filter_map(|r| r.game_date.map(|d| (d, r.outcome)))
        .collect();
    dated.sort_by_key(|(date, _)| *date);

    let mut groups: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for pair in dated.windows(2) {
        let rest_days = (pair[1].0 - pair[0].0).num_days();
        if rest_days > 0 {
            groups.entry(rest_days).or_default().push(pair[1].1);
        }
    }
    mean_group_variance(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(player_id: PlayerId, values: &[f64]) -> Vec<HistoricalOutcome> {
        values
            .iter()
            .enumerate()
            .map(|(g, &v)| HistoricalOutcome::new(player_id, g as u32, v))
            .collect()
    }

    #[test]
    fn test_linear_slope() {
        let values: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();
        assert!((linear_slope(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_pure_trend_has_no_residual_variance() {
        let values: Vec<f64> = (0..12).map(|i| 10.0 + 1.5 * i as f64).collect();
        let models = variance_models(&series(1, &values), &VarianceConfig::default());
        let model = &models[&1];

        assert!(model.base_variance > 0.0);
        assert!(model.trend_adjusted_variance < 1e-9);
        assert!((model.trend_slope - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_short_history_skipped() {
        let models = variance_models(&series(1, &[10.0, 12.0, 9.0]), &VarianceConfig::default());
        assert!(models.is_empty());
    }

    #[test]
    fn test_recent_window_only() {
        let mut values = vec![100.0; 20];
        values.extend([10.0, 12.0].iter().cycle().take(10));
        let config = VarianceConfig {
            recent_games: 10,
            min_games: 10,
        };
        let model = &variance_models(&series(1, &values), &config)[&1];

        assert_eq!(model.games, 10);
        assert!((model.base_variance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_matchup_and_rest_components() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let gaps = [0, 1, 3, 4, 6, 7, 9, 10, 12, 13];
        let points = [20.0, 30.0, 22.0, 28.0, 21.0, 31.0, 19.0, 29.0, 20.0, 30.0];
        let rows: Vec<HistoricalOutcome> = gaps
            .iter()
            .zip(points)
            .enumerate()
            .map(|(g, (&day, p))| HistoricalOutcome {
                player_id: 5,
                game_id: g as u32,
                outcome: p,
                opponent_id: Some((g % 2) as u32),
                game_date: Some(start + chrono::Duration::days(day)),
            })
            .collect();
        let model = &variance_models(&rows, &VarianceConfig::default())[&5];

        // Opponent 0 always sees ~20, opponent 1 ~30.
        assert!(model.matchup_variance < 2.0);
        assert!(model.rest_variance < 2.0);
        assert!(model.base_variance > 20.0);
        assert!(
            (model.total_variance
                - (model.base_variance + model.matchup_variance + model.rest_variance))
                .abs()
                < 1e-12
        );
    }

    #[test]
    fn test_missing_context_gives_zero_components() {
        let values: Vec<f64> = (0..15).map(|i| (i % 4) as f64 * 5.0).collect();
        let model = &variance_models(&series(2, &values), &VarianceConfig::default())[&2];
        assert_eq!(model.matchup_variance, 0.0);
        assert_eq!(model.rest_variance, 0.0);
    }
}
