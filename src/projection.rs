//! Lineup Inputs
//!
//! Player projections and historical box-score outcomes consumed by the
//! simulation. Both are owned by the caller; nothing in this crate mutates them.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type PlayerId = u32;
pub type GameId = u32;

/// Parametric family a player's outcomes are drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionFamily {
    Normal,
    LogNormal,
    Gamma,
    Beta,
    Exponential,
}

impl DistributionFamily {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Normal,
            Self::LogNormal,
            Self::Gamma,
            Self::Beta,
            Self::Exponential,
        ]
    }

    /// Candidates tried by automatic selection, in tie-break priority order.
    pub fn auto_candidates() -> [Self; 4] {
        [Self::Normal, Self::LogNormal, Self::Gamma, Self::Beta]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::LogNormal => "lognormal",
            Self::Gamma => "gamma",
            Self::Beta => "beta",
            Self::Exponential => "exponential",
        }
    }
}

/// Distribution tag carried on a projection. `Auto` asks the engine to pick
/// the family from the player's history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionType {
    #[default]
    Normal,
    LogNormal,
    Gamma,
    Beta,
    Exponential,
    Auto,
}

impl DistributionType {
    /// Declared family, or `None` for `Auto`.
    pub fn family(&self) -> Option<DistributionFamily> {
        match self {
            Self::Normal => Some(DistributionFamily::Normal),
            Self::LogNormal => Some(DistributionFamily::LogNormal),
            Self::Gamma => Some(DistributionFamily::Gamma),
            Self::Beta => Some(DistributionFamily::Beta),
            Self::Exponential => Some(DistributionFamily::Exponential),
            Self::Auto => None,
        }
    }
}

impl From<DistributionFamily> for DistributionType {
    fn from(family: DistributionFamily) -> Self {
        match family {
            DistributionFamily::Normal => Self::Normal,
            DistributionFamily::LogNormal => Self::LogNormal,
            DistributionFamily::Gamma => Self::Gamma,
            DistributionFamily::Beta => Self::Beta,
            DistributionFamily::Exponential => Self::Exponential,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerProjection {
    pub player_id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub salary: f64,
    pub mean_projection: f64,
    pub std_projection: f64,
    #[serde(default)]
    pub distribution_type: DistributionType,
    #[serde(default)]
    pub correlation_factors: HashMap<String, f64>,
}

impl PlayerProjection {
    pub fn new(player_id: PlayerId, name: impl Into<String>, mean: f64, std: f64) -> Self {
        Self {
            player_id,
            name: name.into(),
            position: String::new(),
            salary: 0.0,
            mean_projection: mean,
            std_projection: std,
            distribution_type: DistributionType::Normal,
            correlation_factors: HashMap::new(),
        }
    }

    pub fn with_distribution(mut self, distribution_type: DistributionType) -> Self {
        self.distribution_type = distribution_type;
        self
    }

    pub fn with_position(mut self, position: impl Into<String>, salary: f64) -> Self {
        self.position = position.into();
        self.salary = salary;
        self
    }

    /// Copy with both parameters rescaled. The original is left untouched.
    pub fn scaled(&self, mean_factor: f64, std_factor: f64) -> Self {
        Self {
            mean_projection: self.mean_projection * mean_factor,
            std_projection: self.std_projection * std_factor,
            ..self.clone()
        }
    }
}

/// One box-score outcome for one player in one game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalOutcome {
    pub player_id: PlayerId,
    pub game_id: GameId,
    pub outcome: f64,
    #[serde(default)]
    pub opponent_id: Option<u32>,
    #[serde(default)]
    pub game_date: Option<NaiveDate>,
}

impl HistoricalOutcome {
    pub fn new(player_id: PlayerId, game_id: GameId, outcome: f64) -> Self {
        Self {
            player_id,
            game_id,
            outcome,
            opponent_id: None,
            game_date: None,
        }
    }
}

/// Per-player outcome series, preserving the input (chronological) order.
pub fn outcome_series(outcomes: &[HistoricalOutcome]) -> BTreeMap<PlayerId, Vec<f64>> {
    let mut series: BTreeMap<PlayerId, Vec<f64>> = BTreeMap::new();
    for row in outcomes {
        series.entry(row.player_id).or_default().push(row.outcome);
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_copy_leaves_original() {
        let player = PlayerProjection::new(7, "Guard", 25.0, 5.0);
        let adjusted = player.scaled(0.8, 1.2);

        assert_eq!(player.mean_projection, 25.0);
        assert!((adjusted.mean_projection - 20.0).abs() < 1e-9);
        assert!((adjusted.std_projection - 6.0).abs() < 1e-9);
        assert_eq!(adjusted.player_id, 7);
    }

    #[test]
    fn test_distribution_type_wire_names() {
        let parsed: DistributionType = serde_json::from_str("\"lognormal\"").unwrap();
        assert_eq!(parsed, DistributionType::LogNormal);
        assert_eq!(DistributionType::Auto.family(), None);
        assert_eq!(
            DistributionType::Gamma.family(),
            Some(DistributionFamily::Gamma)
        );
    }

    #[test]
    fn test_projection_defaults_from_json() {
        let json = r#"{"player_id": 3, "name": "Wing", "mean_projection": 18.0, "std_projection": 3.5}"#;
        let player: PlayerProjection = serde_json::from_str(json).unwrap();

        assert_eq!(player.distribution_type, DistributionType::Normal);
        assert!(player.correlation_factors.is_empty());
        assert_eq!(player.salary, 0.0);
    }

    #[test]
    fn test_outcome_series_keeps_order() {
        let rows = vec![
            HistoricalOutcome::new(1, 10, 20.0),
            HistoricalOutcome::new(2, 10, 15.0),
            HistoricalOutcome::new(1, 11, 30.0),
        ];
        let series = outcome_series(&rows);

        assert_eq!(series[&1], vec![20.0, 30.0]);
        assert_eq!(series[&2], vec![15.0]);
    }
}
