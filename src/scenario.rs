//! What-If Scenarios
//!
//! Named perturbations of a lineup's projections. A scenario multiplies the
//! mean of every in-scope player by `impact_factor` and the standard deviation
//! by `variance_adjustment`; everyone else passes through untouched.
//!
//! ## Variants
//! - Injury: one player, replacement typically weaker and less predictable
//! - Environmental: the whole lineup (venue, conditions)
//! - Rest: an explicit list of players
//! - Matchup: one player against a strong or weak opponent

use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;
use crate::projection::{PlayerId, PlayerProjection};

const fn unit_factor() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scenario {
    Injury {
        injured_player_id: PlayerId,
        #[serde(default)]
        replacement_player_id: Option<PlayerId>,
        #[serde(default = "unit_factor")]
        impact_factor: f64,
        #[serde(default = "unit_factor")]
        variance_adjustment: f64,
    },
    #[serde(alias = "weather")]
    Environmental {
        #[serde(default)]
        venue: String,
        #[serde(default = "unit_factor")]
        impact_factor: f64,
        #[serde(default = "unit_factor")]
        variance_adjustment: f64,
    },
    Rest {
        player_ids: Vec<PlayerId>,
        #[serde(default = "unit_factor")]
        impact_factor: f64,
        #[serde(default = "unit_factor")]
        variance_adjustment: f64,
    },
    Matchup {
        player_id: PlayerId,
        #[serde(default = "unit_factor", alias = "opponent_strength")]
        impact_factor: f64,
        #[serde(default = "unit_factor")]
        variance_adjustment: f64,
    },
}

/// Players a scenario applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    All,
    Players(Vec<PlayerId>),
}

impl Scope {
    pub fn contains(&self, player_id: PlayerId) -> bool {
        match self {
            Self::All => true,
            Self::Players(ids) => ids.contains(&player_id),
        }
    }
}

impl Scenario {
    /// Replacement for an injured starter: 80% of the output, 20% more spread.
    pub fn injury(injured_player_id: PlayerId, replacement_player_id: PlayerId) -> Self {
        Self::Injury {
            injured_player_id,
            replacement_player_id: Some(replacement_player_id),
            impact_factor: 0.8,
            variance_adjustment: 1.2,
        }
    }

    pub fn environmental(venue: impl Into<String>, impact: f64) -> Self {
        Self::Environmental {
            venue: venue.into(),
            impact_factor: impact,
            variance_adjustment: 1.1,
        }
    }

    pub fn rest(player_ids: Vec<PlayerId>, impact: f64) -> Self {
        Self::Rest {
            player_ids,
            impact_factor: impact,
            variance_adjustment: 0.9,
        }
    }

    /// `opponent_strength` below 1.0 models a tough defensive matchup.
    pub fn matchup(player_id: PlayerId, opponent_strength: f64) -> Self {
        Self::Matchup {
            player_id,
            impact_factor: opponent_strength,
            variance_adjustment: 1.0,
        }
    }

    /// Same scope, different multipliers.
    pub fn with_factors(mut self, impact: f64, variance: f64) -> Self {
        match &mut self {
            Self::Injury {
                impact_factor,
                variance_adjustment,
                ..
            }
            | Self::Environmental {
                impact_factor,
                variance_adjustment,
                ..
            }
            | Self::Rest {
                impact_factor,
                variance_adjustment,
                ..
            }
            | Self::Matchup {
                impact_factor,
                variance_adjustment,
                ..
            } => {
                *impact_factor = impact;
                *variance_adjustment = variance;
            }
        }
        self
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Injury { .. } => "injury",
            Self::Environmental { .. } => "environmental",
            Self::Rest { .. } => "rest",
            Self::Matchup { .. } => "matchup",
        }
    }

    pub fn impact_factor(&self) -> f64 {
        match self {
            Self::Injury { impact_factor, .. }
            | Self::Environmental { impact_factor, .. }
            | Self::Rest { impact_factor, .. }
            | Self::Matchup { impact_factor, .. } => *impact_factor,
        }
    }

    pub fn variance_adjustment(&self) -> f64 {
        match self {
            Self::Injury {
                variance_adjustment,
                ..
            }
            | Self::Environmental {
                variance_adjustment,
                ..
            }
            | Self::Rest {
                variance_adjustment,
                ..
            }
            | Self::Matchup {
                variance_adjustment,
                ..
            } => *variance_adjustment,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Self::Injury {
                injured_player_id, ..
            } => Scope::Players(vec![*injured_player_id]),
            Self::Environmental { .. } => Scope::All,
            Self::Rest { player_ids, .. } => Scope::Players(player_ids.clone()),
            Self::Matchup { player_id, .. } => Scope::Players(vec![*player_id]),
        }
    }

    /// Result key used by scenario analysis, `index` counted from zero.
    pub fn label(&self, index: usize) -> String {
        format!("scenario_{}_{}", index + 1, self.kind())
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        for (field, value) in [
            ("impact_factor", self.impact_factor()),
            ("variance_adjustment", self.variance_adjustment()),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ScenarioError::InvalidFactor { field, value });
            }
        }
        Ok(())
    }
}

/// Adjusted copy of `lineup` under one scenario.
pub fn apply(
    lineup: &[PlayerProjection],
    scenario: &Scenario,
) -> Result<Vec<PlayerProjection>, ScenarioError> {
    scenario.validate()?;
    let scope = scenario.scope();
    let impact = scenario.impact_factor();
    let variance = scenario.variance_adjustment();

    Ok(lineup
        .iter()
        .map(|player| {
            if scope.contains(player.player_id) {
                player.scaled(impact, variance)
            } else {
                player.clone()
            }
        })
        .collect())
}

/// Applies `scenarios` one after another in the given order.
pub fn compose(
    lineup: &[PlayerProjection],
    scenarios: &[Scenario],
) -> Result<Vec<PlayerProjection>, ScenarioError> {
    scenarios
        .iter()
        .try_fold(lineup.to_vec(), |adjusted, scenario| apply(&adjusted, scenario))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lineup() -> Vec<PlayerProjection> {
        vec![
            PlayerProjection::new(1, "Player 1", 25.0, 5.0),
            PlayerProjection::new(2, "Player 2", 20.0, 4.0),
            PlayerProjection::new(3, "Player 3", 18.0, 3.5),
        ]
    }

    #[test]
    fn test_injury_scales_only_injured_player() {
        let base = lineup();
        let adjusted = apply(&base, &Scenario::injury(1, 4)).unwrap();

        assert!((adjusted[0].mean_projection - 20.0).abs() < 1e-9);
        assert!((adjusted[0].std_projection - 6.0).abs() < 1e-9);
        assert_eq!(adjusted[1], base[1]);
        assert_eq!(adjusted[2], base[2]);
        assert_eq!(base[0].mean_projection, 25.0);
    }

    #[test]
    fn test_environmental_hits_everyone() {
        let adjusted = apply(&lineup(), &Scenario::environmental("Indoor", 0.95)).unwrap();
        for (before, after) in lineup().iter().zip(&adjusted) {
            assert!((after.mean_projection - before.mean_projection * 0.95).abs() < 1e-9);
            assert!((after.std_projection - before.std_projection * 1.1).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rest_scope_is_explicit_list() {
        let adjusted = apply(&lineup(), &Scenario::rest(vec![2, 3], 1.1)).unwrap();
        assert_eq!(adjusted[0].mean_projection, 25.0);
        assert!((adjusted[1].mean_projection - 22.0).abs() < 1e-9);
        assert!((adjusted[2].std_projection - 3.15).abs() < 1e-9);
    }

    #[test]
    fn test_composition_compounds_in_order() {
        let scenarios = [Scenario::matchup(1, 0.9), Scenario::environmental("Road", 0.5)];
        let adjusted = compose(&lineup(), &scenarios).unwrap();

        assert!((adjusted[0].mean_projection - 25.0 * 0.9 * 0.5).abs() < 1e-9);
        assert!((adjusted[1].mean_projection - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_with_factors_keeps_scope() {
        let severe = Scenario::injury(2, 7).with_factors(0.5, 1.5);
        let adjusted = apply(&lineup(), &severe).unwrap();

        assert_eq!(severe.scope(), Scope::Players(vec![2]));
        assert_eq!(severe.kind(), "injury");
        assert!((adjusted[1].mean_projection - 10.0).abs() < 1e-9);
        assert!((adjusted[1].std_projection - 6.0).abs() < 1e-9);
        assert_eq!(adjusted[0].mean_projection, 25.0);
    }

    #[test]
    fn test_negative_factor_rejected() {
        let scenario = Scenario::matchup(1, -0.2);
        assert_eq!(
            apply(&lineup(), &scenario).unwrap_err(),
            ScenarioError::InvalidFactor {
                field: "impact_factor",
                value: -0.2
            }
        );
    }

    #[test]
    fn test_labels_are_one_based() {
        assert_eq!(Scenario::injury(1, 4).label(0), "scenario_1_injury");
        assert_eq!(Scenario::rest(vec![], 1.0).label(2), "scenario_3_rest");
    }

    #[test]
    fn test_wire_format_aliases() {
        let weather: Scenario =
            serde_json::from_str(r#"{"type": "weather", "venue": "Outdoor", "impact_factor": 0.9}"#)
                .unwrap();
        assert_eq!(weather.kind(), "environmental");
        assert_eq!(weather.variance_adjustment(), 1.0);

        let matchup: Scenario =
            serde_json::from_str(r#"{"type": "matchup", "player_id": 3, "opponent_strength": 0.85}"#)
                .unwrap();
        assert_eq!(matchup.impact_factor(), 0.85);
        assert_eq!(matchup.scope(), Scope::Players(vec![3]));
    }
}
