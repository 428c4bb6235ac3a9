//! Simulation Configuration
//!
//! Tunables for fitting, correlation and the sampling loop. Every field has a
//! serde default so partial JSON documents are accepted.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Sample size below which a fit is refused.
pub const MIN_FIT_OBSERVATIONS: usize = 10;
/// Smallest eigenvalue tolerated before the correlation matrix is shifted.
pub const PSD_EPSILON: f64 = 1e-8;
/// Lineup total used for `probability_above_threshold`.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 300.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitterConfig {
    #[serde(default = "FitterConfig::default_min_observations")]
    pub min_observations: usize,
}

impl FitterConfig {
    const fn default_min_observations() -> usize {
        MIN_FIT_OBSERVATIONS
    }
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            min_observations: Self::default_min_observations(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    #[serde(default = "CorrelationConfig::default_epsilon")]
    pub epsilon: f64,
    /// Shared games required before a pairwise correlation is trusted.
    #[serde(default = "CorrelationConfig::default_min_shared_games")]
    pub min_shared_games: usize,
}

impl CorrelationConfig {
    const fn default_epsilon() -> f64 {
        PSD_EPSILON
    }

    const fn default_min_shared_games() -> usize {
        3
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            epsilon: Self::default_epsilon(),
            min_shared_games: Self::default_min_shared_games(),
        }
    }
}

/// Window used when decomposing a player's scoring variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceConfig {
    #[serde(default = "VarianceConfig::default_recent_games")]
    pub recent_games: usize,
    #[serde(default = "VarianceConfig::default_min_games")]
    pub min_games: usize,
}

impl VarianceConfig {
    const fn default_recent_games() -> usize {
        50
    }

    const fn default_min_games() -> usize {
        MIN_FIT_OBSERVATIONS
    }
}

impl Default for VarianceConfig {
    fn default() -> Self {
        Self {
            recent_games: Self::default_recent_games(),
            min_games: Self::default_min_games(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Largest fractional nudge the correlated signal applies to a draw.
    #[serde(default = "SimulationConfig::default_correlation_impact")]
    pub correlation_impact: f64,
    #[serde(default = "SimulationConfig::default_score_threshold")]
    pub score_threshold: f64,
    /// Per-player share of failed draws above which the run is rejected.
    #[serde(default = "SimulationConfig::default_max_failure_rate")]
    pub max_failure_rate: f64,
    /// Fixed seed for reproducible runs; `None` draws one from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "SimulationConfig::default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "SimulationConfig::default_parallel")]
    pub parallel: bool,
    #[serde(default)]
    pub fitter: FitterConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
}

impl SimulationConfig {
    const fn default_correlation_impact() -> f64 {
        0.1
    }

    const fn default_score_threshold() -> f64 {
        DEFAULT_SCORE_THRESHOLD
    }

    const fn default_max_failure_rate() -> f64 {
        0.5
    }

    const fn default_chunk_size() -> usize {
        4096
    }

    const fn default_parallel() -> bool {
        true
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("correlation_impact", self.correlation_impact, 0.0, 1.0)?;
        check_range("max_failure_rate", self.max_failure_rate, 0.0, 1.0)?;
        if !self.score_threshold.is_finite() {
            return Err(ConfigError::RangeViolation {
                field: "score_threshold",
                min: f64::MIN,
                max: f64::MAX,
                value: self.score_threshold,
            });
        }
        check_min("chunk_size", self.chunk_size as f64, 1.0)?;
        check_min(
            "fitter.min_observations",
            self.fitter.min_observations as f64,
            2.0,
        )?;
        check_range("correlation.epsilon", self.correlation.epsilon, 0.0, 1.0)?;
        check_min(
            "correlation.min_shared_games",
            self.correlation.min_shared_games as f64,
            2.0,
        )?;
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            correlation_impact: Self::default_correlation_impact(),
            score_threshold: Self::default_score_threshold(),
            max_failure_rate: Self::default_max_failure_rate(),
            seed: None,
            chunk_size: Self::default_chunk_size(),
            parallel: Self::default_parallel(),
            fitter: FitterConfig::default(),
            correlation: CorrelationConfig::default(),
        }
    }
}

fn check_min(field: &'static str, value: f64, min: f64) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::MinViolation { field, min, value });
    }
    Ok(())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fitter.min_observations, 10);
        assert_eq!(config.correlation.epsilon, 1e-8);
        assert_eq!(config.score_threshold, 300.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            SimulationConfig::from_json_str(r#"{"seed": 42, "correlation": {"min_shared_games": 5}}"#)
                .unwrap();

        assert_eq!(config.seed, Some(42));
        assert_eq!(config.correlation.min_shared_games, 5);
        assert_eq!(config.correlation.epsilon, PSD_EPSILON);
        assert!((config.correlation_impact - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_impact_rejected() {
        let err = SimulationConfig::from_json_str(r#"{"correlation_impact": 1.5}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::RangeViolation {
                field: "correlation_impact",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let config = SimulationConfig {
            chunk_size: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MinViolation {
                field: "chunk_size",
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = SimulationConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
