use thiserror::Error;

use crate::projection::{DistributionFamily, PlayerId};

/// Reasons a distribution could not be fitted to a series.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("degenerate distribution: {found} observations, at least {required} required")]
    TooFewObservations { found: usize, required: usize },
    #[error("degenerate distribution: series has zero variance")]
    ZeroVariance,
    #[error("series contains non-finite values")]
    NonFinite,
    #[error("{family:?} cannot be fitted: {reason}")]
    Unsupported {
        family: DistributionFamily,
        reason: &'static str,
    },
    #[error("{family:?} parameters rejected: {message}")]
    InvalidParameters {
        family: DistributionFamily,
        message: String,
    },
}

impl FitError {
    /// True for the data problems a caller recovers from with a constant or
    /// normal approximation.
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::TooFewObservations { .. } | Self::ZeroVariance)
    }
}

/// A single draw for one player could not be produced.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplingError {
    #[error("{family:?} cannot be sampled with mean {mean} and std {std_dev}: {reason}")]
    InvalidParameters {
        family: DistributionFamily,
        mean: f64,
        std_dev: f64,
        reason: String,
    },
    #[error("draw produced a non-finite value")]
    NonFiniteDraw,
}

/// Requests the engine refuses to run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidRequest {
    #[error("iteration count must be positive")]
    NoIterations,
    #[error("lineup is empty")]
    EmptyLineup,
    #[error("series to resample is empty")]
    EmptySeries,
    #[error("confidence level must lie strictly between 0 and 1 (got {0})")]
    ConfidenceLevel(f64),
    #[error(
        "player {player_id} failed {failures} of {iterations} draws (limit {pct:.0}%)",
        pct = .max_rate * 100.0
    )]
    ExcessiveSamplingFailures {
        player_id: PlayerId,
        failures: usize,
        iterations: usize,
        max_rate: f64,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScenarioError {
    #[error("{field} must be a non-negative finite number (got {value})")]
    InvalidFactor { field: &'static str, value: f64 },
}

/// Errors raised when simulation configuration invariants are violated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("config could not be parsed: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("outcome source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid simulation request: {0}")]
    InvalidRequest(#[from] InvalidRequest),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
