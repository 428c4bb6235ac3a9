//! Fantasy Lineup Simulation Library
//!
//! Monte Carlo tools for estimating the distribution of a fantasy lineup's
//! total score from per-player projections and historical outcomes.
//!
//! ## Modules
//!
//! - `fitting`: choose and fit a distribution family to historical scores
//! - `correlation`: pairwise player correlation, PSD repair and Cholesky factor
//! - `scenario`: injury, environmental, rest and matchup what-ifs
//! - `engine`: the sampling loop, summary statistics and history bootstrap
//! - `variance`: per-player variance decomposition
//! - `provider`: where historical outcomes come from
//!
//! ## Usage
//!
//! ```bash
//! # Simulate the demo lineup under a set of scenarios
//! cargo run --bin lineup_sim --release
//!
//! # Compare distribution fits on synthetic history
//! cargo run --bin fit_report --release
//! ```

pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod fitting;
pub mod projection;
pub mod provider;
pub mod sampler;
pub mod scenario;
pub mod stats;
pub mod variance;

pub use config::SimulationConfig;
pub use engine::{
    BootstrapResult, CorrelationStatus, Diagnostics, SimulationEngine, SimulationResult,
};
pub use error::{Result, SimulationError};
pub use fitting::{DistributionFitter, FitReport, FittedDistribution};
pub use projection::{DistributionFamily, DistributionType, HistoricalOutcome, PlayerProjection};
pub use scenario::Scenario;
