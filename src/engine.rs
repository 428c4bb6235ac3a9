//! Monte Carlo Lineup Simulation
//!
//! Draws thousands of lineup totals from per-player distributions and
//! summarises them into percentile bands and tail probabilities.
//!
//! ## Per iteration
//! 1. Correlated standard-normal vector (when history supports it)
//! 2. One raw draw per player from its sampler
//! 3. Bounded nudge: `draw * (1 + impact * clamp(z, -1, 1))`
//! 4. Clamp at zero and add to the lineup total
//!
//! Iterations run in fixed-size chunks, each with its own ChaCha stream
//! derived from the run seed, so a seeded run gives the same result whatever
//! the thread count.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::SimulationConfig;
use crate::correlation::{CorrelationModel, CorrelationTransform, TransformStatus};
use crate::error::{InvalidRequest, Result, SamplingError};
use crate::fitting::{DistributionFitter, FittedDistribution};
use crate::projection::{
    outcome_series, DistributionFamily, DistributionType, HistoricalOutcome, PlayerId,
    PlayerProjection,
};
use crate::sampler::Sampler;
use crate::scenario::{self, Scenario};
use crate::stats::{self, BootstrapSummary, RiskProfile};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationType {
    MonteCarlo,
    /// Monte Carlo over a scenario-adjusted lineup.
    Scenario,
    /// Resampling of a player's own history.
    Bootstrap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStatus {
    /// Caller asked for independent players.
    Disabled,
    /// Not enough shared history to correlate any pair.
    Unavailable,
    Applied,
    /// Matrix could not be decomposed; players sampled independently.
    Downgraded,
}

/// Why an "auto" player fell back to a normal around its projection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FitFallback {
    pub player_id: PlayerId,
    pub reason: String,
}

/// Non-fatal conditions met during a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Draws replaced by zero, per player; players without failures omitted.
    pub sampling_failures: BTreeMap<PlayerId, usize>,
    pub correlation: CorrelationStatus,
    /// Diagonal shift applied to make the correlation matrix decomposable.
    pub correlation_shift: f64,
    pub fit_fallbacks: Vec<FitFallback>,
    /// Family chosen for each "auto" player that was fitted.
    pub fitted_families: BTreeMap<PlayerId, DistributionFamily>,
    pub seed: u64,
}

impl Diagnostics {
    pub fn total_sampling_failures(&self) -> usize {
        self.sampling_failures.values().sum()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationResult {
    pub mean_score: f64,
    pub std_score: f64,
    pub percentile_10: f64,
    pub percentile_25: f64,
    pub percentile_50: f64,
    pub percentile_75: f64,
    pub percentile_90: f64,
    pub confidence_interval_95: (f64, f64),
    pub probability_above_threshold: f64,
    pub threshold: f64,
    pub iterations: usize,
    pub simulation_type: SimulationType,
    pub risk: RiskProfile,
    pub diagnostics: Diagnostics,
}

impl SimulationResult {
    fn from_scores(
        scores: &[f64],
        total_salary: f64,
        threshold: f64,
        simulation_type: SimulationType,
        diagnostics: Diagnostics,
    ) -> Self {
        let sorted = stats::sorted(scores);
        Self {
            mean_score: stats::mean(scores),
            std_score: stats::std_dev(scores),
            percentile_10: stats::percentile(&sorted, 0.10),
            percentile_25: stats::percentile(&sorted, 0.25),
            percentile_50: stats::percentile(&sorted, 0.50),
            percentile_75: stats::percentile(&sorted, 0.75),
            percentile_90: stats::percentile(&sorted, 0.90),
            confidence_interval_95: (
                stats::percentile(&sorted, 0.025),
                stats::percentile(&sorted, 0.975),
            ),
            probability_above_threshold: stats::exceedance_probability(scores, threshold),
            threshold,
            iterations: scores.len(),
            simulation_type,
            risk: RiskProfile::from_sorted(&sorted, total_salary),
            diagnostics,
        }
    }

    pub fn print(&self) {
        println!("  Iterations:              {}", self.iterations);
        println!("  Mean score:              {:.2}", self.mean_score);
        println!("  Std score:               {:.2}", self.std_score);
        println!(
            "  Percentiles 10/50/90:    {:.1} / {:.1} / {:.1}",
            self.percentile_10, self.percentile_50, self.percentile_90
        );
        println!(
            "  95% interval:            [{:.1}, {:.1}]",
            self.confidence_interval_95.0, self.confidence_interval_95.1
        );
        println!(
            "  P(score > {:.0}):         {:.2}%",
            self.threshold,
            self.probability_above_threshold * 100.0
        );
        println!("  VaR 95%:                 {:.1}", self.risk.var_95);
        println!("  CVaR 95%:                {:.1}", self.risk.cvar_95);
        if self.risk.value_score > 0.0 {
            println!("  Points per $1K:          {:.2}", self.risk.value_score);
        }
        println!("  Correlation:             {:?}", self.diagnostics.correlation);
        if self.diagnostics.total_sampling_failures() > 0 {
            println!(
                "  Failed draws:            {}",
                self.diagnostics.total_sampling_failures()
            );
        }
    }
}

/// Resampled mean of one player's history.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BootstrapResult {
    #[serde(flatten)]
    pub summary: BootstrapSummary,
    pub simulation_type: SimulationType,
    pub seed: u64,
}

impl BootstrapResult {
    pub fn print(&self) {
        let s = &self.summary;
        println!("  Resamples:               {}", s.resamples);
        println!("  Bootstrap mean:          {:.2}", s.bootstrap_mean);
        println!("  Bootstrap std:           {:.3}", s.bootstrap_std);
        println!(
            "  {:.0}% interval:            [{:.2}, {:.2}]",
            s.confidence_level * 100.0,
            s.confidence_interval.0,
            s.confidence_interval.1
        );
        println!("  Bias:                    {:+.3}", s.bias);
        println!("  Bias-corrected mean:     {:.2}", s.bias_corrected_mean);
    }
}

struct ChunkOutcome {
    scores: Vec<f64>,
    failures: Vec<usize>,
}

/// Everything prepared once per run before the sampling loop.
struct SimulationPlan {
    player_ids: Vec<PlayerId>,
    samplers: Vec<std::result::Result<Sampler, SamplingError>>,
    transform: Option<CorrelationTransform>,
    correlation: CorrelationStatus,
    correlation_shift: f64,
    fit_fallbacks: Vec<FitFallback>,
    fitted_families: BTreeMap<PlayerId, DistributionFamily>,
}

#[derive(Clone, Debug)]
pub struct SimulationEngine {
    config: SimulationConfig,
    fitter: DistributionFitter,
    correlation: CorrelationModel,
}

impl Default for SimulationEngine {
    fn default() -> Self {
        let config = SimulationConfig::default();
        Self {
            fitter: DistributionFitter::new(&config.fitter),
            correlation: CorrelationModel::new(&config.correlation),
            config,
        }
    }
}

impl SimulationEngine {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fitter: DistributionFitter::new(&config.fitter),
            correlation: CorrelationModel::new(&config.correlation),
            config,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulates `iterations` lineup totals.
    ///
    /// `historical_data` drives both "auto" distribution fitting and the
    /// correlation transform; without it players are independent.
    pub fn run(
        &self,
        lineup: &[PlayerProjection],
        iterations: usize,
        historical_data: Option<&[HistoricalOutcome]>,
        include_correlations: bool,
    ) -> Result<SimulationResult> {
        self.simulate(
            lineup,
            iterations,
            historical_data,
            include_correlations,
            SimulationType::MonteCarlo,
        )
    }

    /// Applies `scenarios` in order to one copy of the lineup and runs once.
    pub fn run_with_scenarios(
        &self,
        lineup: &[PlayerProjection],
        scenarios: &[Scenario],
        iterations: usize,
        historical_data: Option<&[HistoricalOutcome]>,
        include_correlations: bool,
    ) -> Result<SimulationResult> {
        let adjusted = scenario::compose(lineup, scenarios)?;
        self.simulate(
            &adjusted,
            iterations,
            historical_data,
            include_correlations,
            SimulationType::Scenario,
        )
    }

    /// One independent run per scenario, each starting from `base_lineup`.
    /// Results are keyed by `scenario_{n}_{kind}`.
    pub fn scenario_analysis(
        &self,
        base_lineup: &[PlayerProjection],
        scenarios: &[Scenario],
        iterations_per_scenario: usize,
        historical_data: Option<&[HistoricalOutcome]>,
    ) -> Result<BTreeMap<String, SimulationResult>> {
        info!("running scenario analysis with {} scenarios", scenarios.len());

        let mut results = BTreeMap::new();
        for (i, scenario) in scenarios.iter().enumerate() {
            let label = scenario.label(i);
            debug!("analysing {}", label);
            let adjusted = scenario::apply(base_lineup, scenario)?;
            let result = self.simulate(
                &adjusted,
                iterations_per_scenario,
                historical_data,
                historical_data.is_some(),
                SimulationType::Scenario,
            )?;
            results.insert(label, result);
        }
        Ok(results)
    }

    /// Bootstrap estimate of the mean of `history` with a percentile interval
    /// at `confidence_level`. Seeded from the engine config like `run`.
    pub fn bootstrap(
        &self,
        history: &[f64],
        resamples: usize,
        confidence_level: f64,
    ) -> Result<BootstrapResult> {
        if resamples == 0 {
            return Err(InvalidRequest::NoIterations.into());
        }
        if history.is_empty() {
            return Err(InvalidRequest::EmptySeries.into());
        }
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(InvalidRequest::ConfidenceLevel(confidence_level).into());
        }
        info!("running bootstrap analysis with {} resamples", resamples);

        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let summary = stats::bootstrap(history, resamples, confidence_level, &mut rng)
            .ok_or(InvalidRequest::EmptySeries)?;

        Ok(BootstrapResult {
            summary,
            simulation_type: SimulationType::Bootstrap,
            seed,
        })
    }

    fn simulate(
        &self,
        lineup: &[PlayerProjection],
        iterations: usize,
        historical_data: Option<&[HistoricalOutcome]>,
        include_correlations: bool,
        simulation_type: SimulationType,
    ) -> Result<SimulationResult> {
        if iterations == 0 {
            return Err(InvalidRequest::NoIterations.into());
        }
        if lineup.is_empty() {
            return Err(InvalidRequest::EmptyLineup.into());
        }
        info!(
            "running Monte Carlo simulation: {} players, {} iterations",
            lineup.len(),
            iterations
        );

        let plan = self.plan(lineup, historical_data, include_correlations);
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let (scores, failures) = self.sample(&plan, iterations, seed);

        let mut sampling_failures = BTreeMap::new();
        for (&player_id, &count) in plan.player_ids.iter().zip(&failures) {
            if count == 0 {
                continue;
            }
            if count as f64 / iterations as f64 > self.config.max_failure_rate {
                return Err(InvalidRequest::ExcessiveSamplingFailures {
                    player_id,
                    failures: count,
                    iterations,
                    max_rate: self.config.max_failure_rate,
                }
                .into());
            }
            warn!("player {}: {} draws replaced by zero", player_id, count);
            *sampling_failures.entry(player_id).or_insert(0) += count;
        }

        let diagnostics = Diagnostics {
            sampling_failures,
            correlation: plan.correlation,
            correlation_shift: plan.correlation_shift,
            fit_fallbacks: plan.fit_fallbacks,
            fitted_families: plan.fitted_families,
            seed,
        };
        let total_salary: f64 = lineup.iter().map(|p| p.salary).sum();
        let result = SimulationResult::from_scores(
            &scores,
            total_salary,
            self.config.score_threshold,
            simulation_type,
            diagnostics,
        );

        info!(
            "simulation completed: mean={:.2}, std={:.2}",
            result.mean_score, result.std_score
        );
        Ok(result)
    }

    fn plan(
        &self,
        lineup: &[PlayerProjection],
        historical_data: Option<&[HistoricalOutcome]>,
        include_correlations: bool,
    ) -> SimulationPlan {
        let series = historical_data.map(outcome_series).unwrap_or_default();
        let mut fits: HashMap<PlayerId, Option<FittedDistribution>> = HashMap::new();
        let mut fit_fallbacks = Vec::new();
        let mut fitted_families = BTreeMap::new();

        let samplers = lineup
            .iter()
            .map(|player| {
                if player.distribution_type != DistributionType::Auto {
                    return Sampler::for_projection(player, None);
                }
                let fitted = *fits.entry(player.player_id).or_insert_with(|| {
                    let Some(history) = series.get(&player.player_id) else {
                        fit_fallbacks.push(FitFallback {
                            player_id: player.player_id,
                            reason: "no history".to_string(),
                        });
                        return None;
                    };
                    match self.fitter.fit(history, DistributionType::Auto) {
                        Ok(report) => {
                            let fitted = report.distribution();
                            fitted_families.insert(player.player_id, fitted.family());
                            Some(fitted)
                        }
                        Err(e) => {
                            warn!("player {}: {}, using normal", player.player_id, e);
                            fit_fallbacks.push(FitFallback {
                                player_id: player.player_id,
                                reason: e.to_string(),
                            });
                            None
                        }
                    }
                });
                Sampler::for_projection(player, fitted.as_ref())
            })
            .collect();

        let player_ids: Vec<PlayerId> = lineup.iter().map(|p| p.player_id).collect();
        let (transform, correlation, correlation_shift) = match historical_data {
            _ if !include_correlations => (None, CorrelationStatus::Disabled, 0.0),
            Some(history) if lineup.len() >= 2 => {
                let matrix = self.correlation.correlation_matrix(&player_ids, history);
                if matrix.is_informative() {
                    let transform = self.correlation.transform(&matrix);
                    match transform.status {
                        TransformStatus::Cholesky => {
                            let shift = transform.shift;
                            (Some(transform), CorrelationStatus::Applied, shift)
                        }
                        TransformStatus::Downgraded => (None, CorrelationStatus::Downgraded, 0.0),
                    }
                } else {
                    (None, CorrelationStatus::Unavailable, 0.0)
                }
            }
            _ => (None, CorrelationStatus::Unavailable, 0.0),
        };

        SimulationPlan {
            player_ids,
            samplers,
            transform,
            correlation,
            correlation_shift,
            fit_fallbacks,
            fitted_families,
        }
    }

    fn sample(&self, plan: &SimulationPlan, iterations: usize, seed: u64) -> (Vec<f64>, Vec<usize>) {
        let chunk_size = self.config.chunk_size.max(1);
        let chunks = iterations.div_ceil(chunk_size);
        let run_chunk = |chunk: usize| {
            let len = chunk_size.min(iterations - chunk * chunk_size);
            self.sample_chunk(plan, len, seed, chunk as u64)
        };

        let outcomes: Vec<ChunkOutcome> = if self.config.parallel && chunks > 1 {
            (0..chunks).into_par_iter().map(run_chunk).collect()
        } else {
            (0..chunks).map(run_chunk).collect()
        };

        let mut scores = Vec::with_capacity(iterations);
        let mut failures = vec![0usize; plan.player_ids.len()];
        for outcome in outcomes {
            scores.extend(outcome.scores);
            for (total, count) in failures.iter_mut().zip(outcome.failures) {
                *total += count;
            }
        }
        (scores, failures)
    }

    fn sample_chunk(&self, plan: &SimulationPlan, len: usize, seed: u64, stream: u64) -> ChunkOutcome {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);

        let n = plan.samplers.len();
        let impact = self.config.correlation_impact;
        let mut independent = vec![0.0; n];
        let mut correlated = vec![0.0; n];
        let mut scores = Vec::with_capacity(len);
        let mut failures = vec![0usize; n];

        for _ in 0..len {
            if let Some(transform) = &plan.transform {
                for z in independent.iter_mut() {
                    *z = rng.sample(StandardNormal);
                }
                transform.apply_into(&independent, &mut correlated);
            }

            let mut total = 0.0;
            for (j, sampler) in plan.samplers.iter().enumerate() {
                let draw = match sampler {
                    Ok(sampler) => sampler.draw(&mut rng),
                    Err(e) => Err(e.clone()),
                };
                let mut value = match draw {
                    Ok(value) => value,
                    Err(_) => {
                        failures[j] += 1;
                        0.0
                    }
                };
                if plan.transform.is_some() {
                    value *= 1.0 + impact * correlated[j].clamp(-1.0, 1.0);
                }
                total += value.max(0.0);
            }
            scores.push(total);
        }

        ChunkOutcome { scores, failures }
    }
}
