//! Distribution Fitting
//!
//! Fits parametric families to a player's historical outcome series and
//! picks the best one by Kolmogorov-Smirnov distance.
//!
//! ## Estimators
//! - Normal: maximum likelihood (mean, population std)
//! - Log-normal: maximum likelihood on `ln x`
//! - Gamma: Minka's closed-form approximation to the MLE
//! - Beta: method of moments on the series rescaled to `[0, 1]`
//! - Exponential: maximum likelihood (`1 / mean`)
//!
//! Automatic selection tries normal, log-normal, gamma and beta in that
//! order; the first family reaching the smallest statistic wins.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, Continuous, ContinuousCDF, Exp, Gamma, LogNormal, Normal};

use crate::config::FitterConfig;
use crate::error::FitError;
use crate::projection::{DistributionFamily, DistributionType};
use crate::stats;

/// A distribution with concrete parameters, in the units of the fitted data.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum FittedDistribution {
    Normal { mean: f64, std_dev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Gamma { shape: f64, scale: f64 },
    /// Standard beta mapped onto `[lower, upper]`.
    Beta {
        alpha: f64,
        beta: f64,
        lower: f64,
        upper: f64,
    },
    Exponential { rate: f64 },
}

impl FittedDistribution {
    pub fn family(&self) -> DistributionFamily {
        match self {
            Self::Normal { .. } => DistributionFamily::Normal,
            Self::LogNormal { .. } => DistributionFamily::LogNormal,
            Self::Gamma { .. } => DistributionFamily::Gamma,
            Self::Beta { .. } => DistributionFamily::Beta,
            Self::Exponential { .. } => DistributionFamily::Exponential,
        }
    }

    /// Free parameters estimated from the data, used for AIC.
    pub fn param_count(&self) -> usize {
        match self {
            Self::Exponential { .. } => 1,
            Self::Beta { .. } => 4,
            _ => 2,
        }
    }

    pub fn mean(&self) -> f64 {
        match *self {
            Self::Normal { mean, .. } => mean,
            Self::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
            Self::Gamma { shape, scale } => shape * scale,
            Self::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => lower + (upper - lower) * alpha / (alpha + beta),
            Self::Exponential { rate } => 1.0 / rate,
        }
    }

    pub fn std_dev(&self) -> f64 {
        match *self {
            Self::Normal { std_dev, .. } => std_dev,
            Self::LogNormal { mu, sigma } => {
                let s2 = sigma * sigma;
                ((s2.exp() - 1.0) * (2.0 * mu + s2).exp()).sqrt()
            }
            Self::Gamma { shape, scale } => shape.sqrt() * scale,
            Self::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => {
                let total = alpha + beta;
                (upper - lower) * (alpha * beta / (total * total * (total + 1.0))).sqrt()
            }
            Self::Exponential { rate } => 1.0 / rate,
        }
    }

    fn reference(&self) -> Result<Reference, FitError> {
        let family = self.family();
        let rejected = |e: String| FitError::InvalidParameters {
            family,
            message: e,
        };
        Ok(match *self {
            Self::Normal { mean, std_dev } => {
                Reference::Normal(Normal::new(mean, std_dev).map_err(|e| rejected(e.to_string()))?)
            }
            Self::LogNormal { mu, sigma } => {
                Reference::LogNormal(LogNormal::new(mu, sigma).map_err(|e| rejected(e.to_string()))?)
            }
            Self::Gamma { shape, scale } => {
                Reference::Gamma(Gamma::new(shape, 1.0 / scale).map_err(|e| rejected(e.to_string()))?)
            }
            Self::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => Reference::Beta {
                dist: Beta::new(alpha, beta).map_err(|e| rejected(e.to_string()))?,
                lower,
                width: upper - lower,
            },
            Self::Exponential { rate } => {
                Reference::Exponential(Exp::new(rate).map_err(|e| rejected(e.to_string()))?)
            }
        })
    }
}

/// statrs view of a fitted distribution, used for CDF and density evaluation.
enum Reference {
    Normal(Normal),
    LogNormal(LogNormal),
    Gamma(Gamma),
    Beta { dist: Beta, lower: f64, width: f64 },
    Exponential(Exp),
}

impl Reference {
    fn cdf(&self, x: f64) -> f64 {
        match self {
            Self::Normal(d) => d.cdf(x),
            Self::LogNormal(d) => d.cdf(x),
            Self::Gamma(d) => d.cdf(x),
            Self::Beta { dist, lower, width } => {
                dist.cdf(((x - lower) / width).clamp(0.0, 1.0))
            }
            Self::Exponential(d) => d.cdf(x),
        }
    }

    fn ln_pdf(&self, x: f64) -> f64 {
        match self {
            Self::Normal(d) => d.ln_pdf(x),
            Self::LogNormal(d) => d.ln_pdf(x),
            Self::Gamma(d) => d.ln_pdf(x),
            Self::Beta { dist, lower, width } => {
                dist.ln_pdf(((x - lower) / width).clamp(0.0, 1.0)) - width.ln()
            }
            Self::Exponential(d) => d.ln_pdf(x),
        }
    }
}

/// One family fitted to the data with its goodness-of-fit figures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateFit {
    pub distribution: FittedDistribution,
    pub ks_statistic: f64,
    /// `None` when the density vanishes at an observation.
    pub log_likelihood: Option<f64>,
    pub aic: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub best: CandidateFit,
    pub candidates: Vec<CandidateFit>,
    /// Families that could not be fitted, with the reason.
    pub rejected: Vec<(DistributionFamily, String)>,
    /// True when every requested family failed and the sample normal was used.
    pub empirical_fallback: bool,
    pub sample_mean: f64,
    pub sample_std: f64,
    pub observations: usize,
}

impl FitReport {
    pub fn distribution(&self) -> FittedDistribution {
        self.best.distribution
    }

    pub fn ks_statistic(&self) -> f64 {
        self.best.ks_statistic
    }

    pub fn print(&self) {
        println!("  Observations:            {}", self.observations);
        println!("  Sample mean:             {:.2}", self.sample_mean);
        println!("  Sample std:              {:.2}", self.sample_std);
        println!(
            "  Selected:                {}{}",
            self.best.distribution.family().name(),
            if self.empirical_fallback { " (empirical fallback)" } else { "" }
        );
        println!("  KS statistic:            {:.4}", self.best.ks_statistic);
    }
}

#[derive(Clone, Debug)]
pub struct DistributionFitter {
    min_observations: usize,
}

impl Default for DistributionFitter {
    fn default() -> Self {
        Self::new(&FitterConfig::default())
    }
}

impl DistributionFitter {
    pub fn new(config: &FitterConfig) -> Self {
        Self {
            min_observations: config.min_observations.max(2),
        }
    }

    /// Fits `requested` to `data`, or selects the best candidate for `Auto`.
    ///
    /// Fails only for degenerate input; per-family failures fall back to the
    /// empirical normal.
    pub fn fit(&self, data: &[f64], requested: DistributionType) -> Result<FitReport, FitError> {
        self.validate(data)?;

        let families: Vec<DistributionFamily> = match requested.family() {
            Some(family) => vec![family],
            None => DistributionFamily::auto_candidates().to_vec(),
        };

        let mut candidates = Vec::with_capacity(families.len());
        let mut rejected = Vec::new();
        for family in families {
            match evaluate(data, family) {
                Ok(candidate) => {
                    debug!(
                        "fitted {} ks={:.4}",
                        family.name(),
                        candidate.ks_statistic
                    );
                    candidates.push(candidate);
                }
                Err(e) => {
                    debug!("skipping {}: {}", family.name(), e);
                    rejected.push((family, e.to_string()));
                }
            }
        }

        let (best, empirical_fallback) = match select_best(&candidates) {
            Some(best) => (best.clone(), false),
            None => {
                warn!("no family could be fitted, using empirical normal");
                (evaluate(data, DistributionFamily::Normal)?, true)
            }
        };

        Ok(FitReport {
            best,
            candidates,
            rejected,
            empirical_fallback,
            sample_mean: stats::mean(data),
            sample_std: stats::std_dev(data),
            observations: data.len(),
        })
    }

    fn validate(&self, data: &[f64]) -> Result<(), FitError> {
        if data.iter().any(|x| !x.is_finite()) {
            return Err(FitError::NonFinite);
        }
        if data.len() < self.min_observations {
            return Err(FitError::TooFewObservations {
                found: data.len(),
                required: self.min_observations,
            });
        }
        let Some(&first) = data.first() else {
            return Err(FitError::TooFewObservations {
                found: 0,
                required: self.min_observations,
            });
        };
        if data.iter().all(|&x| x == first) || stats::variance(data) <= 0.0 {
            return Err(FitError::ZeroVariance);
        }
        Ok(())
    }
}

/// Candidate with the smallest KS statistic; on a tie the earlier one wins.
pub fn select_best(candidates: &[CandidateFit]) -> Option<&CandidateFit> {
    let mut best: Option<&CandidateFit> = None;
    for candidate in candidates {
        if best.map_or(true, |b| candidate.ks_statistic < b.ks_statistic) {
            best = Some(candidate);
        }
    }
    best
}

/// Fits one family and scores it against the data.
pub fn evaluate(data: &[f64], family: DistributionFamily) -> Result<CandidateFit, FitError> {
    let distribution = estimate(data, family)?;
    let reference = distribution.reference()?;

    let ks_statistic = ks_statistic(data, |x| reference.cdf(x));
    let log_likelihood: f64 = data.iter().map(|&x| reference.ln_pdf(x)).sum();
    let log_likelihood = log_likelihood.is_finite().then_some(log_likelihood);
    let aic = log_likelihood.map(|ll| 2.0 * distribution.param_count() as f64 - 2.0 * ll);

    Ok(CandidateFit {
        distribution,
        ks_statistic,
        log_likelihood,
        aic,
    })
}

fn estimate(data: &[f64], family: DistributionFamily) -> Result<FittedDistribution, FitError> {
    let m = stats::mean(data);
    let sd = stats::std_dev(data);
    if sd <= 0.0 {
        return Err(FitError::ZeroVariance);
    }

    match family {
        DistributionFamily::Normal => Ok(FittedDistribution::Normal {
            mean: m,
            std_dev: sd,
        }),
        DistributionFamily::LogNormal => {
            require_positive(data, family)?;
            let logs: Vec<f64> = data.iter().map(|x| x.ln()).collect();
            let sigma = stats::std_dev(&logs);
            if sigma <= 0.0 {
                return Err(FitError::ZeroVariance);
            }
            Ok(FittedDistribution::LogNormal {
                mu: stats::mean(&logs),
                sigma,
            })
        }
        DistributionFamily::Gamma => {
            require_positive(data, family)?;
            let mean_log = data.iter().map(|x| x.ln()).sum::<f64>() / data.len() as f64;
            let s = m.ln() - mean_log;
            if s <= 0.0 {
                return Err(FitError::ZeroVariance);
            }
            let shape = (3.0 - s + ((s - 3.0).powi(2) + 24.0 * s).sqrt()) / (12.0 * s);
            Ok(FittedDistribution::Gamma {
                shape,
                scale: m / shape,
            })
        }
        DistributionFamily::Beta => {
            let lower = data.iter().copied().fold(f64::INFINITY, f64::min);
            let upper = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let width = upper - lower;
            let scaled: Vec<f64> = data.iter().map(|x| (x - lower) / width).collect();
            let um = stats::mean(&scaled);
            let uv = stats::variance(&scaled);
            if uv <= 0.0 || uv >= um * (1.0 - um) {
                return Err(FitError::Unsupported {
                    family,
                    reason: "variance too large for a beta shape",
                });
            }
            let common = um * (1.0 - um) / uv - 1.0;
            Ok(FittedDistribution::Beta {
                alpha: um * common,
                beta: (1.0 - um) * common,
                lower,
                upper,
            })
        }
        DistributionFamily::Exponential => {
            if data.iter().any(|&x| x < 0.0) || m <= 0.0 {
                return Err(FitError::Unsupported {
                    family,
                    reason: "requires non-negative observations with positive mean",
                });
            }
            Ok(FittedDistribution::Exponential { rate: 1.0 / m })
        }
    }
}

fn require_positive(data: &[f64], family: DistributionFamily) -> Result<(), FitError> {
    if data.iter().any(|&x| x <= 0.0) {
        return Err(FitError::Unsupported {
            family,
            reason: "requires strictly positive observations",
        });
    }
    Ok(())
}

/// Largest gap between the empirical CDF of `data` and `cdf`.
pub fn ks_statistic(data: &[f64], cdf: impl Fn(f64) -> f64) -> f64 {
    let sorted = stats::sorted(data);
    let n = sorted.len() as f64;
    sorted
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let f = cdf(x);
            (f - i as f64 / n).max((i as f64 + 1.0) / n - f)
        })
        .fold(0.0, f64::max)
}
