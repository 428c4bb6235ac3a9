//! Per-Player Samplers
//!
//! Turns a projection (and optionally a fitted distribution) into something
//! that draws fantasy points. Declared families are parameterised by moment
//! matching so every sampler reproduces the projection's mean and standard
//! deviation:
//!
//! - Normal: `N(mean, std)`
//! - Log-normal: `sigma^2 = ln(1 + (std/mean)^2)`, `mu = ln(mean) - sigma^2/2`
//! - Gamma: `shape = (mean/std)^2`, `scale = std^2/mean`
//! - Beta: support `[0, mean + 4 std]`, shape from the scaled moments
//! - Exponential: `rate = 1/mean` (its spread is fixed by the mean)
//!
//! A fitted distribution keeps its shape and is shifted and stretched onto
//! the projection's moments.

use rand::Rng;
use rand_distr::{Beta, Distribution, Exp, Gamma, LogNormal, Normal};

use crate::error::SamplingError;
use crate::fitting::FittedDistribution;
use crate::projection::{DistributionFamily, PlayerProjection};

/// Width of the beta support in standard deviations above the mean.
const BETA_UPPER_SPREAD: f64 = 4.0;

#[derive(Clone, Debug)]
pub enum Sampler {
    Constant(f64),
    Normal(Normal<f64>),
    LogNormal(LogNormal<f64>),
    Gamma(Gamma<f64>),
    Beta {
        dist: Beta<f64>,
        lower: f64,
        width: f64,
    },
    Exponential(Exp<f64>),
    /// Affine map `to_mean + (x - from_mean) * ratio` over an inner sampler.
    Rescaled {
        inner: Box<Sampler>,
        from_mean: f64,
        to_mean: f64,
        ratio: f64,
    },
}

impl Sampler {
    /// Sampler for a projection. `fitted` is the distribution selected from the
    /// player's history when the projection asks for automatic fitting.
    pub fn for_projection(
        projection: &PlayerProjection,
        fitted: Option<&FittedDistribution>,
    ) -> Result<Self, SamplingError> {
        let mean = projection.mean_projection;
        let std_dev = projection.std_projection;
        match (projection.distribution_type.family(), fitted) {
            (Some(family), _) => Self::for_family(family, mean, std_dev),
            (None, Some(fitted)) => Self::fitted_onto(fitted, mean, std_dev),
            (None, None) => Self::for_family(DistributionFamily::Normal, mean, std_dev),
        }
    }

    pub fn for_family(
        family: DistributionFamily,
        mean: f64,
        std_dev: f64,
    ) -> Result<Self, SamplingError> {
        let invalid = |reason: String| SamplingError::InvalidParameters {
            family,
            mean,
            std_dev,
            reason,
        };

        if !mean.is_finite() || !std_dev.is_finite() || mean < 0.0 || std_dev < 0.0 {
            return Err(invalid("parameters must be finite and non-negative".into()));
        }
        if std_dev == 0.0 {
            return Ok(Self::Constant(mean));
        }

        match family {
            DistributionFamily::Normal => Normal::new(mean, std_dev)
                .map(Self::Normal)
                .map_err(|e| invalid(e.to_string())),
            DistributionFamily::LogNormal => {
                if mean <= 0.0 {
                    return Err(invalid("log-normal needs a positive mean".into()));
                }
                let s2 = (1.0 + (std_dev / mean).powi(2)).ln();
                LogNormal::new(mean.ln() - s2 / 2.0, s2.sqrt())
                    .map(Self::LogNormal)
                    .map_err(|e| invalid(e.to_string()))
            }
            DistributionFamily::Gamma => {
                if mean <= 0.0 {
                    return Err(invalid("gamma needs a positive mean".into()));
                }
                Gamma::new((mean / std_dev).powi(2), std_dev * std_dev / mean)
                    .map(Self::Gamma)
                    .map_err(|e| invalid(e.to_string()))
            }
            DistributionFamily::Beta => {
                if std_dev >= BETA_UPPER_SPREAD * mean {
                    return Err(invalid("spread too wide for a beta shape".into()));
                }
                let upper = mean + BETA_UPPER_SPREAD * std_dev;
                let m = mean / upper;
                let common = m * (1.0 - m) / (std_dev / upper).powi(2) - 1.0;
                Beta::new(m * common, (1.0 - m) * common)
                    .map(|dist| Self::Beta {
                        dist,
                        lower: 0.0,
                        width: upper,
                    })
                    .map_err(|e| invalid(e.to_string()))
            }
            DistributionFamily::Exponential => {
                if mean <= 0.0 {
                    return Err(invalid("exponential needs a positive mean".into()));
                }
                Exp::new(1.0 / mean)
                    .map(Self::Exponential)
                    .map_err(|e| invalid(e.to_string()))
            }
        }
    }

    /// Sampler reproducing a fitted distribution in its own units.
    pub fn from_fitted(fitted: &FittedDistribution) -> Result<Self, SamplingError> {
        let family = fitted.family();
        let invalid = |reason: String| SamplingError::InvalidParameters {
            family,
            mean: fitted.mean(),
            std_dev: fitted.std_dev(),
            reason,
        };

        match *fitted {
            FittedDistribution::Normal { mean, std_dev } => Normal::new(mean, std_dev)
                .map(Self::Normal)
                .map_err(|e| invalid(e.to_string())),
            FittedDistribution::LogNormal { mu, sigma } => LogNormal::new(mu, sigma)
                .map(Self::LogNormal)
                .map_err(|e| invalid(e.to_string())),
            FittedDistribution::Gamma { shape, scale } => Gamma::new(shape, scale)
                .map(Self::Gamma)
                .map_err(|e| invalid(e.to_string())),
            FittedDistribution::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => Beta::new(alpha, beta)
                .map(|dist| Self::Beta {
                    dist,
                    lower,
                    width: upper - lower,
                })
                .map_err(|e| invalid(e.to_string())),
            FittedDistribution::Exponential { rate } => Exp::new(rate)
                .map(Self::Exponential)
                .map_err(|e| invalid(e.to_string())),
        }
    }

    /// Fitted shape carried onto the given mean and standard deviation.
    pub fn fitted_onto(
        fitted: &FittedDistribution,
        mean: f64,
        std_dev: f64,
    ) -> Result<Self, SamplingError> {
        let from_mean = fitted.mean();
        let from_std = fitted.std_dev();
        let invalid = |reason: &str| SamplingError::InvalidParameters {
            family: fitted.family(),
            mean,
            std_dev,
            reason: reason.to_string(),
        };

        if !mean.is_finite() || !std_dev.is_finite() || mean < 0.0 || std_dev < 0.0 {
            return Err(invalid("parameters must be finite and non-negative"));
        }
        if std_dev == 0.0 {
            return Ok(Self::Constant(mean));
        }
        if !from_mean.is_finite() || !from_std.is_finite() || from_std <= 0.0 {
            return Err(invalid("fitted distribution has no usable spread"));
        }

        Ok(Self::Rescaled {
            inner: Box::new(Self::from_fitted(fitted)?),
            from_mean,
            to_mean: mean,
            ratio: std_dev / from_std,
        })
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, SamplingError> {
        let value = match self {
            Self::Constant(v) => *v,
            Self::Normal(d) => d.sample(rng),
            Self::LogNormal(d) => d.sample(rng),
            Self::Gamma(d) => d.sample(rng),
            Self::Beta { dist, lower, width } => lower + width * dist.sample(rng),
            Self::Exponential(d) => d.sample(rng),
            Self::Rescaled {
                inner,
                from_mean,
                to_mean,
                ratio,
            } => to_mean + (inner.draw(rng)? - from_mean) * ratio,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(SamplingError::NonFiniteDraw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const N: usize = 100_000;

    fn sample_moments(sampler: &Sampler, seed: u64) -> (f64, f64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let draws: Vec<f64> = (0..N).map(|_| sampler.draw(&mut rng).unwrap()).collect();
        (stats::mean(&draws), stats::std_dev(&draws))
    }

    fn assert_close(actual: f64, expected: f64, rel: f64) {
        assert!(
            (actual - expected).abs() <= rel * expected.abs(),
            "{} not within {}% of {}",
            actual,
            rel * 100.0,
            expected
        );
    }

    #[test]
    fn test_declared_families_converge_to_projection() {
        for family in DistributionFamily::all() {
            let sampler = Sampler::for_family(family, 20.0, 5.0).unwrap();
            let (m, sd) = sample_moments(&sampler, 11);
            let expected_sd = if family == DistributionFamily::Exponential { 20.0 } else { 5.0 };

            assert_close(m, 20.0, 0.02);
            assert_close(sd, expected_sd, 0.03);
        }
    }

    #[test]
    fn test_fitted_distributions_converge_to_theory() {
        let fitted = [
            FittedDistribution::Normal {
                mean: 25.0,
                std_dev: 6.0,
            },
            FittedDistribution::LogNormal {
                mu: 3.0,
                sigma: 0.3,
            },
            FittedDistribution::Gamma {
                shape: 3.0,
                scale: 7.0,
            },
            FittedDistribution::Beta {
                alpha: 2.0,
                beta: 5.0,
                lower: 5.0,
                upper: 45.0,
            },
            FittedDistribution::Exponential { rate: 0.1 },
        ];

        for (i, dist) in fitted.iter().enumerate() {
            let sampler = Sampler::from_fitted(dist).unwrap();
            let (m, sd) = sample_moments(&sampler, 100 + i as u64);

            assert_close(m, dist.mean(), 0.02);
            assert_close(sd, dist.std_dev(), 0.03);
        }
    }

    #[test]
    fn test_fitted_shape_moved_onto_projection() {
        let fitted = FittedDistribution::Gamma {
            shape: 2.0,
            scale: 5.0,
        };
        let sampler = Sampler::fitted_onto(&fitted, 30.0, 4.0).unwrap();
        let (m, sd) = sample_moments(&sampler, 7);

        assert_close(m, 30.0, 0.02);
        assert_close(sd, 4.0, 0.03);
    }

    #[test]
    fn test_zero_spread_is_constant() {
        let sampler = Sampler::for_family(DistributionFamily::Gamma, 12.0, 0.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(sampler.draw(&mut rng).unwrap(), 12.0);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(Sampler::for_family(DistributionFamily::Normal, -1.0, 2.0).is_err());
        assert!(Sampler::for_family(DistributionFamily::Normal, 10.0, f64::NAN).is_err());
        assert!(Sampler::for_family(DistributionFamily::LogNormal, 0.0, 2.0).is_err());
        assert!(Sampler::for_family(DistributionFamily::Beta, 2.0, 10.0).is_err());
    }

    #[test]
    fn test_auto_without_history_is_normal() {
        let player = PlayerProjection::new(1, "Center", 22.0, 4.0)
            .with_distribution(crate::projection::DistributionType::Auto);
        let sampler = Sampler::for_projection(&player, None).unwrap();
        assert!(matches!(sampler, Sampler::Normal(_)));
    }

    #[test]
    fn test_beta_stays_in_support() {
        let sampler = Sampler::for_family(DistributionFamily::Beta, 10.0, 3.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..10_000 {
            let x = sampler.draw(&mut rng).unwrap();
            assert!((0.0..=22.0).contains(&x));
        }
    }
}
