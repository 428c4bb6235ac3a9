//! Score Statistics
//!
//! Summary statistics over simulated lineup totals.
//!
//! ## Metrics
//! - Mean and population standard deviation
//! - Interpolated percentiles
//! - Value at Risk (VaR) and Expected Shortfall (CVaR) on the low tail
//! - Downside deviation
//! - Bootstrap resampling of a series mean

use rand::Rng;
use serde::{Deserialize, Serialize};

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population variance (divides by `n`).
pub fn variance(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64
}

pub fn std_dev(data: &[f64]) -> f64 {
    variance(data).sqrt()
}

pub fn sorted(data: &[f64]) -> Vec<f64> {
    let mut out = data.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Percentile of already-sorted data, `p` in `[0, 1]`, linearly interpolated
/// between closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() as f64 - 1.0) * p.clamp(0.0, 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Mean of the observations at or below the `p` percentile.
pub fn expected_shortfall(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let cutoff = percentile(sorted, p);
    let tail: Vec<f64> = sorted.iter().copied().take_while(|&x| x <= cutoff).collect();
    if tail.is_empty() {
        return cutoff;
    }
    mean(&tail)
}

/// Share of observations strictly above `threshold`.
pub fn exceedance_probability(data: &[f64], threshold: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().filter(|&&x| x > threshold).count() as f64 / data.len() as f64
}

/// Downside risk of a lineup score distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// 5th percentile of the lineup total.
    pub var_95: f64,
    pub cvar_95: f64,
    pub downside_deviation: f64,
    /// Mean over standard deviation; zero when the spread is zero.
    pub score_to_risk: f64,
    pub min_score: f64,
    pub max_score: f64,
    /// Mean score per 1000 of lineup salary; zero without salary data.
    pub value_score: f64,
}

impl RiskProfile {
    pub fn from_sorted(sorted: &[f64], total_salary: f64) -> Self {
        let m = mean(sorted);
        let sd = std_dev(sorted);
        let below: Vec<f64> = sorted.iter().copied().filter(|&x| x < m).collect();

        Self {
            var_95: percentile(sorted, 0.05),
            cvar_95: expected_shortfall(sorted, 0.05),
            downside_deviation: std_dev(&below),
            score_to_risk: if sd > 0.0 { m / sd } else { 0.0 },
            min_score: sorted.first().copied().unwrap_or(0.0),
            max_score: sorted.last().copied().unwrap_or(0.0),
            value_score: if total_salary > 0.0 {
                m / (total_salary / 1000.0)
            } else {
                0.0
            },
        }
    }
}

/// Sampling distribution of a series mean estimated by resampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapSummary {
    pub bootstrap_mean: f64,
    pub bootstrap_std: f64,
    pub confidence_interval: (f64, f64),
    /// Bootstrap mean minus the sample mean.
    pub bias: f64,
    pub bias_corrected_mean: f64,
    pub resamples: usize,
    pub confidence_level: f64,
}

/// Resamples `data` with replacement `resamples` times and summarises the
/// resampled means. `None` for an empty series or zero resamples.
pub fn bootstrap<R: Rng + ?Sized>(
    data: &[f64],
    resamples: usize,
    confidence_level: f64,
    rng: &mut R,
) -> Option<BootstrapSummary> {
    if data.is_empty() || resamples == 0 {
        return None;
    }
    let n = data.len();
    let means: Vec<f64> = (0..resamples)
        .map(|_| (0..n).map(|_| data[rng.gen_range(0..n)]).sum::<f64>() / n as f64)
        .collect();

    let alpha = 1.0 - confidence_level.clamp(0.0, 1.0);
    let sorted_means = sorted(&means);
    let bootstrap_mean = mean(&means);
    let bias = bootstrap_mean - mean(data);

    Some(BootstrapSummary {
        bootstrap_mean,
        bootstrap_std: std_dev(&means),
        confidence_interval: (
            percentile(&sorted_means, alpha / 2.0),
            percentile(&sorted_means, 1.0 - alpha / 2.0),
        ),
        bias,
        bias_corrected_mean: mean(data) - bias,
        resamples,
        confidence_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let data: Vec<f64> = (0..=10).map(|i| i as f64).collect();

        assert!((percentile(&data, 0.5) - 5.0).abs() < 1e-12);
        assert!((percentile(&data, 0.25) - 2.5).abs() < 1e-12);
        assert!((percentile(&data, 0.975) - 9.75).abs() < 1e-12);
        assert_eq!(percentile(&data, 0.0), 0.0);
        assert_eq!(percentile(&data, 1.0), 10.0);
    }

    #[test]
    fn test_var_is_low_tail() {
        let data: Vec<f64> = (0..100).map(|i| i as f64 * 2.0).collect();
        let profile = RiskProfile::from_sorted(&sorted(&data), 0.0);

        // 5th percentile of 0, 2, ..., 198
        assert!((profile.var_95 - 9.9).abs() < 1e-9);
        assert!(profile.cvar_95 <= profile.var_95);
        assert!((profile.cvar_95 - 4.0).abs() < 1e-9);
        assert_eq!(profile.min_score, 0.0);
        assert_eq!(profile.max_score, 198.0);
    }

    #[test]
    fn test_value_score_per_thousand_salary() {
        let data = [240.0, 260.0];
        let profile = RiskProfile::from_sorted(&data, 50_000.0);
        assert!((profile.value_score - 5.0).abs() < 1e-12);
        assert_eq!(RiskProfile::from_sorted(&data, 0.0).value_score, 0.0);
    }

    #[test]
    fn test_bootstrap_centres_on_sample_mean() {
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;

        let data: Vec<f64> = (1..=40).map(|i| (i % 10) as f64 * 3.0).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let summary = bootstrap(&data, 2000, 0.95, &mut rng).unwrap();
        let sample_mean = mean(&data);

        assert!(summary.bias.abs() < 0.5);
        assert!((summary.bias_corrected_mean - (sample_mean - summary.bias)).abs() < 1e-12);
        assert!(summary.confidence_interval.0 < sample_mean);
        assert!(sample_mean < summary.confidence_interval.1);
        // Standard error of the mean: std / sqrt(n)
        let se = std_dev(&data) / (data.len() as f64).sqrt();
        assert!((summary.bootstrap_std - se).abs() < 0.2 * se);
        assert_eq!(summary.resamples, 2000);
    }

    #[test]
    fn test_bootstrap_rejects_empty_input() {
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(bootstrap(&[], 100, 0.95, &mut rng).is_none());
        assert!(bootstrap(&[1.0, 2.0], 0, 0.95, &mut rng).is_none());
    }

    #[test]
    fn test_population_std() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&data) - 5.0).abs() < 1e-12);
        assert!((std_dev(&data) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_expected_shortfall_low_tail() {
        let data: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let es = expected_shortfall(&data, 0.05);

        assert!(es <= percentile(&data, 0.05));
        assert!((es - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_exceedance_is_strict() {
        let data = [100.0, 200.0, 300.0, 301.0];
        assert!((exceedance_probability(&data, 300.0) - 0.25).abs() < 1e-12);
        assert_eq!(exceedance_probability(&[], 300.0), 0.0);
    }

    #[test]
    fn test_risk_profile_constant_scores() {
        let profile = RiskProfile::from_sorted(&[50.0; 20], 0.0);

        assert_eq!(profile.var_95, 50.0);
        assert_eq!(profile.cvar_95, 50.0);
        assert_eq!(profile.downside_deviation, 0.0);
        assert_eq!(profile.score_to_risk, 0.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
        assert_eq!(expected_shortfall(&[], 0.05), 0.0);
    }
}
