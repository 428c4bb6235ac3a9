//! Player Correlation
//!
//! Builds a lineup correlation matrix from shared games and turns it into a
//! transform that correlates independent standard-normal draws.
//!
//! ## Steps
//! 1. Pivot outcomes into games x players
//! 2. Pearson correlation per player pair over the games both played
//! 3. Shift the diagonal when the smallest eigenvalue is below epsilon
//! 4. Lower Cholesky factor `L`; correlated draws are `L z`
//!
//! A pair with too few shared games has no usable correlation and is
//! treated as independent.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use serde::Serialize;

use crate::config::CorrelationConfig;
use crate::projection::{GameId, HistoricalOutcome, PlayerId};
use crate::stats;

const EIGEN_MAX_ITERATIONS: usize = 1000;

/// Symmetric correlation matrix indexed by player, in lineup order.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationMatrix {
    pub player_ids: Vec<PlayerId>,
    pub values: DMatrix<f64>,
    /// Number of player pairs backed by enough shared games.
    pub informative_pairs: usize,
}

impl CorrelationMatrix {
    pub fn identity(player_ids: &[PlayerId]) -> Self {
        let n = player_ids.len();
        Self {
            player_ids: player_ids.to_vec(),
            values: DMatrix::identity(n, n),
            informative_pairs: 0,
        }
    }

    pub fn get(&self, a: PlayerId, b: PlayerId) -> Option<f64> {
        let i = self.player_ids.iter().position(|&p| p == a)?;
        let j = self.player_ids.iter().position(|&p| p == b)?;
        Some(self.values[(i, j)])
    }

    /// True when at least two players share enough games to correlate.
    pub fn is_informative(&self) -> bool {
        self.informative_pairs > 0
    }
}

/// Result of the positive-definiteness repair.
#[derive(Clone, Debug, PartialEq)]
pub struct Repair {
    pub matrix: DMatrix<f64>,
    pub min_eigenvalue: f64,
    /// Amount added to every diagonal entry; zero when no repair was needed.
    pub shift: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformStatus {
    Cholesky,
    /// Decomposition failed; draws stay independent.
    Downgraded,
}

#[derive(Clone, Debug)]
pub struct CorrelationTransform {
    pub player_ids: Vec<PlayerId>,
    lower: DMatrix<f64>,
    pub status: TransformStatus,
    pub shift: f64,
}

impl CorrelationTransform {
    pub fn identity(player_ids: &[PlayerId], status: TransformStatus) -> Self {
        let n = player_ids.len();
        Self {
            player_ids: player_ids.to_vec(),
            lower: DMatrix::identity(n, n),
            status,
            shift: 0.0,
        }
    }

    pub fn lower(&self) -> &DMatrix<f64> {
        &self.lower
    }

    pub fn dim(&self) -> usize {
        self.player_ids.len()
    }

    /// Writes `L z` into `out`. Both slices must have the transform's dimension.
    pub fn apply_into(&self, independent: &[f64], out: &mut [f64]) {
        let n = self.dim();
        for i in 0..n {
            let mut acc = 0.0;
            for j in 0..=i {
                acc += self.lower[(i, j)] * independent[j];
            }
            out[i] = acc;
        }
    }

    pub fn apply(&self, independent: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.dim()];
        self.apply_into(independent, &mut out);
        out
    }
}

#[derive(Clone, Debug)]
pub struct CorrelationModel {
    epsilon: f64,
    min_shared_games: usize,
}

impl Default for CorrelationModel {
    fn default() -> Self {
        Self::new(&CorrelationConfig::default())
    }
}

impl CorrelationModel {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            epsilon: config.epsilon,
            min_shared_games: config.min_shared_games.max(2),
        }
    }

    /// Pairwise-complete Pearson correlation over the given players.
    pub fn correlation_matrix(
        &self,
        player_ids: &[PlayerId],
        outcomes: &[HistoricalOutcome],
    ) -> CorrelationMatrix {
        let n = player_ids.len();
        let mut columns: HashMap<PlayerId, BTreeMap<GameId, f64>> = HashMap::new();
        for row in outcomes.iter().filter(|r| r.outcome.is_finite()) {
            if player_ids.contains(&row.player_id) {
                columns
                    .entry(row.player_id)
                    .or_default()
                    .insert(row.game_id, row.outcome);
            }
        }

        let mut matrix = CorrelationMatrix::identity(player_ids);
        for i in 0..n {
            for j in (i + 1)..n {
                let r = match (columns.get(&player_ids[i]), columns.get(&player_ids[j])) {
                    (Some(a), Some(b)) => self.pair_correlation(a, b),
                    _ => None,
                };
                if let Some(r) = r {
                    matrix.informative_pairs += 1;
                    matrix.values[(i, j)] = r;
                    matrix.values[(j, i)] = r;
                }
            }
        }

        debug!(
            "correlation matrix over {} players, {} informative pairs",
            n, matrix.informative_pairs
        );
        matrix
    }

    fn pair_correlation(
        &self,
        a: &BTreeMap<GameId, f64>,
        b: &BTreeMap<GameId, f64>,
    ) -> Option<f64> {
        let (xs, ys): (Vec<f64>, Vec<f64>) = a
            .iter()
            .filter_map(|(game, &x)| b.get(game).map(|&y| (x, y)))
            .unzip();
        if xs.len() < self.min_shared_games {
            return None;
        }
        pearson(&xs, &ys)
    }

    pub fn repair(&self, matrix: &DMatrix<f64>) -> Option<Repair> {
        ensure_positive_definite(matrix, self.epsilon)
    }

    /// Repairs and decomposes the matrix, falling back to independence when
    /// the factorisation is impossible.
    pub fn transform(&self, matrix: &CorrelationMatrix) -> CorrelationTransform {
        let Some(repair) = self.repair(&matrix.values) else {
            warn!("eigen decomposition did not converge, sampling players independently");
            return CorrelationTransform::identity(&matrix.player_ids, TransformStatus::Downgraded);
        };
        if repair.shift > 0.0 {
            debug!(
                "min eigenvalue {:.3e}, shifted diagonal by {:.3e}",
                repair.min_eigenvalue, repair.shift
            );
        }

        match Cholesky::new(repair.matrix) {
            Some(cholesky) => CorrelationTransform {
                player_ids: matrix.player_ids.clone(),
                lower: cholesky.l(),
                status: TransformStatus::Cholesky,
                shift: repair.shift,
            },
            None => {
                warn!("cholesky factorisation failed after repair, sampling players independently");
                CorrelationTransform::identity(&matrix.player_ids, TransformStatus::Downgraded)
            }
        }
    }
}

/// Shifts the diagonal by `epsilon - min_eigenvalue` when the smallest
/// eigenvalue is below `epsilon`. `None` when the eigenvalues cannot be found.
pub fn ensure_positive_definite(matrix: &DMatrix<f64>, epsilon: f64) -> Option<Repair> {
    if matrix.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let eigen = SymmetricEigen::try_new(matrix.clone(), f64::EPSILON, EIGEN_MAX_ITERATIONS)?;
    let min_eigenvalue = eigen
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);

    let mut repaired = matrix.clone();
    let mut shift = 0.0;
    if min_eigenvalue < epsilon {
        shift = epsilon - min_eigenvalue;
        for i in 0..repaired.nrows() {
            repaired[(i, i)] += shift;
        }
    }

    Some(Repair {
        matrix: repaired,
        min_eigenvalue,
        shift,
    })
}

/// Pearson correlation, `None` when either side has no spread.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = stats::mean(xs);
    let my = stats::mean(ys);
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    Some((cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(player: PlayerId, values: &[f64]) -> Vec<HistoricalOutcome> {
        values
            .iter()
            .enumerate()
            .map(|(g, &v)| HistoricalOutcome::new(player, g as GameId, v))
            .collect()
    }

    fn min_eigenvalue(m: &DMatrix<f64>) -> f64 {
        SymmetricEigen::new(m.clone())
            .eigenvalues
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn test_pearson_known_values() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&xs, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &[8.0, 6.0, 4.0, 2.0]).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&xs, &[5.0; 4]), None);
    }

    #[test]
    fn test_missing_games_excluded_not_zeroed() {
        let mut outcomes = rows(1, &[10.0, 20.0, 30.0, 40.0, 50.0]);
        // Player 2 only played games 0, 1, 2, 4 and tracks player 1 exactly.
        for (g, v) in [(0, 5.0), (1, 10.0), (2, 15.0), (4, 25.0)] {
            outcomes.push(HistoricalOutcome::new(2, g, v));
        }
        let matrix = CorrelationModel::default().correlation_matrix(&[1, 2], &outcomes);

        assert!((matrix.get(1, 2).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(matrix.informative_pairs, 1);
    }

    #[test]
    fn test_too_few_shared_games_is_independent() {
        let mut outcomes = rows(1, &[10.0, 20.0, 30.0]);
        outcomes.push(HistoricalOutcome::new(2, 0, 4.0));
        outcomes.push(HistoricalOutcome::new(2, 1, 9.0));
        let matrix = CorrelationModel::default().correlation_matrix(&[1, 2], &outcomes);

        assert_eq!(matrix.get(1, 2), Some(0.0));
        assert!(!matrix.is_informative());
    }

    #[test]
    fn test_repair_makes_indefinite_matrix_decomposable() {
        let m = DMatrix::from_row_slice(3, 3, &[1.0, 0.9, -0.9, 0.9, 1.0, 0.9, -0.9, 0.9, 1.0]);
        assert!(min_eigenvalue(&m) < 0.0);

        let repair = ensure_positive_definite(&m, 1e-8).unwrap();
        assert!(repair.shift > 0.0);
        assert!(min_eigenvalue(&repair.matrix) >= -1e-10);
        assert!(Cholesky::new(repair.matrix).is_some());
    }

    #[test]
    fn test_anti_correlated_pair_decomposes() {
        let mut outcomes = rows(1, &[10.0, 20.0, 30.0, 40.0]);
        outcomes.extend(rows(2, &[40.0, 30.0, 20.0, 10.0]));
        let model = CorrelationModel::default();
        let matrix = model.correlation_matrix(&[1, 2], &outcomes);
        assert!((matrix.get(1, 2).unwrap() + 1.0).abs() < 1e-12);

        let transform = model.transform(&matrix);
        assert_eq!(transform.status, TransformStatus::Cholesky);
        let out = transform.apply(&[1.0, 0.0]);
        assert!(out[1] < 0.0);
    }

    #[test]
    fn test_positive_definite_matrix_untouched() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        let repair = ensure_positive_definite(&m, 1e-8).unwrap();
        assert_eq!(repair.shift, 0.0);
        assert_eq!(repair.matrix, m);
    }

    #[test]
    fn test_non_finite_matrix_downgrades() {
        let matrix = CorrelationMatrix {
            player_ids: vec![1, 2],
            values: DMatrix::from_row_slice(2, 2, &[1.0, f64::NAN, f64::NAN, 1.0]),
            informative_pairs: 1,
        };
        let transform = CorrelationModel::default().transform(&matrix);

        assert_eq!(transform.status, TransformStatus::Downgraded);
        assert_eq!(transform.apply(&[0.3, -0.7]), vec![0.3, -0.7]);
    }

    #[test]
    fn test_lower_factor_reproduces_matrix() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.6, 0.6, 1.0]);
        let matrix = CorrelationMatrix {
            player_ids: vec![1, 2],
            values: m.clone(),
            informative_pairs: 1,
        };
        let transform = CorrelationModel::default().transform(&matrix);
        let l = transform.lower();
        let rebuilt = l * l.transpose();

        let worst = (rebuilt - m).iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        assert!(worst < 1e-12);
    }
}
