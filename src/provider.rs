//! Historical Outcome Sources
//!
//! The simulation never talks to a database itself. History is fetched once,
//! up front, through an [`OutcomeProvider`] and handed to the engine fully
//! materialised.

use std::collections::HashMap;

use log::warn;

use crate::error::ProviderError;
use crate::projection::{HistoricalOutcome, PlayerId, PlayerProjection};

/// How much history to pull per player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryWindow {
    /// Most recent games kept per player.
    pub max_games: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self { max_games: 50 }
    }
}

pub trait OutcomeProvider {
    /// Outcomes for `player_ids`, chronological per player.
    fn fetch_outcomes(
        &self,
        player_ids: &[PlayerId],
        window: HistoryWindow,
    ) -> Result<Vec<HistoricalOutcome>, ProviderError>;
}

/// Fixture-backed provider; rows are assumed chronological.
#[derive(Clone, Debug, Default)]
pub struct InMemoryOutcomes {
    rows: Vec<HistoricalOutcome>,
}

impl InMemoryOutcomes {
    pub fn new(rows: Vec<HistoricalOutcome>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl OutcomeProvider for InMemoryOutcomes {
    fn fetch_outcomes(
        &self,
        player_ids: &[PlayerId],
        window: HistoryWindow,
    ) -> Result<Vec<HistoricalOutcome>, ProviderError> {
        let mut per_player: HashMap<PlayerId, usize> = HashMap::new();
        for row in &self.rows {
            *per_player.entry(row.player_id).or_default() += 1;
        }

        let mut seen: HashMap<PlayerId, usize> = HashMap::new();
        Ok(self
            .rows
            .iter()
            .filter(|row| player_ids.contains(&row.player_id))
            .filter(|row| {
                let index = seen.entry(row.player_id).or_default();
                *index += 1;
                let total = per_player[&row.player_id];
                total - *index < window.max_games
            })
            .cloned()
            .collect())
    }
}

/// History for a lineup, or an empty set when the source fails. An empty set
/// makes the engine run without correlation.
pub fn fetch_history<P: OutcomeProvider + ?Sized>(
    provider: &P,
    lineup: &[PlayerProjection],
    window: HistoryWindow,
) -> Vec<HistoricalOutcome> {
    let player_ids: Vec<PlayerId> = lineup.iter().map(|p| p.player_id).collect();
    match provider.fetch_outcomes(&player_ids, window) {
        Ok(rows) => rows,
        Err(e) => {
            warn!("history unavailable, simulating without correlation: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    impl OutcomeProvider for Offline {
        fn fetch_outcomes(
            &self,
            _player_ids: &[PlayerId],
            _window: HistoryWindow,
        ) -> Result<Vec<HistoricalOutcome>, ProviderError> {
            Err(ProviderError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn test_window_keeps_most_recent_games() {
        let rows: Vec<HistoricalOutcome> = (0..10)
            .map(|g| HistoricalOutcome::new(1, g, g as f64))
            .chain((0..3).map(|g| HistoricalOutcome::new(2, g, 100.0)))
            .collect();
        let provider = InMemoryOutcomes::new(rows);
        assert_eq!(provider.len(), 13);
        assert!(!provider.is_empty());
        let fetched = provider
            .fetch_outcomes(&[1, 2], HistoryWindow { max_games: 4 })
            .unwrap();

        let player_one: Vec<f64> = fetched
            .iter()
            .filter(|r| r.player_id == 1)
            .map(|r| r.outcome)
            .collect();
        assert_eq!(player_one, vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(fetched.iter().filter(|r| r.player_id == 2).count(), 3);
    }

    #[test]
    fn test_unrequested_players_filtered() {
        let provider = InMemoryOutcomes::new(vec![
            HistoricalOutcome::new(1, 0, 10.0),
            HistoricalOutcome::new(9, 0, 12.0),
        ]);
        let fetched = provider
            .fetch_outcomes(&[1], HistoryWindow::default())
            .unwrap();
        assert_eq!(fetched.len(), 1);
    }

    #[test]
    fn test_empty_provider_yields_no_rows() {
        let provider = InMemoryOutcomes::default();
        assert!(provider.is_empty());
        let lineup = vec![PlayerProjection::new(1, "Player 1", 20.0, 4.0)];
        assert!(fetch_history(&provider, &lineup, HistoryWindow::default()).is_empty());
    }

    #[test]
    fn test_failed_source_yields_empty_history() {
        let lineup = vec![PlayerProjection::new(1, "Player 1", 20.0, 4.0)];
        assert!(fetch_history(&Offline, &lineup, HistoryWindow::default()).is_empty());
    }
}
