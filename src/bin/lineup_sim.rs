//! Lineup Simulation Binary
//!
//! Simulates a demo lineup against synthetic history, then reruns it under
//! each what-if scenario and prints a comparison table.
//!
//! ## Usage
//! ```bash
//! cargo run --bin lineup_sim --release
//! cargo run --bin lineup_sim --release -- config.json
//! RUST_LOG=debug cargo run --bin lineup_sim --release
//! ```

use std::process::ExitCode;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use lineup_simulation::provider::{fetch_history, HistoryWindow, InMemoryOutcomes};
use lineup_simulation::variance::variance_models;
use lineup_simulation::{
    DistributionType, HistoricalOutcome, PlayerProjection, Scenario, SimulationConfig,
    SimulationEngine,
};

const SIMULATION_RUNS: usize = 10_000;
const HISTORY_GAMES: u32 = 40;

fn main() -> ExitCode {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|json| SimulationConfig::from_json_str(&json).map_err(|e| e.to_string()))
        {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => SimulationConfig {
            score_threshold: 70.0,
            ..SimulationConfig::seeded(2024)
        },
    };

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("simulation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn demo_lineup() -> Vec<PlayerProjection> {
    vec![
        PlayerProjection::new(1, "Player 1", 25.0, 5.0).with_position("PG", 8000.0),
        PlayerProjection::new(2, "Player 2", 20.0, 4.0)
            .with_position("SG", 7500.0)
            .with_distribution(DistributionType::Auto),
        PlayerProjection::new(3, "Player 3", 18.0, 3.5)
            .with_position("SF", 7000.0)
            .with_distribution(DistributionType::Gamma),
    ]
}

/// Games where a shared pace factor moves every player together.
fn synthetic_history(lineup: &[PlayerProjection]) -> Vec<HistoricalOutcome> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut rows = Vec::new();
    for game in 0..HISTORY_GAMES {
        let pace: f64 = rng.sample(StandardNormal);
        for player in lineup {
            let noise: f64 = rng.sample(StandardNormal);
            let outcome = player.mean_projection
                + player.std_projection * (0.6 * pace + 0.8 * noise);
            rows.push(HistoricalOutcome::new(player.player_id, game, outcome.max(0.0)));
        }
    }
    rows
}

fn run(config: SimulationConfig) -> lineup_simulation::Result<()> {
    let lineup = demo_lineup();
    let provider = InMemoryOutcomes::new(synthetic_history(&lineup));
    let history = fetch_history(&provider, &lineup, HistoryWindow::default());
    let engine = SimulationEngine::new(config)?;

    println!("=======================================================");
    println!("  Fantasy Lineup Monte Carlo Simulation");
    println!("=======================================================");
    println!();
    println!("Parameters:");
    println!("  Iterations:        {}", SIMULATION_RUNS);
    println!("  Players:           {}", lineup.len());
    println!("  Stored rows:       {}", provider.len());
    println!("  History rows:      {}", history.len());
    println!("  Score threshold:   {:.0}", engine.config().score_threshold);
    println!();

    println!("Baseline");
    println!("{}", "-".repeat(50));
    let baseline = engine.run(&lineup, SIMULATION_RUNS, Some(&history), true)?;
    baseline.print();
    println!();

    println!("Variance Components");
    println!("{}", "-".repeat(50));
    for (player_id, model) in variance_models(&history, &Default::default()) {
        println!(
            "  Player {}:  base {:6.2}  trend {:+.3}/game  detrended {:6.2}",
            player_id, model.base_variance, model.trend_slope, model.trend_adjusted_variance
        );
    }
    println!();

    let scenarios = vec![
        Scenario::injury(1, 4),
        Scenario::injury(2, 5).with_factors(0.6, 1.4),
        Scenario::environmental("Outdoor", 0.95),
        Scenario::rest(vec![2, 3], 1.05),
        Scenario::matchup(3, 0.85),
    ];
    let results = engine.scenario_analysis(&lineup, &scenarios, SIMULATION_RUNS, Some(&history))?;

    println!("=======================================================");
    println!("  Scenario Summary");
    println!("=======================================================");
    println!();
    println!("| Scenario                  |  Mean |   Std |   P10 |   P90 | P(>thr) |");
    println!("|---------------------------|-------|-------|-------|-------|---------|");
    println!(
        "| {:25} | {:5.1} | {:5.1} | {:5.1} | {:5.1} | {:6.1}% |",
        "baseline",
        baseline.mean_score,
        baseline.std_score,
        baseline.percentile_10,
        baseline.percentile_90,
        baseline.probability_above_threshold * 100.0
    );
    for (i, scenario) in scenarios.iter().enumerate() {
        let label = scenario.label(i);
        if let Some(result) = results.get(&label) {
            println!(
                "| {:25} | {:5.1} | {:5.1} | {:5.1} | {:5.1} | {:6.1}% |",
                label,
                result.mean_score,
                result.std_score,
                result.percentile_10,
                result.percentile_90,
                result.probability_above_threshold * 100.0
            );
        }
    }
    println!();

    match serde_json::to_string_pretty(&baseline) {
        Ok(json) => println!("Baseline (JSON):\n{}", json),
        Err(e) => eprintln!("could not serialise baseline: {}", e),
    }
    Ok(())
}
