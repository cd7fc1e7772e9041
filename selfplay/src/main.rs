//! Selfplay - tic-tac-toe games between two MCTS agents
//!
//! A short-running process that:
//! 1. Builds two multi-threaded search agents from the central config
//! 2. Plays the configured number of games, each agent following every move
//!    so its searched subtree carries over to its next turn
//! 3. Logs per-game results and a final summary, optionally written as JSON

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use games_tictactoe::TicTacToe;
use mcts::{Evaluator, MctsAgent, UniformEvaluator};
use tracing::{error, info};

mod config;
mod game;
mod rollout;

use crate::config::{Config, EvaluatorKind};
use crate::game::{play_game, RunStats};
use crate::rollout::RolloutEvaluator;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_thread_names(true))
        .with(filter)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;

    init_tracing(&config.log_level)?;
    info!(
        games = config.games,
        movetime_ms = config.movetime_ms,
        nodes = config.nodes,
        threads = config.threads,
        batch_size = config.batch_size,
        tree_reuse = config.tree_reuse,
        evaluator = ?config.evaluator,
        "Starting self-play"
    );

    let result = match config.evaluator {
        EvaluatorKind::Uniform => run(&config, |_| UniformEvaluator::new()),
        EvaluatorKind::Rollout => run(&config, |seed| RolloutEvaluator::new(config.rollouts, seed)),
    };

    match result {
        Ok(stats) => {
            info!(
                games = stats.games,
                x_wins = stats.x_wins,
                o_wins = stats.o_wins,
                draws = stats.draws,
                avg_game_length = format_args!("{:.2}", stats.avg_game_length),
                avg_playouts_per_move = format_args!("{:.0}", stats.avg_playouts_per_move),
                reused_searches = stats.reused_searches,
                runtime_seconds = format_args!("{:.2}", stats.runtime_seconds),
                "Self-play completed"
            );
            Ok(())
        }
        Err(e) => {
            error!("Self-play failed: {:#}", e);
            Err(e)
        }
    }
}

fn run<E, F>(config: &Config, make_evaluator: F) -> Result<RunStats>
where
    E: Evaluator<TicTacToe>,
    F: Fn(u64) -> E,
{
    let started = Instant::now();
    let limits = config.limits();
    let mut players = [
        MctsAgent::new(config.search_config(0), make_evaluator(config.seed))?,
        MctsAgent::new(config.search_config(1), make_evaluator(config.seed.wrapping_add(1)))?,
    ];

    let mut stats = RunStats::default();
    for game_idx in 0..config.games {
        // alternate colours so neither agent always moves first
        if game_idx > 0 {
            players.swap(0, 1);
        }
        let game = play_game(&mut players, limits)?;
        info!(
            game = game_idx + 1,
            outcome = ?game.outcome,
            length = game.moves.len(),
            avg_nps = game.avg_nps as u64,
            "Game finished\n{}",
            game.final_position
        );
        stats.record(&game);
    }
    stats.finish(started);

    if let Some(path) = &config.stats_path {
        stats.write_json(path)?;
        info!(path = %path.display(), "Wrote run summary");
    }
    Ok(stats)
}
