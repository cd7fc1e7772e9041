//! Self-play game loop and run statistics.

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use games_tictactoe::TicTacToe;
use mcts::{Evaluator, MctsAgent, SearchLimits, SearchStats};
use serde::Serialize;
use tracing::{debug, warn};

/// Outcome of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    XWins,
    OWins,
    Draw,
}

impl Outcome {
    fn of(position: &TicTacToe) -> Option<Self> {
        match position.winner() {
            1 => Some(Self::XWins),
            2 => Some(Self::OWins),
            3 => Some(Self::Draw),
            _ => None,
        }
    }
}

/// One searched move.
#[derive(Debug, Clone, Serialize)]
pub struct MoveRecord {
    pub mv: u8,
    pub value: f32,
    pub reused: bool,
    pub stats: SearchStats,
}

/// A complete game.
#[derive(Debug, Clone, Serialize)]
pub struct GameRecord {
    pub moves: Vec<MoveRecord>,
    pub outcome: Outcome,
    pub final_position: String,
    /// Playouts per second, averaged over both agents' searches.
    pub avg_nps: f64,
}

/// Play one game from the initial position. `players[0]` plays X.
///
/// Both agents follow every move, the mover with `is_own`, so each can reuse
/// its subtree on the next turn.
pub fn play_game<E: Evaluator<TicTacToe>>(
    players: &mut [MctsAgent<TicTacToe, E>; 2],
    limits: SearchLimits,
) -> Result<GameRecord> {
    for agent in players.iter_mut() {
        agent.new_game();
    }

    let mut position = TicTacToe::new();
    let mut moves = Vec::new();
    loop {
        if let Some(outcome) = Outcome::of(&position) {
            let avg_nps = players.iter().map(|agent| agent.overall_nps()).sum::<f64>() / 2.0;
            return Ok(GameRecord {
                moves,
                outcome,
                final_position: position.to_string(),
                avg_nps,
            });
        }

        let mover = moves.len() % 2;
        let result = players[mover]
            .search(&position, limits)
            .with_context(|| format!("search failed at ply {}", moves.len()))?;

        debug!(
            ply = moves.len(),
            mv = result.best_move,
            value = result.value,
            reused = result.reused,
            reused_nodes = result.stats.reused_nodes,
            playouts = result.stats.playouts,
            nps = result.stats.nps as u64,
            "Move searched"
        );

        for (idx, agent) in players.iter_mut().enumerate() {
            // the opponent has nothing to follow before its first search
            if agent.position().is_some() {
                agent.apply_move(result.best_move, idx == mover)?;
            }
        }

        position = position
            .try_move(result.best_move)
            .ok_or_else(|| anyhow!("engine chose illegal move {}", result.best_move))?;
        moves.push(MoveRecord {
            mv: result.best_move,
            value: result.value,
            reused: result.reused,
            stats: result.stats,
        });
    }
}

/// Totals over a self-play run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub games: u32,
    pub x_wins: u32,
    pub o_wins: u32,
    pub draws: u32,
    pub total_moves: u64,
    pub reused_searches: u64,
    pub reused_nodes: u64,
    pub playouts: u64,
    pub transposition_hits: u64,
    pub collisions: u64,
    pub avg_game_length: f64,
    pub avg_playouts_per_move: f64,
    pub runtime_seconds: f64,
}

impl RunStats {
    pub fn record(&mut self, game: &GameRecord) {
        self.games += 1;
        match game.outcome {
            Outcome::XWins => self.x_wins += 1,
            Outcome::OWins => self.o_wins += 1,
            Outcome::Draw => self.draws += 1,
        }
        for mv in &game.moves {
            self.total_moves += 1;
            self.reused_searches += mv.reused as u64;
            self.reused_nodes += mv.stats.reused_nodes as u64;
            self.playouts += mv.stats.playouts;
            self.transposition_hits += mv.stats.transposition_hits;
            self.collisions += mv.stats.collisions;
        }
        self.avg_game_length = self.total_moves as f64 / self.games as f64;
        if self.total_moves > 0 {
            self.avg_playouts_per_move = self.playouts as f64 / self.total_moves as f64;
        }
    }

    pub fn finish(&mut self, started: Instant) {
        self.runtime_seconds = started.elapsed().as_secs_f64();
    }

    /// Write the summary as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!("Failed to create stats directory: {}", e);
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing stats to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::Position;
    use mcts::{SearchConfig, UniformEvaluator};

    fn players(config: SearchConfig) -> [MctsAgent<TicTacToe, UniformEvaluator>; 2] {
        [
            MctsAgent::new(config.clone().with_seed(1), UniformEvaluator::new()).unwrap(),
            MctsAgent::new(config.with_seed(2), UniformEvaluator::new()).unwrap(),
        ]
    }

    #[test]
    fn test_game_runs_to_completion() {
        let mut players = players(SearchConfig::for_testing());

        let game = play_game(&mut players, SearchLimits::nodes(200)).unwrap();

        assert!((5..=9).contains(&game.moves.len()));
        let moves: Vec<u8> = game.moves.iter().map(|m| m.mv).collect();
        let replayed = TicTacToe::from_moves(&moves).unwrap();
        assert!(replayed.is_terminal());
        assert_eq!(Outcome::of(&replayed), Some(game.outcome));
        assert!(game.avg_nps > 0.0);
    }

    #[test]
    fn test_agents_reuse_their_trees() {
        let mut players = players(SearchConfig::for_testing());

        let game = play_game(&mut players, SearchLimits::nodes(300)).unwrap();

        // the first search of each agent starts fresh
        assert!(!game.moves[0].reused);
        assert!(!game.moves[1].reused);
        assert!(game.moves[2..].iter().any(|m| m.reused && m.stats.reused_nodes > 0));
    }

    #[test]
    fn test_run_stats_accumulate() {
        let mut players = players(SearchConfig::for_testing());
        let mut stats = RunStats::default();

        for _ in 0..2 {
            let game = play_game(&mut players, SearchLimits::nodes(100)).unwrap();
            stats.record(&game);
        }

        assert_eq!(stats.games, 2);
        assert_eq!(stats.x_wins + stats.o_wins + stats.draws, 2);
        assert_eq!(stats.playouts, stats.total_moves * 100);
        assert!(stats.avg_game_length >= 5.0);
    }

    #[test]
    fn test_write_json() {
        let dir = std::env::temp_dir().join(format!("selfplay-stats-{}", std::process::id()));
        let path = dir.join("summary.json");
        let stats = RunStats {
            games: 3,
            draws: 3,
            ..RunStats::default()
        };

        stats.write_json(&path).unwrap();

        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["games"], 3);
        assert_eq!(written["draws"], 3);
        fs::remove_dir_all(dir).unwrap();
    }
}
