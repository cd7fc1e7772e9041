//! Configuration for the self-play driver
//!
//! Defaults come from the central config (config.toml plus `MCTS_*`
//! environment overrides). CLI arguments take highest priority.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use engine_config::{load_config, CentralConfig};
use mcts::{SearchConfig, SearchLimits};
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::level_filters::LevelFilter;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

fn default_games() -> u32 {
    CENTRAL_CONFIG.selfplay.games
}

fn default_movetime_ms() -> u64 {
    CENTRAL_CONFIG.selfplay.movetime_ms
}

fn default_nodes() -> u64 {
    CENTRAL_CONFIG.selfplay.nodes
}

fn default_threads() -> usize {
    CENTRAL_CONFIG.search.threads
}

fn default_batch_size() -> usize {
    CENTRAL_CONFIG.search.batch_size
}

fn default_c_puct() -> f64 {
    CENTRAL_CONFIG.search.c_puct
}

fn default_dirichlet_epsilon() -> f64 {
    CENTRAL_CONFIG.search.dirichlet_epsilon
}

fn default_tree_reuse() -> bool {
    CENTRAL_CONFIG.search.tree_reuse
}

fn default_seed() -> u64 {
    CENTRAL_CONFIG.search.seed
}

fn default_log_level() -> String {
    CENTRAL_CONFIG.common.log_level.clone()
}

/// Leaf evaluator used by both players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum EvaluatorKind {
    /// Uniform priors, neutral value
    Uniform,
    /// Uniform priors, value from random playouts
    Rollout,
}

#[derive(Parser, Debug, Clone, Serialize)]
#[command(name = "selfplay")]
#[command(about = "Plays tic-tac-toe between two MCTS agents")]
#[command(
    long_about = "Plays games between two multi-threaded MCTS agents, following every
move on both trees so the searched subtree is reused, and logs search statistics.

Configuration is loaded from config.toml with MCTS_* environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Config {
    /// Number of games to play
    #[arg(long, default_value_t = default_games())]
    pub games: u32,

    /// Time per move in milliseconds (0 for no time limit)
    #[arg(long, default_value_t = default_movetime_ms())]
    pub movetime_ms: u64,

    /// Playouts per move (0 for no node limit)
    #[arg(long, default_value_t = default_nodes())]
    pub nodes: u64,

    /// Search threads per agent
    #[arg(long, default_value_t = default_threads())]
    pub threads: usize,

    /// Leaves per evaluator call
    #[arg(long, default_value_t = default_batch_size())]
    pub batch_size: usize,

    /// PUCT exploration constant
    #[arg(long, default_value_t = default_c_puct())]
    pub c_puct: f64,

    /// Root noise weight (0 disables noise)
    #[arg(long, default_value_t = default_dirichlet_epsilon())]
    pub dirichlet_epsilon: f64,

    /// Keep the searched subtree between moves
    #[arg(long, default_value_t = default_tree_reuse(), action = clap::ArgAction::Set)]
    pub tree_reuse: bool,

    /// Base seed; each agent and game derives its own
    #[arg(long, default_value_t = default_seed())]
    pub seed: u64,

    #[arg(long, value_enum, default_value_t = EvaluatorKind::Rollout)]
    pub evaluator: EvaluatorKind,

    /// Random playouts per evaluation for the rollout evaluator
    #[arg(long, default_value_t = 8)]
    pub rollouts: u32,

    /// Write a JSON summary of the run here
    #[arg(long)]
    pub stats_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.games == 0 {
            return Err(anyhow!("games must be greater than 0"));
        }

        if self.movetime_ms == 0 && self.nodes == 0 {
            return Err(anyhow!("set movetime_ms or nodes, a search needs at least one limit"));
        }

        if self.evaluator == EvaluatorKind::Rollout && self.rollouts == 0 {
            return Err(anyhow!("rollouts must be greater than 0"));
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        self.search_config(0).validate()?;
        Ok(())
    }

    /// Search configuration for the agent with the given seed offset.
    pub fn search_config(&self, seed_offset: u64) -> SearchConfig {
        let search = &CENTRAL_CONFIG.search;
        let batch_timeout = (search.batch_timeout_us > 0).then(|| Duration::from_micros(search.batch_timeout_us));
        let log_interval = (search.log_interval_ms > 0).then(|| Duration::from_millis(search.log_interval_ms));

        let mut config = SearchConfig::for_training()
            .with_threads(self.threads)
            .with_batch_size(self.batch_size)
            .with_batch_timeout(batch_timeout)
            .with_c_puct(self.c_puct as f32)
            .with_virtual_loss(search.virtual_loss as f32)
            .with_q_value_weight(search.q_value_weight as f32)
            .with_q_init(search.q_init as f32)
            .with_dirichlet(search.dirichlet_alpha as f32, self.dirichlet_epsilon as f32)
            .with_tree_reuse(self.tree_reuse)
            .with_seed(self.seed.wrapping_add(seed_offset))
            .with_log_interval(log_interval);
        config.poll_interval = Duration::from_millis(search.poll_interval_ms.max(1));
        config
    }

    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            nodes: (self.nodes > 0).then_some(self.nodes),
            movetime: (self.movetime_ms > 0).then(|| Duration::from_millis(self.movetime_ms)),
        }
    }
}
