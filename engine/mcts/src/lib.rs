//! Multi-threaded Monte Carlo Tree Search with batched evaluation.
//!
//! This crate provides a game-agnostic MCTS engine for any game implementing
//! the `engine-core` [`Position`](engine_core::Position) trait.
//!
//! # Overview
//!
//! Several worker threads descend one shared tree at the same time. Each
//! descent follows the PUCT rule and leaves a virtual loss on every edge it
//! takes so that concurrent workers spread out. New leaves are collected into
//! per-worker mini-batches and sent to the [`Evaluator`] together; the values
//! are then backed up along the recorded paths.
//!
//! Positions reached by different move orders share one node through the
//! [`TranspositionIndex`], so the search graph is a DAG. Between moves the
//! [`TreeManager`] keeps the subtree of the move actually played, and the
//! [`Reclaimer`] frees everything else on a background thread.
//!
//! # Usage
//!
//! ```rust,ignore
//! use games_tictactoe::TicTacToe;
//! use mcts::{MctsAgent, SearchConfig, SearchLimits, UniformEvaluator};
//!
//! let mut agent = MctsAgent::new(SearchConfig::for_evaluation(), UniformEvaluator::new())?;
//! let position = TicTacToe::new();
//!
//! let result = agent.search(&position, SearchLimits::nodes(800))?;
//! println!("Best move: {}", result.best_move);
//! println!("Value: {}", result.value);
//!
//! // keep the searched subtree for the next move
//! agent.apply_move(result.best_move, true)?;
//! ```
//!
//! # Configuration
//!
//! The [`SearchConfig`] struct controls search behavior:
//!
//! - `threads`: Number of worker threads (default: 2)
//! - `batch_size`: Leaves per evaluator call (default: 8)
//! - `c_puct`: Exploration constant for PUCT (default: 2.5)
//! - `virtual_loss`: Penalty per in-flight descent (default: 1.0)
//! - `dirichlet_alpha` / `dirichlet_epsilon`: Root noise (default: 0.3 / 0.25)
//! - `tree_reuse`: Keep the played subtree between moves (default: true)
//!
//! # Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |                          MctsAgent                            |
//! |   TreeManager (root, candidates)   TranspositionIndex         |
//! |                                                               |
//! |   Worker 0 ... Worker N-1   each: select -> batch -> evaluate |
//! |                                   -> backup -> revert VL      |
//! |                                                               |
//! |   Reclaimer thread <- detached subtrees                       |
//! +---------------------------------------------------------------+
//! ```

mod batcher;
pub mod config;
pub mod evaluator;
pub mod node;
pub mod reclaimer;
pub mod search;
pub mod stats;
pub mod transposition;
pub mod tree;
mod worker;

#[cfg(test)]
mod test_utils;

// Re-export main types
pub use config::{ConfigError, SearchConfig};
pub use evaluator::{assign_priors, EvalResult, Evaluator, EvaluatorError, UniformEvaluator};
pub use node::{Edge, Node, NodeStatus};
pub use reclaimer::{ReclaimStats, Reclaimer};
pub use search::{MctsAgent, SearchError, SearchLimits, SearchResult, SearchState, StopHandle};
pub use stats::{root_statistics, ChildStatistics, NpsAverage, RootStatistics, SearchStats};
pub use transposition::{Linked, TranspositionIndex};
pub use tree::{RootResolution, TreeManager};
