//! Centralized configuration loading from config.toml.
//!
//! This crate provides configuration structs and loading logic shared by the
//! search engine tools (self-play driver, benchmarks).
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`MCTS_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults (`config.defaults.toml`)
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! MCTS_<SECTION>_<KEY>=value
//!
//! Examples:
//!     MCTS_COMMON_LOG_LEVEL=debug
//!     MCTS_SEARCH_THREADS=4
//!     MCTS_SEARCH_TREE_REUSE=false
//!     MCTS_SELFPLAY_MOVETIME_MS=500
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{apply_env_overrides, load_config, load_from_path, CONFIG_SEARCH_PATHS};
pub use structs::*;

#[cfg(test)]
mod tests;
