//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",    // Current directory
    "../config.toml", // Parent directory (when running from subdirectory)
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by the MCTS_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    // Check for explicit config path
    if let Ok(path) = std::env::var("MCTS_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from MCTS_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!("MCTS_CONFIG={} not found, searching defaults", path.display());
    }

    // Search default locations
    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    // Fall back to defaults
    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (usize, u64, f64, bool, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        match std::env::var($key).map(|s| s.parse()) {
            Ok(Ok(v)) => $config.$section.$field = v,
            Ok(Err(_)) => warn!("Ignoring unparseable {}", $key),
            Err(_) => {}
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: MCTS_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.log_level, "MCTS_COMMON_LOG_LEVEL");

    // Search
    env_override!(config, search.threads, "MCTS_SEARCH_THREADS", parse);
    env_override!(config, search.c_puct, "MCTS_SEARCH_C_PUCT", parse);
    env_override!(
        config,
        search.virtual_loss,
        "MCTS_SEARCH_VIRTUAL_LOSS",
        parse
    );
    env_override!(config, search.batch_size, "MCTS_SEARCH_BATCH_SIZE", parse);
    env_override!(
        config,
        search.batch_timeout_us,
        "MCTS_SEARCH_BATCH_TIMEOUT_US",
        parse
    );
    env_override!(
        config,
        search.q_value_weight,
        "MCTS_SEARCH_Q_VALUE_WEIGHT",
        parse
    );
    env_override!(config, search.q_init, "MCTS_SEARCH_Q_INIT", parse);
    env_override!(
        config,
        search.dirichlet_alpha,
        "MCTS_SEARCH_DIRICHLET_ALPHA",
        parse
    );
    env_override!(
        config,
        search.dirichlet_epsilon,
        "MCTS_SEARCH_DIRICHLET_EPSILON",
        parse
    );
    env_override!(config, search.tree_reuse, "MCTS_SEARCH_TREE_REUSE", parse);
    env_override!(config, search.seed, "MCTS_SEARCH_SEED", parse);
    env_override!(
        config,
        search.poll_interval_ms,
        "MCTS_SEARCH_POLL_INTERVAL_MS",
        parse
    );
    env_override!(
        config,
        search.log_interval_ms,
        "MCTS_SEARCH_LOG_INTERVAL_MS",
        parse
    );

    // Self-play
    env_override!(config, selfplay.games, "MCTS_SELFPLAY_GAMES", parse);
    env_override!(
        config,
        selfplay.movetime_ms,
        "MCTS_SELFPLAY_MOVETIME_MS",
        parse
    );
    env_override!(config, selfplay.nodes, "MCTS_SELFPLAY_NODES", parse);

    config
}
