//! Default configuration values loaded from config.defaults.toml.
//!
//! The defaults file is embedded at compile time so every binary agrees on
//! the same values.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    search: SearchDefaults,
    selfplay: SelfPlayDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct SearchDefaults {
    threads: usize,
    c_puct: f64,
    virtual_loss: f64,
    batch_size: usize,
    batch_timeout_us: u64,
    q_value_weight: f64,
    q_init: f64,
    dirichlet_alpha: f64,
    dirichlet_epsilon: f64,
    tree_reuse: bool,
    seed: u64,
    poll_interval_ms: u64,
    log_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
struct SelfPlayDefaults {
    games: u32,
    movetime_ms: u64,
    nodes: u64,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

// Search
pub fn threads() -> usize {
    DEFAULTS.search.threads
}
pub fn c_puct() -> f64 {
    DEFAULTS.search.c_puct
}
pub fn virtual_loss() -> f64 {
    DEFAULTS.search.virtual_loss
}
pub fn batch_size() -> usize {
    DEFAULTS.search.batch_size
}
pub fn batch_timeout_us() -> u64 {
    DEFAULTS.search.batch_timeout_us
}
pub fn q_value_weight() -> f64 {
    DEFAULTS.search.q_value_weight
}
pub fn q_init() -> f64 {
    DEFAULTS.search.q_init
}
pub fn dirichlet_alpha() -> f64 {
    DEFAULTS.search.dirichlet_alpha
}
pub fn dirichlet_epsilon() -> f64 {
    DEFAULTS.search.dirichlet_epsilon
}
pub fn tree_reuse() -> bool {
    DEFAULTS.search.tree_reuse
}
pub fn seed() -> u64 {
    DEFAULTS.search.seed
}
pub fn poll_interval_ms() -> u64 {
    DEFAULTS.search.poll_interval_ms
}
pub fn log_interval_ms() -> u64 {
    DEFAULTS.search.log_interval_ms
}

// Self-play
pub fn games() -> u32 {
    DEFAULTS.selfplay.games
}
pub fn movetime_ms() -> u64 {
    DEFAULTS.selfplay.movetime_ms
}
pub fn nodes() -> u64 {
    DEFAULTS.selfplay.nodes
}
