//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// ============================================================================

fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_threads() -> usize {
    defaults::threads()
}
fn d_c_puct() -> f64 {
    defaults::c_puct()
}
fn d_virtual_loss() -> f64 {
    defaults::virtual_loss()
}
fn d_batch_size() -> usize {
    defaults::batch_size()
}
fn d_batch_timeout_us() -> u64 {
    defaults::batch_timeout_us()
}
fn d_q_value_weight() -> f64 {
    defaults::q_value_weight()
}
fn d_q_init() -> f64 {
    defaults::q_init()
}
fn d_dirichlet_alpha() -> f64 {
    defaults::dirichlet_alpha()
}
fn d_dirichlet_epsilon() -> f64 {
    defaults::dirichlet_epsilon()
}
fn d_tree_reuse() -> bool {
    defaults::tree_reuse()
}
fn d_seed() -> u64 {
    defaults::seed()
}
fn d_poll_interval_ms() -> u64 {
    defaults::poll_interval_ms()
}
fn d_log_interval_ms() -> u64 {
    defaults::log_interval_ms()
}
fn d_games() -> u32 {
    defaults::games()
}
fn d_movetime_ms() -> u64 {
    defaults::movetime_ms()
}
fn d_nodes() -> u64 {
    defaults::nodes()
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub selfplay: SelfPlayConfig,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level().into(),
        }
    }
}

/// Search tunables. Converted into the engine's `SearchConfig` by the tools.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchSettings {
    #[serde(default = "d_threads")]
    pub threads: usize,
    #[serde(default = "d_c_puct")]
    pub c_puct: f64,
    #[serde(default = "d_virtual_loss")]
    pub virtual_loss: f64,
    #[serde(default = "d_batch_size")]
    pub batch_size: usize,
    #[serde(default = "d_batch_timeout_us")]
    pub batch_timeout_us: u64,
    #[serde(default = "d_q_value_weight")]
    pub q_value_weight: f64,
    #[serde(default = "d_q_init")]
    pub q_init: f64,
    #[serde(default = "d_dirichlet_alpha")]
    pub dirichlet_alpha: f64,
    #[serde(default = "d_dirichlet_epsilon")]
    pub dirichlet_epsilon: f64,
    #[serde(default = "d_tree_reuse")]
    pub tree_reuse: bool,
    #[serde(default = "d_seed")]
    pub seed: u64,
    #[serde(default = "d_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "d_log_interval_ms")]
    pub log_interval_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            threads: defaults::threads(),
            c_puct: defaults::c_puct(),
            virtual_loss: defaults::virtual_loss(),
            batch_size: defaults::batch_size(),
            batch_timeout_us: defaults::batch_timeout_us(),
            q_value_weight: defaults::q_value_weight(),
            q_init: defaults::q_init(),
            dirichlet_alpha: defaults::dirichlet_alpha(),
            dirichlet_epsilon: defaults::dirichlet_epsilon(),
            tree_reuse: defaults::tree_reuse(),
            seed: defaults::seed(),
            poll_interval_ms: defaults::poll_interval_ms(),
            log_interval_ms: defaults::log_interval_ms(),
        }
    }
}

/// Self-play driver configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SelfPlayConfig {
    #[serde(default = "d_games")]
    pub games: u32,
    #[serde(default = "d_movetime_ms")]
    pub movetime_ms: u64,
    /// Node limit per move, 0 for none
    #[serde(default = "d_nodes")]
    pub nodes: u64,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            games: defaults::games(),
            movetime_ms: defaults::movetime_ms(),
            nodes: defaults::nodes(),
        }
    }
}
