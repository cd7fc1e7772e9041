//! Tests for the configuration module.

use super::*;
use std::io::Write;

#[test]
fn test_default_config() {
    let config = CentralConfig::default();
    assert_eq!(config.common.log_level, "info");
    assert_eq!(config.search.threads, 2);
    assert_eq!(config.search.batch_size, 8);
    assert!(config.search.tree_reuse);
    assert_eq!(config.selfplay.games, 4);
}

#[test]
fn test_search_defaults() {
    let config = CentralConfig::default();
    assert!((config.search.c_puct - 2.5).abs() < f64::EPSILON);
    assert!((config.search.virtual_loss - 1.0).abs() < f64::EPSILON);
    assert!(config.search.q_value_weight.abs() < f64::EPSILON);
    assert!(config.search.q_init.abs() < f64::EPSILON);
    assert!((config.search.dirichlet_alpha - 0.3).abs() < f64::EPSILON);
    assert!((config.search.dirichlet_epsilon - 0.25).abs() < f64::EPSILON);
    assert_eq!(config.search.batch_timeout_us, 2000);
    assert_eq!(config.search.seed, 42);
    assert_eq!(config.search.poll_interval_ms, 5);
    assert_eq!(config.search.log_interval_ms, 1000);
}

#[test]
fn test_selfplay_defaults() {
    let config = CentralConfig::default();
    assert_eq!(config.selfplay.movetime_ms, 200);
    assert_eq!(config.selfplay.nodes, 800);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let toml_str = r#"
        [search]
        threads = 6
        tree_reuse = false
    "#;

    let config: CentralConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.search.threads, 6);
    assert!(!config.search.tree_reuse);
    // Untouched keys and sections keep their defaults
    assert_eq!(config.search.batch_size, 8);
    assert_eq!(config.common.log_level, "info");
    assert_eq!(config.selfplay.games, 4);
}

#[test]
fn test_env_overrides() {
    std::env::set_var("MCTS_SEARCH_BATCH_SIZE", "16");
    std::env::set_var("MCTS_SELFPLAY_GAMES", "9");
    std::env::set_var("MCTS_COMMON_LOG_LEVEL", "debug");

    let config = apply_env_overrides(CentralConfig::default());
    assert_eq!(config.search.batch_size, 16);
    assert_eq!(config.selfplay.games, 9);
    assert_eq!(config.common.log_level, "debug");

    std::env::remove_var("MCTS_SEARCH_BATCH_SIZE");
    std::env::remove_var("MCTS_SELFPLAY_GAMES");
    std::env::remove_var("MCTS_COMMON_LOG_LEVEL");
}

#[test]
fn test_unparseable_env_override_is_ignored() {
    std::env::set_var("MCTS_SEARCH_C_PUCT", "not-a-number");

    let config = apply_env_overrides(CentralConfig::default());
    assert!((config.search.c_puct - 2.5).abs() < f64::EPSILON);

    std::env::remove_var("MCTS_SEARCH_C_PUCT");
}

#[test]
fn test_load_from_path() {
    let path = std::env::temp_dir().join(format!("mcts-config-{}.toml", std::process::id()));
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[selfplay]\nmovetime_ms = 1234").unwrap();
    }

    let config = load_from_path(&path);
    assert_eq!(config.selfplay.movetime_ms, 1234);
    assert_eq!(config.search.threads, 2);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_load_from_missing_path_falls_back_to_defaults() {
    let config = load_from_path(std::path::Path::new("/nonexistent/config.toml"));
    assert_eq!(config.search.threads, 2);
}

#[test]
fn test_invalid_toml_falls_back_to_defaults() {
    let path = std::env::temp_dir().join(format!("mcts-bad-{}.toml", std::process::id()));
    std::fs::write(&path, "[search\nthreads = ").unwrap();

    let config = load_from_path(&path);
    assert_eq!(config.search.threads, 2);

    std::fs::remove_file(&path).unwrap();
}
