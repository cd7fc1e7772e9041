//! Search configuration parameters.

use std::time::Duration;

use thiserror::Error;

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("threads must be at least 1")]
    NoThreads,

    #[error("batch_size must be at least 1")]
    EmptyBatch,

    #[error("{name} must be finite and non-negative, got {value}")]
    Negative { name: &'static str, value: f32 },

    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f32 },

    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f32 },

    #[error("dirichlet_alpha must be positive when noise is enabled, got {0}")]
    NonPositiveAlpha(f32),
}

/// Configuration for the parallel tree search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Number of worker threads descending the tree concurrently.
    pub threads: usize,

    /// Exploration constant of the PUCT formula.
    /// Higher values encourage exploration, lower values favor exploitation.
    pub c_puct: f32,

    /// Penalty per pending visit, applied to the Q of an edge that another
    /// thread is currently descending through.
    pub virtual_loss: f32,

    /// Number of new leaves a worker collects before calling the evaluator.
    /// Set to 1 to evaluate every leaf on its own.
    pub batch_size: usize,

    /// Upper bound on how long a worker keeps collecting a mini-batch.
    /// `None` waits for a full batch, which keeps single-threaded runs reproducible.
    pub batch_timeout: Option<Duration>,

    /// Blend of each visited edge's Q toward its child's evaluator value, in
    /// [0, 1]. 0 selects on the running mean alone.
    pub q_value_weight: f32,

    /// First-play value: the Q assigned to edges that have never been visited.
    pub q_init: f32,

    /// Dirichlet noise concentration for root exploration.
    pub dirichlet_alpha: f32,

    /// Fraction of each root prior replaced by Dirichlet noise.
    /// Set to 0.0 to disable noise (evaluation, analysis).
    pub dirichlet_epsilon: f32,

    /// Carry the explored subtree over to the next move.
    pub tree_reuse: bool,

    /// Seed for the root-noise RNG.
    pub seed: u64,

    /// How often the orchestrator checks the time manager.
    pub poll_interval: Duration,

    /// How often a status line is logged during a search. `None` disables it.
    pub log_interval: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threads: 2,
            c_puct: 2.5,
            virtual_loss: 1.0,
            batch_size: 8,
            batch_timeout: Some(Duration::from_micros(2000)),
            q_value_weight: 0.0,
            q_init: 0.0,
            dirichlet_alpha: 0.3,
            dirichlet_epsilon: 0.25,
            tree_reuse: true,
            seed: 42,
            poll_interval: Duration::from_millis(5),
            log_interval: Some(Duration::from_secs(1)),
        }
    }
}

impl SearchConfig {
    /// Create config for self-play (with exploration noise).
    pub fn for_training() -> Self {
        Self::default()
    }

    /// Create config for evaluation/analysis (no root noise).
    pub fn for_evaluation() -> Self {
        Self {
            dirichlet_alpha: 0.0,
            dirichlet_epsilon: 0.0,
            ..Self::default()
        }
    }

    /// Create a small, reproducible config for tests.
    pub fn for_testing() -> Self {
        Self {
            threads: 1,
            c_puct: 2.5,
            virtual_loss: 1.0,
            batch_size: 4,
            batch_timeout: None,
            q_value_weight: 0.0,
            q_init: 0.0,
            dirichlet_alpha: 0.0,
            dirichlet_epsilon: 0.0,
            tree_reuse: true,
            seed: 7,
            poll_interval: Duration::from_millis(1),
            log_interval: None,
        }
    }

    /// Builder pattern: set the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Builder pattern: set c_puct exploration constant.
    pub fn with_c_puct(mut self, c: f32) -> Self {
        self.c_puct = c;
        self
    }

    /// Builder pattern: set the virtual loss penalty.
    pub fn with_virtual_loss(mut self, virtual_loss: f32) -> Self {
        self.virtual_loss = virtual_loss;
        self
    }

    /// Builder pattern: set evaluation batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Builder pattern: set the mini-batch collection deadline.
    pub fn with_batch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Builder pattern: set the Q blend weight.
    pub fn with_q_value_weight(mut self, weight: f32) -> Self {
        self.q_value_weight = weight;
        self
    }

    /// Builder pattern: set the first-play value.
    pub fn with_q_init(mut self, q_init: f32) -> Self {
        self.q_init = q_init;
        self
    }

    /// Builder pattern: set root Dirichlet noise parameters.
    pub fn with_dirichlet(mut self, alpha: f32, epsilon: f32) -> Self {
        self.dirichlet_alpha = alpha;
        self.dirichlet_epsilon = epsilon;
        self
    }

    /// Builder pattern: enable or disable tree reuse between moves.
    pub fn with_tree_reuse(mut self, enabled: bool) -> Self {
        self.tree_reuse = enabled;
        self
    }

    /// Builder pattern: set the root-noise seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder pattern: set the status logging interval.
    pub fn with_log_interval(mut self, interval: Option<Duration>) -> Self {
        self.log_interval = interval;
        self
    }

    /// Check that every parameter is usable by the search.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::EmptyBatch);
        }
        for (name, value) in [("c_puct", self.c_puct), ("virtual_loss", self.virtual_loss)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }
        for (name, value) in [
            ("q_value_weight", self.q_value_weight),
            ("dirichlet_epsilon", self.dirichlet_epsilon),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }
        if !self.q_init.is_finite() {
            return Err(ConfigError::NonFinite {
                name: "q_init",
                value: self.q_init,
            });
        }
        let alpha_usable = self.dirichlet_alpha.is_finite() && self.dirichlet_alpha > 0.0;
        if self.dirichlet_epsilon > 0.0 && !alpha_usable {
            return Err(ConfigError::NonPositiveAlpha(self.dirichlet_alpha));
        }
        Ok(())
    }
}
