//! Per-move time budget policy.

use std::time::Duration;

/// Decides when a running search has used up its budget.
///
/// The orchestrator polls `should_stop` periodically; implementations must be
/// cheap and must not block.
pub trait TimeManager: Send + Sync {
    /// Time still available for the current move.
    fn remaining_budget(&self) -> Duration;

    /// Whether the search should stop now.
    fn should_stop(&self, elapsed: Duration, nodes_searched: u64) -> bool;
}

/// Fixed time per move, optionally keeping a safety margin for move
/// transmission.
#[derive(Debug, Clone, Copy)]
pub struct MoveTimeManager {
    budget: Duration,
    overhead: Duration,
}

impl MoveTimeManager {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            overhead: Duration::ZERO,
        }
    }

    /// Builder pattern: reserve `overhead` of the budget.
    pub fn with_overhead(mut self, overhead: Duration) -> Self {
        self.overhead = overhead;
        self
    }

    /// Usable time after the overhead is subtracted.
    pub fn usable(&self) -> Duration {
        self.budget.saturating_sub(self.overhead)
    }
}

impl TimeManager for MoveTimeManager {
    fn remaining_budget(&self) -> Duration {
        self.usable()
    }

    fn should_stop(&self, elapsed: Duration, _nodes_searched: u64) -> bool {
        elapsed >= self.usable()
    }
}

/// No time limit; the search runs until another limit or an explicit stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfiniteTime;

impl TimeManager for InfiniteTime {
    fn remaining_budget(&self) -> Duration {
        Duration::MAX
    }

    fn should_stop(&self, _elapsed: Duration, _nodes_searched: u64) -> bool {
        false
    }
}
