//! Played-position history used for repetition detection.

use crate::position::PositionKey;

/// Sequence of positions reached in the game so far.
///
/// The tree manager pushes each position it moves the root to, and queries
/// `repetition_window` to learn how many previous roots must stay alive.
pub trait StateHistory: Send + Sync {
    /// Record a newly reached position. `irreversible` marks that the move
    /// leading to it cut off every earlier position from repetition checks.
    fn push(&mut self, key: PositionKey, irreversible: bool);

    /// All recorded keys, oldest first.
    fn keys(&self) -> &[PositionKey];

    /// Number of trailing plies (excluding the current position) a repetition
    /// check may still reference.
    fn repetition_window(&self) -> usize;

    /// Forget everything (new game).
    fn clear(&mut self);

    /// How often `key` occurs inside the repetition window, current position
    /// included.
    fn repetitions(&self, key: PositionKey) -> usize {
        let keys = self.keys();
        let start = keys.len().saturating_sub(self.repetition_window() + 1);
        keys[start..].iter().filter(|&&k| k == key).count()
    }
}

/// Vector-backed history that tracks the last irreversible move.
#[derive(Debug, Clone, Default)]
pub struct GameHistory {
    keys: Vec<PositionKey>,
    /// Index of the first key still reachable by a repetition check
    reversible_from: usize,
}

impl GameHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a history at the given position.
    pub fn starting_at(key: PositionKey) -> Self {
        Self {
            keys: vec![key],
            reversible_from: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl StateHistory for GameHistory {
    fn push(&mut self, key: PositionKey, irreversible: bool) {
        if irreversible {
            self.reversible_from = self.keys.len();
        }
        self.keys.push(key);
    }

    fn keys(&self) -> &[PositionKey] {
        &self.keys
    }

    fn repetition_window(&self) -> usize {
        (self.keys.len() - self.reversible_from).saturating_sub(1)
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.reversible_from = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history() {
        let history = GameHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.repetition_window(), 0);
        assert_eq!(history.repetitions(7), 0);
    }

    #[test]
    fn test_window_grows_with_reversible_moves() {
        let mut history = GameHistory::starting_at(1);
        history.push(2, false);
        history.push(3, false);
        assert_eq!(history.len(), 3);
        assert_eq!(history.repetition_window(), 2);
    }

    #[test]
    fn test_irreversible_move_resets_window() {
        let mut history = GameHistory::starting_at(1);
        history.push(2, false);
        history.push(3, true);
        assert_eq!(history.repetition_window(), 0);

        history.push(4, false);
        assert_eq!(history.repetition_window(), 1);
    }

    #[test]
    fn test_repetitions_respect_window() {
        let mut history = GameHistory::starting_at(1);
        history.push(2, false);
        history.push(1, false);
        assert_eq!(history.repetitions(1), 2);

        // An irreversible move hides the earlier occurrences
        history.push(5, true);
        history.push(1, false);
        assert_eq!(history.repetitions(1), 1);
    }

    #[test]
    fn test_clear() {
        let mut history = GameHistory::starting_at(1);
        history.push(2, true);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.repetition_window(), 0);
    }
}
