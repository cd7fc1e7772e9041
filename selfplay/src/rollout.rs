//! Random-playout evaluator.

use engine_core::Position;
use mcts::{EvalResult, Evaluator, EvaluatorError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Values a position by the average result of random games played from it.
///
/// Playouts are seeded from the position's hash key, so the same position
/// always gets the same value no matter which thread evaluates it. Priors are
/// left empty, which the search turns into a uniform distribution.
#[derive(Debug, Clone)]
pub struct RolloutEvaluator {
    rollouts: u32,
    seed: u64,
}

impl RolloutEvaluator {
    pub fn new(rollouts: u32, seed: u64) -> Self {
        Self {
            rollouts: rollouts.max(1),
            seed,
        }
    }

    /// Result of one random game from `position`, for the side to move there.
    fn playout<P: Position>(&self, position: &P, rng: &mut ChaCha20Rng) -> f32 {
        let mut current = position.clone();
        let mut sign = 1.0;
        loop {
            if let Some(value) = current.terminal_value() {
                return sign * value;
            }
            let moves = current.legal_moves();
            let Some(&mv) = moves.choose(rng) else {
                return 0.0;
            };
            current = current.apply(mv);
            sign = -sign;
        }
    }
}

impl<P: Position> Evaluator<P> for RolloutEvaluator {
    fn evaluate(&self, position: &P) -> Result<EvalResult<P::Move>, EvaluatorError> {
        let mut rng = ChaCha20Rng::seed_from_u64(self.seed ^ position.hash_key());
        let total: f32 = (0..self.rollouts).map(|_| self.playout(position, &mut rng)).sum();
        Ok(EvalResult::new(total / self.rollouts as f32, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use games_tictactoe::TicTacToe;

    #[test]
    fn test_value_is_in_range_and_deterministic() {
        let evaluator = RolloutEvaluator::new(16, 7);
        let position = TicTacToe::from_moves(&[4]).unwrap();

        let first = evaluator.evaluate(&position).unwrap();
        let second = evaluator.evaluate(&position).unwrap();

        assert!((-1.0..=1.0).contains(&first.value));
        assert_eq!(first.value, second.value);
        assert!(first.priors.is_empty());
    }

    #[test]
    fn test_terminal_position_returns_its_result() {
        let evaluator = RolloutEvaluator::new(4, 0);
        // X completed the top row; O is to move and has lost
        let finished = TicTacToe::from_moves(&[0, 3, 1, 4, 2]).unwrap();
        assert_eq!(evaluator.evaluate(&finished).unwrap().value, -1.0);
    }

    #[test]
    fn test_side_with_threat_gets_positive_value() {
        let evaluator = RolloutEvaluator::new(64, 3);
        // X threatens the top row while O has no two in a line
        let position = TicTacToe::from_moves(&[0, 3, 1, 7]).unwrap();
        assert!(evaluator.evaluate(&position).unwrap().value > 0.0);
    }
}
