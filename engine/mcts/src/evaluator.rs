//! Evaluator trait for position evaluation.
//!
//! The evaluator provides a value estimate and move priors for a position.
//! In an AlphaZero-style engine this is a neural network behind a batching
//! queue; for testing we provide a uniform evaluator that returns equal priors.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use engine_core::Position;
use thiserror::Error;

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Malformed evaluator output: {0}")]
    MalformedOutput(String),

    #[error("Evaluator unreachable: {0}")]
    Unreachable(String),
}

/// Result of evaluating a position.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult<M> {
    /// Value estimate for the side to move.
    /// Range: -1.0 (certain loss) to +1.0 (certain win).
    pub value: f32,

    /// Prior probability per move. Moves that are not listed get 0.
    /// Values need not be normalized.
    pub priors: Vec<(M, f32)>,
}

impl<M> EvalResult<M> {
    pub fn new(value: f32, priors: Vec<(M, f32)>) -> Self {
        Self { value, priors }
    }

    /// Reject non-finite values and negative or non-finite priors.
    pub fn validate(&self) -> Result<(), EvaluatorError> {
        if !self.value.is_finite() {
            return Err(EvaluatorError::MalformedOutput(format!(
                "value {} is not finite",
                self.value
            )));
        }
        if let Some((_, p)) = self.priors.iter().find(|(_, p)| !p.is_finite() || *p < 0.0) {
            return Err(EvaluatorError::MalformedOutput(format!(
                "prior {p} is not a finite non-negative number"
            )));
        }
        Ok(())
    }
}

/// Trait for position evaluators.
///
/// Implementations could be:
/// - UniformEvaluator: uniform priors, neutral value (for testing)
/// - a neural network client that batches requests to an inference server
/// - a rollout evaluator playing random moves to the end of the game
pub trait Evaluator<P: Position>: Send + Sync {
    /// Evaluate a single position.
    fn evaluate(&self, position: &P) -> Result<EvalResult<P::Move>, EvaluatorError>;

    /// Evaluate a batch of positions, returning one result per position in order.
    /// Default implementation calls evaluate() in a loop.
    fn evaluate_batch(&self, positions: &[&P]) -> Result<Vec<EvalResult<P::Move>>, EvaluatorError> {
        positions.iter().map(|p| self.evaluate(p)).collect()
    }
}

impl<P: Position, E: Evaluator<P> + ?Sized> Evaluator<P> for Arc<E> {
    fn evaluate(&self, position: &P) -> Result<EvalResult<P::Move>, EvaluatorError> {
        (**self).evaluate(position)
    }

    fn evaluate_batch(&self, positions: &[&P]) -> Result<Vec<EvalResult<P::Move>>, EvaluatorError> {
        (**self).evaluate_batch(positions)
    }
}

/// Uniform evaluator that assigns equal probability to all legal moves.
/// Value is always 0.0 (neutral). Useful for testing the search without a model.
#[derive(Debug, Clone, Default)]
pub struct UniformEvaluator;

impl UniformEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl<P: Position> Evaluator<P> for UniformEvaluator {
    fn evaluate(&self, position: &P) -> Result<EvalResult<P::Move>, EvaluatorError> {
        let moves = position.legal_moves();
        if moves.is_empty() {
            return Ok(EvalResult::new(0.0, Vec::new()));
        }
        let prob = 1.0 / moves.len() as f32;
        Ok(EvalResult::new(0.0, moves.into_iter().map(|m| (m, prob)).collect()))
    }
}

/// Match evaluator priors to the legal move list.
///
/// Legal moves absent from `priors` get 0 and entries for moves that are not
/// legal are ignored. The result is normalized to sum to 1, falling back to a
/// uniform distribution when the evaluator put no mass on any legal move.
pub fn assign_priors<M: Copy + Eq + Hash>(legal_moves: Vec<M>, priors: &[(M, f32)]) -> Vec<(M, f32)> {
    let lookup: HashMap<M, f32> = priors.iter().copied().collect();
    let mut assigned: Vec<(M, f32)> = legal_moves
        .into_iter()
        .map(|m| (m, lookup.get(&m).copied().unwrap_or(0.0)))
        .collect();

    let total: f32 = assigned.iter().map(|(_, p)| p).sum();
    if total > 0.0 {
        for (_, p) in &mut assigned {
            *p /= total;
        }
    } else if !assigned.is_empty() {
        let uniform = 1.0 / assigned.len() as f32;
        for (_, p) in &mut assigned {
            *p = uniform;
        }
    }
    assigned
}
