//! Per-worker mini-batch of leaves awaiting evaluation.

use engine_core::Position;
use tracing::trace;

use crate::evaluator::{assign_priors, EvalResult, Evaluator, EvaluatorError};
use crate::node::{backup, revert_virtual_loss, Node, PathStep};
use crate::stats::SearchCounters;

/// A claimed leaf and the path that led to it.
struct PendingLeaf<'a, P: Position> {
    node: &'a Node<P>,
    path: Vec<PathStep<'a, P>>,
}

/// Collects claimed leaves and evaluates them with one evaluator call.
pub(crate) struct Batcher<'a, P: Position> {
    capacity: usize,
    leaves: Vec<PendingLeaf<'a, P>>,
}

impl<'a, P: Position> Batcher<'a, P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            leaves: Vec::with_capacity(capacity),
        }
    }

    /// Buffer a leaf the caller has claimed (status `EvaluationPending`).
    pub fn push(&mut self, node: &'a Node<P>, path: Vec<PathStep<'a, P>>) {
        self.leaves.push(PendingLeaf { node, path });
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.leaves.len() >= self.capacity
    }

    /// Evaluate every buffered leaf, expand it and back its value up.
    ///
    /// On failure every buffered leaf is returned to `Unexpanded`, the virtual
    /// loss along its path is reverted and the error is passed on. Returns
    /// the number of leaves evaluated.
    pub fn flush<E>(&mut self, evaluator: &E, counters: &SearchCounters) -> Result<usize, EvaluatorError>
    where
        E: Evaluator<P> + ?Sized,
    {
        if self.leaves.is_empty() {
            return Ok(0);
        }

        let results = match self.evaluate(evaluator) {
            Ok(results) => results,
            Err(err) => {
                self.abort();
                return Err(err);
            }
        };

        let count = self.leaves.len();
        for (leaf, result) in self.leaves.drain(..).zip(results) {
            let priors = assign_priors(leaf.node.position().legal_moves(), &result.priors);
            leaf.node.expand(result.value, priors);
            backup(&leaf.path, leaf.node, result.value);
            counters.record_playout(leaf.path.len());
        }
        counters.record_batch(count);
        trace!(leaves = count, "Evaluated mini-batch");
        Ok(count)
    }

    fn evaluate<E>(&self, evaluator: &E) -> Result<Vec<EvalResult<P::Move>>, EvaluatorError>
    where
        E: Evaluator<P> + ?Sized,
    {
        let positions: Vec<&P> = self.leaves.iter().map(|leaf| leaf.node.position()).collect();
        let results = evaluator.evaluate_batch(&positions)?;
        if results.len() != positions.len() {
            return Err(EvaluatorError::MalformedOutput(format!(
                "expected {} results, got {}",
                positions.len(),
                results.len()
            )));
        }
        for result in &results {
            result.validate()?;
        }
        Ok(results)
    }

    /// Undo every buffered claim.
    pub fn abort(&mut self) {
        for leaf in self.leaves.drain(..) {
            leaf.node.release_claim();
            revert_virtual_loss(&leaf.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::node::NodeStatus;
    use crate::test_utils::{ScriptedEvaluator, Toy};

    /// Root expanded with uniform priors and every child materialized.
    fn root_with_children() -> Arc<Node<Toy>> {
        let root = Arc::new(Node::new(Toy::new(3, 4)));
        assert!(root.try_claim());
        root.expand(0.0, vec![(0, 0.4), (1, 0.3), (2, 0.3)]);
        for edge in root.edges() {
            let next = root.position().apply(edge.mv());
            edge.child_or_link(|| Arc::new(Node::new(next)));
        }
        root
    }

    /// Claim child `idx` of `root` as a selection would.
    fn claim(root: &Node<Toy>, idx: usize) -> (&Node<Toy>, Vec<PathStep<'_, Toy>>) {
        let edge = &root.edges()[idx];
        edge.add_virtual_loss();
        let child: &Node<Toy> = edge.child().unwrap();
        assert!(child.try_claim());
        (child, vec![(root, idx)])
    }

    #[test]
    fn test_flush_expands_and_backs_up() {
        let root = root_with_children();
        let evaluator = ScriptedEvaluator::new(|_: &Toy| EvalResult::new(0.5, vec![(0, 1.0), (2, 1.0)]));
        let counters = SearchCounters::default();
        let mut batcher = Batcher::new(2);

        for idx in 0..2 {
            let (node, path) = claim(&root, idx);
            batcher.push(node, path);
        }
        assert!(batcher.is_full());

        assert_eq!(batcher.flush(&evaluator, &counters).unwrap(), 2);
        assert!(batcher.is_empty());
        assert_eq!(evaluator.batches(), 1);
        assert_eq!(evaluator.evaluations(), 2);

        for edge in &root.edges()[..2] {
            let child = edge.child().unwrap();
            assert_eq!(child.status(), NodeStatus::Expanded);
            assert_eq!(child.visits(), 1);
            // moves missing from the output get zero prior
            let priors: Vec<f32> = child.edges().iter().map(|e| e.prior()).collect();
            assert_eq!(priors, vec![0.5, 0.0, 0.5]);
            assert_eq!(edge.visits(), 1);
            assert!((edge.mean_value() + 0.5).abs() < 1e-6);
            assert_eq!(edge.pending_virtual_loss(), 0);
        }
        assert_eq!(root.visits(), 2);
        assert_eq!(counters.playouts(), 2);
    }

    #[test]
    fn test_failure_restores_leaves() {
        let root = root_with_children();
        let evaluator = ScriptedEvaluator::<Toy>::uniform(0.0).failing_after(0);
        let counters = SearchCounters::default();
        let mut batcher = Batcher::new(4);

        let (node, path) = claim(&root, 1);
        batcher.push(node, path);

        let err = batcher.flush(&evaluator, &counters).unwrap_err();
        assert!(matches!(err, EvaluatorError::EvaluationFailed(_)));
        assert!(batcher.is_empty());

        let child = root.child_for(1).unwrap();
        assert_eq!(child.status(), NodeStatus::Unexpanded);
        assert_eq!(child.visits(), 0);
        assert_eq!(root.edges()[1].pending_virtual_loss(), 0);
        assert_eq!(root.visits(), 0);
        assert_eq!(counters.playouts(), 0);
    }

    #[test]
    fn test_wrong_result_count_is_malformed() {
        struct Short;
        impl Evaluator<Toy> for Short {
            fn evaluate(&self, _: &Toy) -> Result<EvalResult<u8>, EvaluatorError> {
                unreachable!()
            }
            fn evaluate_batch(&self, _: &[&Toy]) -> Result<Vec<EvalResult<u8>>, EvaluatorError> {
                Ok(Vec::new())
            }
        }

        let root = root_with_children();
        let mut batcher = Batcher::new(1);
        let (node, path) = claim(&root, 0);
        batcher.push(node, path);

        let err = batcher.flush(&Short, &SearchCounters::default()).unwrap_err();
        assert!(matches!(err, EvaluatorError::MalformedOutput(_)));
        assert_eq!(root.child_for(0).unwrap().status(), NodeStatus::Unexpanded);
    }

    #[test]
    fn test_non_finite_value_is_rejected() {
        let root = root_with_children();
        let evaluator = ScriptedEvaluator::new(|_: &Toy| EvalResult::new(f32::NAN, Vec::new()));
        let mut batcher = Batcher::new(1);
        let (node, path) = claim(&root, 2);
        batcher.push(node, path);

        let err = batcher.flush(&evaluator, &SearchCounters::default()).unwrap_err();
        assert!(matches!(err, EvaluatorError::MalformedOutput(_)));
        assert_eq!(root.edges()[2].pending_virtual_loss(), 0);
    }
}
