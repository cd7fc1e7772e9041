//! Test positions and instrumented evaluators.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use engine_core::Position;
use parking_lot::Mutex;

use crate::evaluator::{assign_priors, EvalResult, Evaluator, EvaluatorError};
use crate::node::{Node, NodeStatus};

/// Abstract game: every position offers moves `0..branching` until `depth`
/// plies have been played, and the game always ends in a draw.
///
/// With `commutative()` the move order is forgotten, so every permutation of
/// the same moves is a transposition. `with_hash_bits` truncates the hash key
/// to force hash collisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toy {
    moves: Vec<u8>,
    branching: u8,
    depth: u8,
    commutative: bool,
    hash_bits: u32,
}

impl Toy {
    pub fn new(branching: u8, depth: u8) -> Self {
        Self {
            moves: Vec::new(),
            branching,
            depth,
            commutative: false,
            hash_bits: 64,
        }
    }

    pub fn commutative(mut self) -> Self {
        self.commutative = true;
        self
    }

    pub fn with_hash_bits(mut self, bits: u32) -> Self {
        self.hash_bits = bits;
        self
    }

    pub fn moves(&self) -> &[u8] {
        &self.moves
    }
}

impl Position for Toy {
    type Move = u8;

    fn terminal_value(&self) -> Option<f32> {
        (self.moves.len() >= self.depth as usize).then_some(0.0)
    }

    fn legal_moves(&self) -> Vec<u8> {
        if self.is_terminal() {
            return Vec::new();
        }
        (0..self.branching).collect()
    }

    fn apply(&self, mv: u8) -> Self {
        let mut next = self.clone();
        next.moves.push(mv);
        if next.commutative {
            next.moves.sort_unstable();
        }
        next
    }

    fn hash_key(&self) -> u64 {
        // FNV-1a over the move list
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for &mv in &self.moves {
            hash ^= mv as u64 + 1;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash ^= self.moves.len() as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
        if self.hash_bits >= 64 {
            hash
        } else {
            hash & ((1u64 << self.hash_bits) - 1)
        }
    }
}

type Script<P> = Box<dyn Fn(&P) -> EvalResult<<P as Position>::Move> + Send + Sync>;

/// Evaluator driven by a closure that records every position it is asked
/// about. Can be made slow or made to fail after a number of batches.
pub struct ScriptedEvaluator<P: Position> {
    script: Script<P>,
    delay: Duration,
    fail_after: Option<usize>,
    batches: AtomicUsize,
    seen: Mutex<Vec<P>>,
}

impl<P: Position> ScriptedEvaluator<P> {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&P) -> EvalResult<P::Move> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            fail_after: None,
            batches: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Uniform priors over the legal moves and a constant value.
    pub fn uniform(value: f32) -> Self {
        Self::new(move |position: &P| {
            let moves = position.legal_moves();
            let prior = 1.0 / moves.len().max(1) as f32;
            EvalResult::new(value, moves.into_iter().map(|m| (m, prior)).collect())
        })
    }

    /// Sleep this long for every batch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Succeed for `batches` batches, then fail every call.
    pub fn failing_after(mut self, batches: usize) -> Self {
        self.fail_after = Some(batches);
        self
    }

    /// Number of `evaluate_batch` calls so far (including failed ones).
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Every position evaluated so far, in call order.
    pub fn evaluated(&self) -> Vec<P> {
        self.seen.lock().clone()
    }

    pub fn evaluations(&self) -> usize {
        self.seen.lock().len()
    }
}

impl<P: Position> Evaluator<P> for ScriptedEvaluator<P> {
    fn evaluate(&self, position: &P) -> Result<EvalResult<P::Move>, EvaluatorError> {
        self.seen.lock().push(position.clone());
        Ok((self.script)(position))
    }

    fn evaluate_batch(&self, positions: &[&P]) -> Result<Vec<EvalResult<P::Move>>, EvaluatorError> {
        let call = self.batches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail_after.is_some_and(|limit| call >= limit) {
            return Err(EvaluatorError::EvaluationFailed("scripted failure".to_string()));
        }
        positions.iter().map(|p| self.evaluate(p)).collect()
    }
}

/// Every node reachable from `root`, shared nodes once.
pub fn reachable<P: Position>(root: &Node<P>) -> Vec<&Node<P>> {
    let mut seen: HashSet<*const Node<P>> = HashSet::new();
    let mut stack = vec![root];
    let mut nodes = Vec::new();
    seen.insert(root as *const Node<P>);
    while let Some(node) = stack.pop() {
        nodes.push(node);
        for edge in node.edges() {
            if let Some(child) = edge.child() {
                let child: &Node<P> = child;
                if seen.insert(child as *const Node<P>) {
                    stack.push(child);
                }
            }
        }
    }
    nodes
}

/// Check the invariants that must hold whenever no descent is in flight:
/// nothing pending, no virtual loss left, and edge visits bounded by node visits.
pub fn assert_quiescent<P: Position>(root: &Node<P>) {
    for node in reachable(root) {
        assert_ne!(node.status(), NodeStatus::EvaluationPending, "{:?}", node.position());
        let edge_visits: u32 = node.edges().iter().map(|e| e.visits()).sum();
        assert!(
            edge_visits <= node.visits(),
            "edge visits {edge_visits} exceed node visits {} at {:?}",
            node.visits(),
            node.position()
        );
        for edge in node.edges() {
            assert_eq!(edge.pending_virtual_loss(), 0, "{:?}", node.position());
        }
    }
}

/// Root expanded with uniform priors, as the orchestrator would leave it.
pub fn expanded_root<P: Position>(position: P) -> Arc<Node<P>> {
    let root = Arc::new(Node::new(position));
    assert!(root.try_claim());
    let priors = assign_priors(root.position().legal_moves(), &[]);
    root.expand(0.0, priors);
    root
}
