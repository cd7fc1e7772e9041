//! Search tree vertices and the edges between them.
//!
//! A node stands for one position. Its outgoing edges are materialized once,
//! when the evaluator output for the position is applied, and each edge owns
//! its child through an `Arc`. Transpositions make the tree a DAG: a node may
//! be the child of several edges, so nodes keep no parent pointer and backup
//! follows the path recorded during selection instead.
//!
//! All statistics are atomics so that many workers can descend and back up
//! concurrently without locking.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use engine_core::{Position, PositionKey};

use crate::config::SearchConfig;

/// An `f32` stored in an `AtomicU32` through its bit pattern.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    #[inline]
    pub fn store(&self, value: f32, order: Ordering) {
        self.0.store(value.to_bits(), order)
    }

    /// Add `delta` with a CAS loop, returning the previous value.
    #[inline]
    pub fn fetch_add(&self, delta: f32, order: Ordering) -> f32 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, order, Ordering::Relaxed)
            {
                Ok(previous) => return f32::from_bits(previous),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Lifecycle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeStatus {
    /// Created but not yet claimed for evaluation.
    Unexpanded = 0,
    /// Claimed by exactly one worker; its evaluation is in flight.
    EvaluationPending = 1,
    /// Evaluated; edges are materialized.
    Expanded = 2,
    /// Game over. Never evaluated, never expanded.
    Terminal = 3,
}

impl NodeStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => NodeStatus::Unexpanded,
            1 => NodeStatus::EvaluationPending,
            2 => NodeStatus::Expanded,
            _ => NodeStatus::Terminal,
        }
    }
}

/// Outgoing edge of a node: one legal move with its prior and statistics.
///
/// Visits and value sum are kept from the parent's perspective so the parent
/// can score the move directly.
#[derive(Debug)]
pub struct Edge<P: Position> {
    mv: P::Move,
    raw_prior: f32,
    prior: AtomicF32,
    visits: AtomicU32,
    value_sum: AtomicF32,
    virtual_loss: AtomicU32,
    child: OnceLock<Arc<Node<P>>>,
}

impl<P: Position> Edge<P> {
    fn new(mv: P::Move, prior: f32) -> Self {
        Self {
            mv,
            raw_prior: prior,
            prior: AtomicF32::new(prior),
            visits: AtomicU32::new(0),
            value_sum: AtomicF32::new(0.0),
            virtual_loss: AtomicU32::new(0),
            child: OnceLock::new(),
        }
    }

    #[inline]
    pub fn mv(&self) -> P::Move {
        self.mv
    }

    /// Prior used for selection (including root noise, if any).
    #[inline]
    pub fn prior(&self) -> f32 {
        self.prior.load(Ordering::Relaxed)
    }

    /// Prior as assigned by the evaluator, before any noise.
    #[inline]
    pub fn raw_prior(&self) -> f32 {
        self.raw_prior
    }

    pub(crate) fn set_prior(&self, prior: f32) {
        self.prior.store(prior, Ordering::Relaxed);
    }

    #[inline]
    pub fn visits(&self) -> u32 {
        self.visits.load(Ordering::Acquire)
    }

    #[inline]
    pub fn value_sum(&self) -> f32 {
        self.value_sum.load(Ordering::Acquire)
    }

    /// Number of workers currently descending through this edge.
    #[inline]
    pub fn pending_virtual_loss(&self) -> u32 {
        self.virtual_loss.load(Ordering::Acquire)
    }

    /// Mean backed-up value from the parent's perspective.
    /// Returns 0.0 if never visited.
    #[inline]
    pub fn mean_value(&self) -> f32 {
        let visits = self.visits();
        if visits == 0 {
            0.0
        } else {
            self.value_sum() / visits as f32
        }
    }

    /// Child node, if it has been created.
    #[inline]
    pub fn child(&self) -> Option<&Arc<Node<P>>> {
        self.child.get()
    }

    /// Return the child, creating it with `create` if absent.
    ///
    /// At most one caller runs `create`; concurrent callers wait for it and
    /// share the result. The flag is true for the caller that linked it.
    pub(crate) fn child_or_link<F>(&self, create: F) -> (&Arc<Node<P>>, bool)
    where
        F: FnOnce() -> Arc<Node<P>>,
    {
        let mut linked = false;
        let child = self.child.get_or_init(|| {
            linked = true;
            create()
        });
        (child, linked)
    }

    #[inline]
    pub(crate) fn add_virtual_loss(&self) {
        self.virtual_loss.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn revert_virtual_loss(&self) {
        self.virtual_loss.fetch_sub(1, Ordering::AcqRel);
    }

    #[inline]
    fn record(&self, value: f32) {
        self.value_sum.fetch_add(value, Ordering::AcqRel);
        self.visits.fetch_add(1, Ordering::AcqRel);
    }

    /// Exploitation term, with every pending visit counted as a loss.
    #[inline]
    pub fn q_value(&self, virtual_loss: f32, q_init: f32) -> f32 {
        let visits = self.visits();
        let pending = self.pending_virtual_loss();
        if visits + pending == 0 {
            return q_init;
        }
        (self.value_sum() - pending as f32 * virtual_loss) / (visits + pending) as f32
    }

    /// Q used for selection: the running mean blended toward the child's own
    /// evaluator value by `q_value_weight`.
    ///
    /// Q = (1 - w) * mean + w * -eval(child)
    ///
    /// The blend applies only once the edge has been visited and its child
    /// evaluated; a weight of 0 leaves the running mean untouched.
    #[inline]
    pub fn blended_q(&self, config: &SearchConfig) -> f32 {
        let q = self.q_value(config.virtual_loss, config.q_init);
        let weight = config.q_value_weight;
        if weight <= 0.0 || self.visits() == 0 {
            return q;
        }
        match self.child() {
            Some(child) if child.is_expanded() || child.is_terminal() => {
                // child values are for the side to move there
                (1.0 - weight) * q + weight * -child.eval_value()
            }
            _ => q,
        }
    }

    /// PUCT selection score.
    ///
    /// score = Q + c_puct * P * sqrt(N_parent) / (1 + N + VL)
    ///
    /// Takes pre-computed sqrt(parent_visits) to avoid redundant sqrt calls
    /// when comparing siblings.
    #[inline]
    pub fn puct_score(&self, parent_visits_sqrt: f32, config: &SearchConfig) -> f32 {
        let q = self.blended_q(config);
        let crowd = (self.visits() + self.pending_virtual_loss()) as f32;
        let u = config.c_puct * self.prior() * parent_visits_sqrt / (1.0 + crowd);
        q + u
    }
}

/// A position in the search graph.
#[derive(Debug)]
pub struct Node<P: Position> {
    position: P,
    key: PositionKey,
    terminal_value: Option<f32>,
    status: AtomicU8,
    visits: AtomicU32,
    value_sum: AtomicF32,
    eval_value: AtomicF32,
    edges: OnceLock<Box<[Edge<P>]>>,
}

impl<P: Position> Node<P> {
    /// Create a node. Terminal positions start in `Terminal` status.
    pub fn new(position: P) -> Self {
        let terminal_value = position.terminal_value();
        let status = if terminal_value.is_some() {
            NodeStatus::Terminal
        } else {
            NodeStatus::Unexpanded
        };
        Self {
            key: position.hash_key(),
            position,
            terminal_value,
            status: AtomicU8::new(status as u8),
            visits: AtomicU32::new(0),
            value_sum: AtomicF32::new(0.0),
            eval_value: AtomicF32::new(0.0),
            edges: OnceLock::new(),
        }
    }

    #[inline]
    pub fn position(&self) -> &P {
        &self.position
    }

    #[inline]
    pub fn key(&self) -> PositionKey {
        self.key
    }

    #[inline]
    pub fn status(&self) -> NodeStatus {
        NodeStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal_value.is_some()
    }

    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.status() == NodeStatus::Expanded
    }

    /// Game result for the side to move, if the game is over.
    #[inline]
    pub fn terminal_value(&self) -> Option<f32> {
        self.terminal_value
    }

    #[inline]
    pub fn visits(&self) -> u32 {
        self.visits.load(Ordering::Acquire)
    }

    #[inline]
    pub fn value_sum(&self) -> f32 {
        self.value_sum.load(Ordering::Acquire)
    }

    /// Mean backed-up value from the side to move's perspective.
    /// Returns 0.0 if never visited.
    #[inline]
    pub fn mean_value(&self) -> f32 {
        let visits = self.visits();
        if visits == 0 {
            0.0
        } else {
            self.value_sum() / visits as f32
        }
    }

    /// Value the evaluator assigned to this position; the terminal value for
    /// terminal nodes.
    #[inline]
    pub fn eval_value(&self) -> f32 {
        self.terminal_value
            .unwrap_or_else(|| self.eval_value.load(Ordering::Acquire))
    }

    /// Outgoing edges; empty until the node is expanded.
    #[inline]
    pub fn edges(&self) -> &[Edge<P>] {
        self.edges.get().map(|edges| &edges[..]).unwrap_or(&[])
    }

    /// Edge for a move, with its index.
    pub fn edge_for(&self, mv: P::Move) -> Option<(usize, &Edge<P>)> {
        self.edges().iter().enumerate().find(|(_, e)| e.mv() == mv)
    }

    /// Materialized child reached by `mv`.
    pub fn child_for(&self, mv: P::Move) -> Option<&Arc<Node<P>>> {
        self.edge_for(mv).and_then(|(_, edge)| edge.child())
    }

    /// Claim the node for evaluation. Only one caller ever succeeds for a
    /// given `Unexpanded` period.
    pub(crate) fn try_claim(&self) -> bool {
        self.status
            .compare_exchange(
                NodeStatus::Unexpanded as u8,
                NodeStatus::EvaluationPending as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Give a claim back after a failed evaluation.
    pub(crate) fn release_claim(&self) {
        let _ = self.status.compare_exchange(
            NodeStatus::EvaluationPending as u8,
            NodeStatus::Unexpanded as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Materialize edges from normalized priors and publish the node as
    /// expanded. Must be called by the claim holder.
    pub(crate) fn expand(&self, value: f32, priors: Vec<(P::Move, f32)>) {
        self.eval_value.store(value, Ordering::Release);
        let edges: Box<[Edge<P>]> = priors
            .into_iter()
            .map(|(mv, prior)| Edge::new(mv, prior))
            .collect();
        let _ = self.edges.set(edges);
        self.status
            .store(NodeStatus::Expanded as u8, Ordering::Release);
    }

    #[inline]
    fn record_visit(&self, value: f32) {
        self.value_sum.fetch_add(value, Ordering::AcqRel);
        self.visits.fetch_add(1, Ordering::AcqRel);
    }

    /// Index of the edge with the highest PUCT score. Ties go to the lowest
    /// index. `None` if the node has no edges.
    pub fn select_edge(&self, config: &SearchConfig) -> Option<usize> {
        // an unvisited parent still ranks its children by prior
        let parent_visits_sqrt = (self.visits().max(1) as f32).sqrt();
        let mut best: Option<(usize, f32)> = None;
        for (idx, edge) in self.edges().iter().enumerate() {
            let score = edge.puct_score(parent_visits_sqrt, config);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((idx, score));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Index of the edge to play: most visits, then best mean value, then
    /// highest prior, then lowest index.
    pub fn best_edge(&self) -> Option<usize> {
        let mut best: Option<(usize, (u32, f32, f32))> = None;
        for (idx, edge) in self.edges().iter().enumerate() {
            let rank = (edge.visits(), edge.mean_value(), edge.prior());
            let better = match best {
                None => true,
                Some((_, top)) => {
                    rank.0 > top.0
                        || (rank.0 == top.0 && rank.1 > top.1)
                        || (rank.0 == top.0 && rank.1 == top.1 && rank.2 > top.2)
                }
            };
            if better {
                best = Some((idx, rank));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Index of the edge with the most visits (lowest index on ties).
    pub fn most_visited_edge(&self) -> Option<usize> {
        let mut best: Option<(usize, u32)> = None;
        for (idx, edge) in self.edges().iter().enumerate() {
            if best.map_or(true, |(_, top)| edge.visits() > top) {
                best = Some((idx, edge.visits()));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Move the children out, leaving the node edgeless.
    pub(crate) fn take_children(&mut self) -> impl Iterator<Item = Arc<Node<P>>> {
        self.edges
            .take()
            .map(|edges| edges.into_vec())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|edge| edge.child.into_inner())
    }
}

impl<P: Position> Drop for Node<P> {
    /// Release the subtree with an explicit stack instead of recursive drops,
    /// so the depth of the tree never limits the depth of the call stack.
    fn drop(&mut self) {
        let mut stack: Vec<Arc<Node<P>>> = self.take_children().collect();
        while let Some(node) = stack.pop() {
            if let Ok(mut node) = Arc::try_unwrap(node) {
                stack.extend(node.take_children());
            }
        }
    }
}

/// One step of a selection path: the node and the index of the edge taken.
pub type PathStep<'a, P> = (&'a Node<P>, usize);

/// Back up `value` (side to move at `leaf`) from the leaf to the root.
///
/// The value is negated at every step. A parent records its own visit before
/// the edge, so edge visits never exceed the parent's visits. Each edge on the
/// path gives back the virtual loss it received during selection.
pub(crate) fn backup<P: Position>(path: &[PathStep<'_, P>], leaf: &Node<P>, value: f32) {
    leaf.record_visit(value);
    let mut value = value;
    for &(parent, idx) in path.iter().rev() {
        value = -value;
        parent.record_visit(value);
        let edge = &parent.edges()[idx];
        edge.record(value);
        edge.revert_virtual_loss();
    }
}

/// Give back the virtual loss of a path that ended without a backup.
pub(crate) fn revert_virtual_loss<P: Position>(path: &[PathStep<'_, P>]) {
    for &(node, idx) in path {
        node.edges()[idx].revert_virtual_loss();
    }
}
