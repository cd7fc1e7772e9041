//! Search worker: repeated selection, batched evaluation and backup.
//!
//! A worker descends from the root by PUCT, marking each edge it takes with
//! virtual loss so concurrent workers spread out. Each descent ends in one of
//! four ways:
//! - a node it claims for evaluation (queued in the worker's batch),
//! - a terminal node (its game result is backed up at once),
//! - a node reached through a fresh transposition link that is already
//!   evaluated (its value is backed up at once),
//! - a node another descent already claimed (a collision: nothing is backed
//!   up and the virtual loss is released once the batch round ends).

use std::collections::HashSet;
use std::ptr;
use std::sync::Arc;
use std::time::Instant;

use engine_core::Position;
use tracing::trace;

use crate::batcher::Batcher;
use crate::config::SearchConfig;
use crate::evaluator::{Evaluator, EvaluatorError};
use crate::node::{backup, revert_virtual_loss, Edge, Node, NodeStatus, PathStep};
use crate::search::StopHandle;
use crate::stats::SearchCounters;
use crate::transposition::{Linked, TranspositionIndex};

/// State shared by all workers of one search.
pub(crate) struct SearchShared<'a, P: Position> {
    pub root: &'a Node<P>,
    pub index: &'a TranspositionIndex<P>,
    pub config: &'a SearchConfig,
    pub stop: &'a StopHandle,
    pub counters: &'a SearchCounters,
    /// Playout budget for this search.
    pub node_limit: Option<u64>,
}

impl<P: Position> SearchShared<'_, P> {
    fn node_limit_reached(&self) -> bool {
        self.budget_exhausted(0)
    }

    /// Whether `pending` more playouts would use up the playout budget.
    fn budget_exhausted(&self, pending: usize) -> bool {
        self.node_limit
            .is_some_and(|limit| self.counters.playouts() + pending as u64 >= limit)
    }
}

/// How a single descent ended.
pub(crate) enum Descent<'a, P: Position> {
    /// Claimed an unexpanded node; it must be evaluated.
    NewLeaf(&'a Node<P>, Vec<PathStep<'a, P>>),
    /// Reached the end of the game.
    Terminal(&'a Node<P>, Vec<PathStep<'a, P>>),
    /// Linked an edge to an already evaluated node.
    Transposition(&'a Node<P>, Vec<PathStep<'a, P>>),
    /// Reached a node whose evaluation is in flight.
    Collision(Vec<PathStep<'a, P>>),
}

pub(crate) struct Worker<'a, P: Position, E: Evaluator<P> + ?Sized> {
    id: usize,
    shared: &'a SearchShared<'a, P>,
    evaluator: &'a E,
    batcher: Batcher<'a, P>,
    collisions: Vec<Vec<PathStep<'a, P>>>,
}

impl<'a, P: Position, E: Evaluator<P> + ?Sized> Worker<'a, P, E> {
    pub fn new(id: usize, shared: &'a SearchShared<'a, P>, evaluator: &'a E) -> Self {
        Self {
            id,
            shared,
            evaluator,
            batcher: Batcher::new(shared.config.batch_size),
            collisions: Vec::new(),
        }
    }

    /// Run batch rounds until the search is stopped or the node limit is hit.
    ///
    /// An evaluator error stops the whole search and is returned.
    pub fn run(mut self) -> Result<(), EvaluatorError> {
        trace!(worker = self.id, "Worker started");
        while !self.shared.stop.is_stopped() {
            if self.shared.node_limit_reached() {
                self.shared.stop.stop();
                break;
            }
            if let Err(err) = self.run_round() {
                self.shared.stop.stop();
                return Err(err);
            }
        }
        trace!(worker = self.id, "Worker finished");
        Ok(())
    }

    /// Collect one mini-batch, evaluate it and release collision paths.
    pub fn run_round(&mut self) -> Result<usize, EvaluatorError> {
        self.collect();
        let result = self.batcher.flush(self.evaluator, self.shared.counters);
        for path in self.collisions.drain(..) {
            revert_virtual_loss(&path);
        }
        result
    }

    fn collect(&mut self) {
        let batch_size = self.shared.config.batch_size;
        let deadline = self
            .shared
            .config
            .batch_timeout
            .map(|timeout| Instant::now() + timeout);
        let mut immediate = 0;

        while !self.batcher.is_full() && self.collisions.len() + immediate < batch_size {
            match self.descend() {
                Descent::NewLeaf(node, path) => self.batcher.push(node, path),
                Descent::Terminal(node, path) => {
                    backup(&path, node, node.eval_value());
                    self.shared.counters.record_terminal_hit();
                    self.shared.counters.record_playout(path.len());
                    immediate += 1;
                }
                Descent::Transposition(node, path) => {
                    backup(&path, node, node.eval_value());
                    self.shared.counters.record_transposition_hit();
                    self.shared.counters.record_playout(path.len());
                    immediate += 1;
                }
                Descent::Collision(path) => {
                    // No visit is recorded for a collision: edge visits must
                    // sum exactly to the parent's visits once nothing is
                    // pending, so a revisit without a value would break that.
                    self.shared.counters.record_collision();
                    self.collisions.push(path);
                }
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            if self.shared.budget_exhausted(self.batcher.len()) {
                break;
            }
        }
    }

    /// Walk from the root to the first node that is not an expanded interior node.
    pub fn descend(&self) -> Descent<'a, P> {
        let shared = self.shared;
        let mut node = shared.root;
        let mut path: Vec<PathStep<'a, P>> = Vec::new();

        loop {
            match node.status() {
                NodeStatus::Terminal => return Descent::Terminal(node, path),
                NodeStatus::EvaluationPending => return Descent::Collision(path),
                NodeStatus::Unexpanded => {
                    return if node.try_claim() {
                        Descent::NewLeaf(node, path)
                    } else {
                        // lost the race for the claim
                        Descent::Collision(path)
                    };
                }
                NodeStatus::Expanded => {}
            }

            let Some(idx) = node.select_edge(shared.config) else {
                // evaluated but without moves: back up its evaluation
                return Descent::Terminal(node, path);
            };
            let edge: &'a Edge<P> = &node.edges()[idx];
            edge.add_virtual_loss();
            path.push((node, idx));

            let (child, linked) = edge.child_or_link(|| self.create_child(node, edge));
            let child: &'a Node<P> = child;
            if linked && child.status() == NodeStatus::Expanded {
                return Descent::Transposition(child, path);
            }
            node = child;
        }
    }

    /// Build the child reached through `edge`, sharing an existing node for
    /// the same position when the index has one.
    fn create_child(&self, parent: &Node<P>, edge: &Edge<P>) -> Arc<Node<P>> {
        let mv = edge.mv();
        let position = parent.position().apply(mv);
        if position.is_terminal() {
            return Arc::new(Node::new(position));
        }

        match self.shared.index.link_or_insert(position) {
            Linked::Shared(node) => {
                // a node that already leads back to the parent would close a cycle
                if !parent.position().is_irreversible(mv) && leads_to(&node, parent) {
                    trace!(worker = self.id, key = node.key(), "Unshared link to avoid a cycle");
                    return Arc::new(Node::new(node.position().clone()));
                }
                node
            }
            Linked::Inserted(node) => node,
            Linked::HashCollision(node) => {
                self.shared.counters.record_hash_collision();
                node
            }
        }
    }
}

/// Whether `target` is reachable from `from` through materialized children.
///
/// Only reversible moves are followed: a sequence that returns to an earlier
/// position never contains an irreversible move. Links made concurrently by
/// other workers are not seen.
fn leads_to<P: Position>(from: &Node<P>, target: &Node<P>) -> bool {
    let mut seen: HashSet<*const Node<P>> = HashSet::new();
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        if ptr::eq(node, target) {
            return true;
        }
        if !seen.insert(node as *const Node<P>) {
            continue;
        }
        for edge in node.edges() {
            if node.position().is_irreversible(edge.mv()) {
                continue;
            }
            if let Some(child) = edge.child() {
                let child: &Node<P> = child;
                stack.push(child);
            }
        }
    }
    false
}
