//! Root ownership and subtree reuse across moves.
//!
//! After a search the manager pre-links two candidate roots: the child for
//! the move we chose and that child's most visited reply. When the game moves
//! on, the matching candidate (or the root's child for the played move)
//! becomes the new root in O(1) and keeps all of its statistics. The old root
//! is kept as an ancestor for as long as the game history can still reference
//! it for repetition checks, then handed to the reclaimer.

use std::collections::VecDeque;
use std::sync::Arc;

use engine_core::Position;
use tracing::debug;

use crate::node::Node;
use crate::reclaimer::Reclaimer;
use crate::transposition::TranspositionIndex;

/// Root chosen for a new search.
#[derive(Debug)]
pub struct RootResolution<P: Position> {
    pub root: Arc<Node<P>>,
    /// Whether the root came from the previous tree.
    pub reused: bool,
}

/// Owns the live tree between searches.
#[derive(Debug)]
pub struct TreeManager<P: Position> {
    root: Option<Arc<Node<P>>>,
    /// Previous roots, oldest first.
    ancestors: VecDeque<Arc<Node<P>>>,
    own_next: Option<Arc<Node<P>>>,
    opponent_next: Option<Arc<Node<P>>>,
    tree_reuse: bool,
}

impl<P: Position> TreeManager<P> {
    pub fn new(tree_reuse: bool) -> Self {
        Self {
            root: None,
            ancestors: VecDeque::new(),
            own_next: None,
            opponent_next: None,
            tree_reuse,
        }
    }

    pub fn root(&self) -> Option<&Arc<Node<P>>> {
        self.root.as_ref()
    }

    /// Previous roots still retained for repetition checks.
    pub fn ancestors(&self) -> usize {
        self.ancestors.len()
    }

    pub fn own_next(&self) -> Option<&Arc<Node<P>>> {
        self.own_next.as_ref()
    }

    pub fn opponent_next(&self) -> Option<&Arc<Node<P>>> {
        self.opponent_next.as_ref()
    }

    pub fn tree_reuse(&self) -> bool {
        self.tree_reuse
    }

    /// Choose the root for a search of `position`.
    ///
    /// Reuses the current root or promotes a candidate when the position
    /// matches; otherwise starts a fresh tree and detaches the old one.
    pub fn resolve_root(
        &mut self,
        position: &P,
        window: usize,
        index: &TranspositionIndex<P>,
        reclaimer: &Reclaimer<P>,
    ) -> RootResolution<P> {
        if self.tree_reuse {
            if let Some(root) = self.root.as_ref().filter(|r| r.position() == position) {
                return RootResolution {
                    root: Arc::clone(root),
                    reused: true,
                };
            }

            let candidate = [self.own_next.as_ref(), self.opponent_next.as_ref()]
                .into_iter()
                .flatten()
                .find(|c| c.position() == position)
                .cloned();
            if let Some(candidate) = candidate {
                self.promote(candidate, window, reclaimer);
                self.own_next = None;
                self.opponent_next = None;
                if let Some(root) = &self.root {
                    return RootResolution {
                        root: Arc::clone(root),
                        reused: true,
                    };
                }
            }
        }

        if self.root.is_some() {
            debug!(
                key = format_args!("{:#018x}", position.hash_key()),
                "Tree reuse miss, starting a fresh tree"
            );
        }
        self.clear(reclaimer);
        let root = Arc::new(Node::new(position.clone()));
        index.insert(&root);
        self.root = Some(Arc::clone(&root));
        RootResolution { root, reused: false }
    }

    /// Pre-link the candidate roots for the next move after a search chose `best_move`.
    pub fn prepare_candidates(&mut self, best_move: P::Move) {
        let Some(root) = &self.root else {
            return;
        };
        self.own_next = root
            .child_for(best_move)
            .filter(|child| !child.is_terminal())
            .cloned();
        self.opponent_next = self
            .own_next
            .as_ref()
            .and_then(|child| {
                child
                    .most_visited_edge()
                    .and_then(|idx| child.edges()[idx].child())
            })
            .filter(|grandchild| !grandchild.is_terminal())
            .cloned();
    }

    /// Follow a move played on the board.
    ///
    /// `next` is the position after `mv`, `window` the number of previous
    /// positions repetition checks may still reference.
    pub fn apply_move(
        &mut self,
        mv: P::Move,
        is_own: bool,
        next: &P,
        window: usize,
        reclaimer: &Reclaimer<P>,
    ) {
        if !self.tree_reuse {
            self.clear(reclaimer);
            return;
        }
        let Some(root) = &self.root else {
            return;
        };

        let candidate = if is_own {
            self.own_next.as_ref()
        } else {
            self.opponent_next.as_ref()
        };
        let successor = candidate
            .filter(|c| c.position() == next)
            .or_else(|| {
                root.child_for(mv)
                    .filter(|c| !c.is_terminal() && c.position() == next)
            })
            .cloned();

        match successor {
            Some(successor) => {
                debug!(
                    is_own,
                    reused_visits = successor.visits(),
                    "Promoting subtree to root"
                );
                // after our own move the opponent candidate is a child of the new root
                self.own_next = None;
                if !is_own {
                    self.opponent_next = None;
                }
                self.promote(successor, window, reclaimer);
            }
            None => {
                debug!(is_own, "Played move not in tree, dropping it");
                self.clear(reclaimer);
            }
        }
    }

    /// Make `successor` the root and retire the old root to the ancestors.
    fn promote(&mut self, successor: Arc<Node<P>>, window: usize, reclaimer: &Reclaimer<P>) {
        if let Some(old) = self.root.replace(successor) {
            self.ancestors.push_back(old);
        }
        while self.ancestors.len() > window {
            if let Some(oldest) = self.ancestors.pop_front() {
                reclaimer.detach(oldest);
            }
        }
    }

    /// Detach the whole tree.
    pub fn clear(&mut self, reclaimer: &Reclaimer<P>) {
        // candidates first, so the reclaimer sees the subtree's last owner
        self.own_next = None;
        self.opponent_next = None;
        if let Some(root) = self.root.take() {
            reclaimer.detach(root);
        }
        for ancestor in self.ancestors.drain(..) {
            reclaimer.detach(ancestor);
        }
    }
}
