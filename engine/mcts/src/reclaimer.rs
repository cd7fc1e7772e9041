//! Background release of detached subtrees.
//!
//! Dropping a large tree on the search thread would stall the next move, so
//! subtrees that leave the live tree are sent to a dedicated thread which
//! frees them and then purges the transposition entries they left behind.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use engine_core::Position;
use tracing::{debug, warn};

use crate::node::Node;
use crate::transposition::TranspositionIndex;

/// Counters shared with the reclaimer thread.
#[derive(Debug, Default)]
pub struct ReclaimStats {
    subtrees: AtomicU64,
    nodes_freed: AtomicU64,
}

impl ReclaimStats {
    /// Subtrees handed to the reclaimer.
    pub fn subtrees_received(&self) -> u64 {
        self.subtrees.load(Ordering::Relaxed)
    }

    /// Nodes actually freed. Nodes still shared with the live tree are only
    /// released, not counted.
    pub fn nodes_freed(&self) -> u64 {
        self.nodes_freed.load(Ordering::Relaxed)
    }
}

/// Handle to the reclaimer thread.
pub struct Reclaimer<P: Position> {
    sender: Option<Sender<Arc<Node<P>>>>,
    handle: Option<JoinHandle<()>>,
    stats: Arc<ReclaimStats>,
}

impl<P: Position> Reclaimer<P> {
    /// Start the reclaimer thread.
    pub fn spawn(index: Arc<TranspositionIndex<P>>) -> io::Result<Self> {
        let (sender, receiver) = unbounded();
        let stats = Arc::new(ReclaimStats::default());
        let thread_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name("mcts-reclaimer".to_string())
            .spawn(move || run(receiver, index, thread_stats))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            stats,
        })
    }

    /// Hand a subtree over for freeing. Never blocks.
    pub fn detach(&self, subtree: Arc<Node<P>>) {
        let Some(sender) = &self.sender else {
            free_subtree(subtree, &self.stats);
            return;
        };
        if let Err(err) = sender.send(subtree) {
            // thread is gone; free on the caller instead of leaking
            free_subtree(err.into_inner(), &self.stats);
        }
    }

    pub fn stats(&self) -> &Arc<ReclaimStats> {
        &self.stats
    }

    /// Free everything still queued and join the thread.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        // closing the channel lets the thread drain the queue and exit
        drop(self.sender.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Reclaimer thread panicked");
            }
        }
    }
}

impl<P: Position> Drop for Reclaimer<P> {
    fn drop(&mut self) {
        self.close();
    }
}

fn run<P: Position>(
    receiver: Receiver<Arc<Node<P>>>,
    index: Arc<TranspositionIndex<P>>,
    stats: Arc<ReclaimStats>,
) {
    while let Ok(subtree) = receiver.recv() {
        let mut freed = free_subtree(subtree, &stats);
        let mut subtrees = 1;
        while let Ok(subtree) = receiver.try_recv() {
            freed += free_subtree(subtree, &stats);
            subtrees += 1;
        }
        let purged = index.purge_dead();
        debug!(subtrees, freed, purged, "Reclaimed detached subtrees");
    }
}

/// Free every node of `root` not shared with a live owner. Returns the number
/// of nodes freed.
fn free_subtree<P: Position>(root: Arc<Node<P>>, stats: &ReclaimStats) -> u64 {
    stats.subtrees.fetch_add(1, Ordering::Relaxed);
    let mut freed = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Ok(mut node) = Arc::try_unwrap(node) {
            stack.extend(node.take_children());
            freed += 1;
        }
    }
    stats.nodes_freed.fetch_add(freed, Ordering::Relaxed);
    freed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Toy;

    /// Fully expand `node` down to the end of the game, indexing every child.
    fn grow(node: &Node<Toy>, index: &TranspositionIndex<Toy>) -> u64 {
        if node.is_terminal() {
            return 1;
        }
        assert!(node.try_claim());
        let moves = node.position().legal_moves();
        let prior = 1.0 / moves.len() as f32;
        node.expand(0.0, moves.into_iter().map(|m| (m, prior)).collect());
        let mut count = 1;
        for edge in node.edges() {
            let next = node.position().apply(edge.mv());
            let (child, _) = edge.child_or_link(|| index.link_or_insert(next).into_node());
            count += grow(child, index);
        }
        count
    }

    #[test]
    fn test_detached_tree_is_freed_and_index_purged() {
        let index = Arc::new(TranspositionIndex::new());
        let reclaimer = Reclaimer::spawn(Arc::clone(&index)).unwrap();

        let root = Arc::new(Node::new(Toy::new(3, 3)));
        index.insert(&root);
        let total = grow(&root, &index);
        assert_eq!(total, 1 + 3 + 9 + 27);
        assert!(!index.is_empty());

        reclaimer.detach(root);
        let stats = Arc::clone(reclaimer.stats());
        reclaimer.shutdown();

        assert_eq!(stats.subtrees_received(), 1);
        assert_eq!(stats.nodes_freed(), total);
        assert!(index.is_empty());
    }

    #[test]
    fn test_shared_nodes_survive_reclamation() {
        let index = Arc::new(TranspositionIndex::new());
        let reclaimer = Reclaimer::spawn(Arc::clone(&index)).unwrap();

        let root = Arc::new(Node::new(Toy::new(2, 2)));
        let total = grow(&root, &index);
        let kept = Arc::clone(root.child_for(1).unwrap());

        reclaimer.detach(root);
        let stats = Arc::clone(reclaimer.stats());
        reclaimer.shutdown();

        // the kept child and its two terminal children stay alive
        assert_eq!(stats.nodes_freed(), total - 3);
        assert_eq!(kept.edges().len(), 2);
        assert!(kept.edges().iter().all(|e| e.child().is_some()));
        assert_eq!(index.len(), 3);
    }
}
