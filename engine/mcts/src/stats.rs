//! Search statistics: live counters and post-search summaries.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use engine_core::Position;
use serde::Serialize;

use crate::node::Node;

/// Counters updated by the workers while a search runs.
#[derive(Debug, Default)]
pub struct SearchCounters {
    playouts: AtomicU64,
    evaluated: AtomicU64,
    batches: AtomicU64,
    collisions: AtomicU64,
    terminal_hits: AtomicU64,
    transposition_hits: AtomicU64,
    hash_collisions: AtomicU64,
    depth_sum: AtomicU64,
    max_depth: AtomicU64,
}

impl SearchCounters {
    /// A backed-up playout whose path had `depth` edges.
    pub fn record_playout(&self, depth: usize) {
        self.playouts.fetch_add(1, Ordering::AcqRel);
        self.depth_sum.fetch_add(depth as u64, Ordering::Relaxed);
        self.max_depth.fetch_max(depth as u64, Ordering::Relaxed);
    }

    pub fn record_batch(&self, leaves: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.evaluated.fetch_add(leaves as u64, Ordering::Relaxed);
    }

    pub fn record_collision(&self) {
        self.collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_terminal_hit(&self) {
        self.terminal_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transposition_hit(&self) {
        self.transposition_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hash_collision(&self) {
        self.hash_collisions.fetch_add(1, Ordering::Relaxed);
    }

    /// Playouts backed up so far.
    pub fn playouts(&self) -> u64 {
        self.playouts.load(Ordering::Acquire)
    }

    /// Freeze the counters into a report.
    pub fn snapshot(&self, elapsed: Duration, reused_nodes: u32) -> SearchStats {
        let playouts = self.playouts();
        let secs = elapsed.as_secs_f64();
        SearchStats {
            playouts,
            evaluated_nodes: self.evaluated.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            terminal_hits: self.terminal_hits.load(Ordering::Relaxed),
            transposition_hits: self.transposition_hits.load(Ordering::Relaxed),
            hash_collisions: self.hash_collisions.load(Ordering::Relaxed),
            elapsed_ms: elapsed.as_millis() as u64,
            nps: if secs > 0.0 { playouts as f64 / secs } else { 0.0 },
            avg_depth: if playouts > 0 {
                self.depth_sum.load(Ordering::Relaxed) as f64 / playouts as f64
            } else {
                0.0
            },
            max_depth: self.max_depth.load(Ordering::Relaxed),
            reused_nodes,
        }
    }
}

/// Summary of one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    /// Backed-up playouts (evaluated leaves, terminal hits and transposition hits).
    pub playouts: u64,
    /// Leaves sent to the evaluator.
    pub evaluated_nodes: u64,
    /// Evaluator calls.
    pub batches: u64,
    /// Descents that ended on a node already pending evaluation.
    pub collisions: u64,
    pub terminal_hits: u64,
    pub transposition_hits: u64,
    pub hash_collisions: u64,
    pub elapsed_ms: u64,
    /// Playouts per second.
    pub nps: f64,
    /// Mean number of edges on a backed-up path.
    pub avg_depth: f64,
    pub max_depth: u64,
    /// Root visits carried over from the previous move.
    pub reused_nodes: u32,
}

/// Rolling average of the search speed over the moves of a game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NpsAverage {
    mean: f64,
    samples: u64,
}

impl NpsAverage {
    pub fn record(&mut self, nps: f64) {
        self.samples += 1;
        self.mean += (nps - self.mean) / self.samples as f64;
    }

    /// Average playouts per second, 0.0 before the first sample.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

/// Statistics of one root child.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildStatistics<M> {
    pub mv: M,
    pub visits: u32,
    /// Mean value from the root's perspective.
    pub mean_value: f32,
    pub prior: f32,
}

/// Snapshot of the tree below the current root.
#[derive(Debug, Clone, PartialEq)]
pub struct RootStatistics<M> {
    pub visits: u32,
    pub children: Vec<ChildStatistics<M>>,
    /// Distinct nodes reachable from the root (shared nodes counted once).
    pub node_count: usize,
    /// Mean distance of reachable nodes from the root.
    pub avg_depth: f32,
    /// Distance of the deepest reachable node.
    pub max_depth: u32,
}

impl<M> RootStatistics<M> {
    /// Child with the most visits.
    pub fn most_visited(&self) -> Option<&ChildStatistics<M>> {
        self.children.iter().reduce(|best, c| if c.visits > best.visits { c } else { best })
    }
}

/// Statistics of each move at `node`, in move order.
pub fn child_statistics<P: Position>(node: &Node<P>) -> Vec<ChildStatistics<P::Move>> {
    node.edges()
        .iter()
        .map(|edge| ChildStatistics {
            mv: edge.mv(),
            visits: edge.visits(),
            mean_value: edge.mean_value(),
            prior: edge.prior(),
        })
        .collect()
}

/// Walk the graph below `root` breadth first, visiting shared nodes once.
pub fn root_statistics<P: Position>(root: &Node<P>) -> RootStatistics<P::Move> {
    let children = child_statistics(root);

    let mut seen: HashSet<*const Node<P>> = HashSet::new();
    let mut queue: VecDeque<(&Node<P>, u32)> = VecDeque::new();
    seen.insert(root as *const Node<P>);
    queue.push_back((root, 0));

    let mut node_count = 0usize;
    let mut depth_sum = 0u64;
    let mut max_depth = 0u32;
    while let Some((node, depth)) = queue.pop_front() {
        node_count += 1;
        depth_sum += depth as u64;
        max_depth = max_depth.max(depth);
        for edge in node.edges() {
            if let Some(child) = edge.child() {
                let child: &Node<P> = child;
                if seen.insert(child as *const Node<P>) {
                    queue.push_back((child, depth + 1));
                }
            }
        }
    }

    RootStatistics {
        visits: root.visits(),
        children,
        node_count,
        avg_depth: depth_sum as f32 / node_count as f32,
        max_depth,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_utils::Toy;

    #[test]
    fn test_nps_average_is_a_running_mean() {
        let mut nps = NpsAverage::default();
        assert_eq!(nps.mean(), 0.0);

        nps.record(1000.0);
        nps.record(3000.0);
        nps.record(2000.0);

        assert_eq!(nps.samples(), 3);
        assert!((nps.mean() - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_derives_rates() {
        let counters = SearchCounters::default();
        counters.record_playout(2);
        counters.record_playout(4);
        counters.record_batch(2);
        counters.record_collision();

        let stats = counters.snapshot(Duration::from_millis(500), 7);

        assert_eq!(stats.playouts, 2);
        assert_eq!(stats.evaluated_nodes, 2);
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.collisions, 1);
        assert_eq!(stats.max_depth, 4);
        assert!((stats.avg_depth - 3.0).abs() < 1e-9);
        assert!((stats.nps - 4.0).abs() < 1e-9);
        assert_eq!(stats.reused_nodes, 7);
    }

    #[test]
    fn test_zero_elapsed_has_zero_rate() {
        let stats = SearchCounters::default().snapshot(Duration::ZERO, 0);
        assert_eq!(stats.nps, 0.0);
        assert_eq!(stats.avg_depth, 0.0);
    }

    #[test]
    fn test_shared_nodes_counted_once() {
        // 0 then 1 and 1 then 0 reach the same position
        let root = Node::new(Toy::new(2, 2).commutative());
        assert!(root.try_claim());
        root.expand(0.0, vec![(0, 0.5), (1, 0.5)]);

        let mut shared: Option<Arc<Node<Toy>>> = None;
        for edge in root.edges() {
            let position = root.position().apply(edge.mv());
            let (child, _) = edge.child_or_link(|| Arc::new(Node::new(position)));
            assert!(child.try_claim());
            child.expand(0.0, vec![(0, 0.5), (1, 0.5)]);
            let swap = 1 - edge.mv();
            let grandchild = shared
                .get_or_insert_with(|| Arc::new(Node::new(child.position().apply(swap))))
                .clone();
            child.edges()[swap as usize].child_or_link(|| grandchild);
        }

        let stats = root_statistics(&root);
        assert_eq!(stats.children.len(), 2);
        // root, two children, one shared grandchild
        assert_eq!(stats.node_count, 4);
        assert_eq!(stats.max_depth, 2);
        assert!((stats.avg_depth - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = SearchStats {
            playouts: 10,
            ..SearchStats::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"playouts\":10"));
    }
}
