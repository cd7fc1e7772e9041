//! Hash-keyed index of live nodes.
//!
//! Lets a newly reached position find an existing node for the same position
//! so that transpositions share one node and its statistics. Entries are weak:
//! the index never keeps a node alive, and entries whose node was reclaimed are
//! replaced on the next insert or dropped by [`TranspositionIndex::purge_dead`].

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use engine_core::{Position, PositionKey};
use parking_lot::Mutex;
use tracing::warn;

use crate::node::Node;

/// Outcome of [`TranspositionIndex::link_or_insert`].
#[derive(Debug)]
pub enum Linked<P: Position> {
    /// A live node for the same position already existed.
    Shared(Arc<Node<P>>),
    /// No live node existed; a new one was created and indexed.
    Inserted(Arc<Node<P>>),
    /// The key belongs to a different position. The node is fresh and not indexed.
    HashCollision(Arc<Node<P>>),
}

impl<P: Position> Linked<P> {
    pub fn node(&self) -> &Arc<Node<P>> {
        match self {
            Linked::Shared(node) | Linked::Inserted(node) | Linked::HashCollision(node) => node,
        }
    }

    pub fn into_node(self) -> Arc<Node<P>> {
        match self {
            Linked::Shared(node) | Linked::Inserted(node) | Linked::HashCollision(node) => node,
        }
    }
}

/// Map from position key to the node currently representing that position.
#[derive(Debug)]
pub struct TranspositionIndex<P: Position> {
    map: Mutex<HashMap<PositionKey, Weak<Node<P>>>>,
}

impl<P: Position> Default for TranspositionIndex<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Position> TranspositionIndex<P> {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Find the live node for `position`, or create and index a new one.
    ///
    /// Lookup and insertion happen in one critical section, so two workers
    /// reaching the same position concurrently always end up sharing a node.
    pub fn link_or_insert(&self, position: P) -> Linked<P> {
        let key = position.hash_key();
        let mut map = self.map.lock();

        if let Some(existing) = map.get(&key).and_then(Weak::upgrade) {
            if *existing.position() == position {
                return Linked::Shared(existing);
            }
            drop(map);
            warn!(
                key = format_args!("{key:#018x}"),
                "Hash collision between distinct positions, using an unshared node"
            );
            return Linked::HashCollision(Arc::new(Node::new(position)));
        }

        let node = Arc::new(Node::new(position));
        map.insert(key, Arc::downgrade(&node));
        Linked::Inserted(node)
    }

    /// Index an existing node (a fresh root), replacing any entry for its key.
    pub fn insert(&self, node: &Arc<Node<P>>) {
        self.map.lock().insert(node.key(), Arc::downgrade(node));
    }

    /// Live node for `key`, if any.
    pub fn get(&self, key: PositionKey) -> Option<Arc<Node<P>>> {
        self.map.lock().get(&key).and_then(Weak::upgrade)
    }

    /// Drop entries whose node has been freed. Returns how many were removed.
    pub fn purge_dead(&self) -> usize {
        let mut map = self.map.lock();
        let before = map.len();
        map.retain(|_, weak| weak.strong_count() > 0);
        before - map.len()
    }

    /// Number of entries, including entries whose node is already gone.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.map.lock().clear();
    }
}
