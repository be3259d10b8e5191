//! Chain iteration that skips soft-deleted particles.

use drift_core::{NodeKey, Particle};
use drift_nodes::{NodeRef, NodeStore};

/// Double-ended walk over the valid nodes of a chain.
///
/// Front and back cursors meet in the middle; each node is yielded at
/// most once.
pub struct Nodes<'a> {
    store: &'a NodeStore,
    front: Option<NodeKey>,
    back: Option<NodeKey>,
    finished: bool,
}

impl<'a> Nodes<'a> {
    pub(crate) fn new(store: &'a NodeStore, head: Option<NodeKey>, tail: Option<NodeKey>) -> Self {
        Self {
            store,
            front: head,
            back: tail,
            finished: head.is_none() || tail.is_none(),
        }
    }

    fn visible(node: &NodeRef<'a>) -> bool {
        node.particle().is_some_and(Particle::is_valid)
    }
}

impl<'a> Iterator for Nodes<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let Some(node) = self.front.and_then(|k| self.store.get(k)) else {
                self.finished = true;
                break;
            };
            if self.front == self.back {
                self.finished = true;
            } else {
                self.front = self.store.next(node.key());
            }
            if Self::visible(&node) {
                return Some(node);
            }
        }
        None
    }
}

impl DoubleEndedIterator for Nodes<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let Some(node) = self.back.and_then(|k| self.store.get(k)) else {
                self.finished = true;
                break;
            };
            if self.front == self.back {
                self.finished = true;
            } else {
                self.back = self.store.prev(node.key());
            }
            if Self::visible(&node) {
                return Some(node);
            }
        }
        None
    }
}

/// Double-ended iterator over valid particles.
pub struct Iter<'a> {
    nodes: Nodes<'a>,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(nodes: Nodes<'a>) -> Self {
        Self { nodes }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Particle;

    fn next(&mut self) -> Option<Self::Item> {
        self.nodes.next().and_then(|n| n.particle())
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.nodes.next_back().and_then(|n| n.particle())
    }
}
