//! Nodes and borrowed node views.

use std::cmp::Ordering;
use std::ptr;

use drift_core::{CollectionError, NodeKey, NodeKind, Particle, ParticleId};

use crate::payload::Payload;
use crate::store::NodeStore;

/// A doubly linked chain element owning one particle.
///
/// Links are keys into the owning [`NodeStore`], never owning references;
/// the store owns every node.
pub(crate) struct Node {
    pub(crate) id: ParticleId,
    pub(crate) prev: Option<NodeKey>,
    pub(crate) next: Option<NodeKey>,
    /// Heap-held so the mirror's `data_ptr` survives slab growth.
    pub(crate) data: Option<Payload>,
    /// Cleared by unlink. An unregistered node never gets links back.
    pub(crate) registered: bool,
    pub(crate) affinity: i32,
}

impl Node {
    pub(crate) fn new(id: ParticleId, data: Option<Payload>) -> Self {
        Self {
            id,
            prev: None,
            next: None,
            data,
            registered: true,
            affinity: -1,
        }
    }
}

/// Borrowed view of a live node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    store: &'a NodeStore,
    key: NodeKey,
    node: &'a Node,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(store: &'a NodeStore, key: NodeKey, node: &'a Node) -> Self {
        Self { store, key, node }
    }

    /// Key of this node in its store.
    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Particle identifier carried by the node.
    pub fn id(&self) -> ParticleId {
        self.node.id
    }

    /// The payload, if any.
    pub fn particle(&self) -> Option<&'a Particle> {
        self.node.data.as_ref().map(Payload::get)
    }

    /// Kind of the store the node lives in.
    pub fn kind(&self) -> NodeKind {
        self.store.kind()
    }

    /// Whether the node still participates in a chain.
    pub fn is_registered(&self) -> bool {
        self.node.registered
    }

    /// Worker rank recorded for the node, or `-1`.
    pub fn worker_affinity(&self) -> i32 {
        self.node.affinity
    }

    /// The previous node in the chain.
    pub fn prev(&self) -> Option<NodeRef<'a>> {
        self.node.prev.and_then(|k| self.store.get(k))
    }

    /// The next node in the chain.
    pub fn next(&self) -> Option<NodeRef<'a>> {
        self.node.next.and_then(|k| self.store.get(k))
    }

    /// Equality: by payload identity when both nodes carry a payload,
    /// otherwise by identifier.
    pub fn try_eq(&self, other: &NodeRef<'_>) -> Result<bool, CollectionError> {
        self.check_kind(other)?;
        Ok(match (self.particle(), other.particle()) {
            (Some(a), Some(b)) => ptr::eq(a, b),
            _ => self.id() == other.id(),
        })
    }

    /// Ordering by identifier.
    pub fn try_cmp(&self, other: &NodeRef<'_>) -> Result<Ordering, CollectionError> {
        self.check_kind(other)?;
        Ok(self.id().cmp(&other.id()))
    }

    fn check_kind(&self, other: &NodeRef<'_>) -> Result<(), CollectionError> {
        if self.kind() != other.kind() {
            return Err(CollectionError::KindMismatch {
                left: self.kind(),
                right: other.kind(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("key", &self.key)
            .field("id", &self.node.id)
            .field("prev", &self.node.prev)
            .field("next", &self.node.next)
            .field("registered", &self.node.registered)
            .finish()
    }
}

/// Iterator following `next` links from a starting node.
pub struct Chain<'a> {
    store: &'a NodeStore,
    cursor: Option<NodeKey>,
}

impl<'a> Chain<'a> {
    pub(crate) fn new(store: &'a NodeStore, start: Option<NodeKey>) -> Self {
        Self {
            store,
            cursor: start,
        }
    }
}

impl<'a> Iterator for Chain<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.store.get(self.cursor?)?;
        self.cursor = node.node.next;
        Some(node)
    }
}
