//! Node storage with lockstep native mirror maintenance.
//!
//! [`NodeStore`] owns every node of a collection in a generational
//! [`Slab`]. Node `k` in slab slot `s` is shadowed by mirror entry `s`, and
//! every operation that changes links or payloads rewrites the affected
//! mirror entries before returning, so kernels never observe a half-made
//! update. Structural operations on stale keys are no-ops.

use std::ptr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use drift_core::{
    ConfigError, IdIssuer, NodeKey, NodeKind, Particle, ParticleId, ParticleState,
};

use crate::config::StoreConfig;
use crate::mirror::{MirrorTable, NativeNode};
use crate::node::{Chain, Node, NodeRef};
use crate::payload::Payload;
use crate::slab::Slab;

/// Owner of all nodes of one collection and their native mirror.
pub struct NodeStore {
    nodes: Slab<Node>,
    mirror: MirrorTable,
    config: StoreConfig,
    rng: ChaCha8Rng,
}

impl NodeStore {
    /// Create an empty store.
    ///
    /// `seed` drives the random positions passed to the issuer when a node
    /// is created without an identifier.
    pub fn new(config: StoreConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            nodes: Slab::new(),
            mirror: MirrorTable::new(config.segment_len),
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Node kind of every node in this store.
    pub fn kind(&self) -> NodeKind {
        self.config.kind
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of live (not destroyed) nodes, linked or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store holds no live nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Create a detached node.
    ///
    /// Without an identifier (or with [`ParticleId::UNASSIGNED`]) a fresh
    /// one is requested from `issuer`, seeded with a random position. The
    /// payload's `id` is overwritten with the node's identifier.
    pub fn create(
        &mut self,
        id: Option<ParticleId>,
        payload: Option<Particle>,
        issuer: &mut dyn IdIssuer,
    ) -> NodeKey {
        let id = match id {
            Some(id) if !id.is_unassigned() => id,
            _ => {
                let lon = self.rng.random_range(-180.0..180.0);
                let lat = self.rng.random_range(-90.0..90.0);
                let depth = self.rng.random_range(0.0..75.0);
                issuer.next_id(lon, lat, depth, 0.0)
            }
        };
        let data = payload.map(|mut p| {
            p.id = id;
            Payload::new(p)
        });
        let key = self.nodes.insert(Node::new(id, data));
        if self.config.kind.is_mirrored() {
            self.mirror.ensure(key.slot());
        }
        self.sync(key);
        key
    }

    /// Detach a node from its neighbours and destroy it.
    ///
    /// Releases the node's identifier to `issuer` and resets its mirror
    /// entry. Returns the payload stamped [`ParticleState::Destroyed`].
    /// Destroying a stale key does nothing and releases nothing.
    pub fn destroy(&mut self, key: NodeKey, issuer: &mut dyn IdIssuer) -> Option<Particle> {
        self.unlink(key);
        let node = self.nodes.remove(key)?;
        self.mirror.set(key.slot(), NativeNode::EMPTY);
        issuer.release_id(node.id);
        node.data.map(|payload| {
            let mut p = payload.into_inner();
            p.set_state(ParticleState::Destroyed);
            p
        })
    }

    // ── Links ──────────────────────────────────────────────────────

    /// Set a node's own links without touching its neighbours.
    ///
    /// No-op on unregistered or stale nodes.
    pub fn relink(&mut self, key: NodeKey, prev: Option<NodeKey>, next: Option<NodeKey>) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        if !node.registered {
            return;
        }
        node.prev = prev;
        node.next = next;
        self.sync(key);
    }

    /// Splice a node between `prev` and `next`, updating both neighbours.
    ///
    /// No-op on unregistered or stale nodes.
    pub fn insert_between(&mut self, key: NodeKey, prev: Option<NodeKey>, next: Option<NodeKey>) {
        if !self.is_registered(key) {
            return;
        }
        self.relink(key, prev, next);
        if let Some(p) = prev {
            if let Some(node) = self.nodes.get_mut(p) {
                node.next = Some(key);
            }
            self.sync(p);
        }
        if let Some(n) = next {
            if let Some(node) = self.nodes.get_mut(n) {
                node.prev = Some(key);
            }
            self.sync(n);
        }
    }

    /// Sever a node from the chain.
    ///
    /// Each neighbour is repaired to point past the node. The node's mirror
    /// entry loses all three pointers and the node is marked unregistered.
    /// Idempotent.
    pub fn unlink(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        if !node.registered {
            return;
        }
        node.registered = false;
        let prev = node.prev.take();
        let next = node.next.take();
        if let Some(p) = prev {
            if let Some(pn) = self.nodes.get_mut(p) {
                if pn.next == Some(key) {
                    pn.next = next;
                }
            }
            self.sync(p);
        }
        if let Some(n) = next {
            if let Some(nn) = self.nodes.get_mut(n) {
                if nn.prev == Some(key) {
                    nn.prev = prev;
                }
            }
            self.sync(n);
        }
        self.sync(key);
    }

    // ── Payload ────────────────────────────────────────────────────

    /// Swap in a new payload and return the old one.
    ///
    /// The new payload takes the node's identifier.
    pub fn replace_payload(&mut self, key: NodeKey, payload: Option<Particle>) -> Option<Particle> {
        let node = self.nodes.get_mut(key)?;
        let id = node.id;
        let old = std::mem::replace(
            &mut node.data,
            payload.map(|mut p| {
                p.id = id;
                Payload::new(p)
            }),
        );
        self.sync(key);
        old.map(Payload::into_inner)
    }

    /// Record the worker a node's particle is assigned to.
    pub fn set_affinity(&mut self, key: NodeKey, rank: i32) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.affinity = rank;
            self.sync(key);
        }
    }

    // ── Access ─────────────────────────────────────────────────────

    /// View of a live node.
    pub fn get(&self, key: NodeKey) -> Option<NodeRef<'_>> {
        self.nodes.get(key).map(|node| NodeRef::new(self, key, node))
    }

    /// Whether `key` names a live node.
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains(key)
    }

    /// Whether `key` names a live node still participating in a chain.
    pub fn is_registered(&self, key: NodeKey) -> bool {
        self.nodes.get(key).is_some_and(|n| n.registered)
    }

    /// Identifier of a live node.
    pub fn id(&self, key: NodeKey) -> Option<ParticleId> {
        self.nodes.get(key).map(|n| n.id)
    }

    /// Previous node key.
    pub fn prev(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key)?.prev
    }

    /// Next node key.
    pub fn next(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key)?.next
    }

    /// Shared access to a node's payload.
    pub fn particle(&self, key: NodeKey) -> Option<&Particle> {
        self.nodes.get(key)?.data.as_ref().map(Payload::get)
    }

    /// Mutable access to a node's payload.
    ///
    /// The payload stays at the same address and the borrow is derived
    /// from the mirrored pointer, so the mirror needs no update.
    pub fn particle_mut(&mut self, key: NodeKey) -> Option<&mut Particle> {
        self.nodes.get_mut(key)?.data.as_mut().map(Payload::get_mut)
    }

    /// Walk `next` links starting at `start`.
    pub fn chain(&self, start: Option<NodeKey>) -> Chain<'_> {
        Chain::new(self, start)
    }

    /// Iterate all live nodes in slot order, linked or not.
    pub fn iter(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.nodes.iter().map(|(key, node)| NodeRef::new(self, key, node))
    }

    // ── Mirror ─────────────────────────────────────────────────────

    /// The mirror table.
    pub fn mirror(&self) -> &MirrorTable {
        &self.mirror
    }

    /// Copy of a live node's mirror entry. `None` for managed stores.
    pub fn native(&self, key: NodeKey) -> Option<NativeNode> {
        if !self.config.kind.is_mirrored() || !self.nodes.contains(key) {
            return None;
        }
        self.mirror.get(key.slot())
    }

    /// Stable address of a live node's mirror entry, or null.
    pub fn native_ptr(&self, key: NodeKey) -> *mut NativeNode {
        if !self.config.kind.is_mirrored() || !self.nodes.contains(key) {
            return ptr::null_mut();
        }
        self.mirror.entry_ptr(key.slot())
    }

    fn sync(&mut self, key: NodeKey) {
        if !self.config.kind.is_mirrored() {
            return;
        }
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        let entry = if node.registered {
            NativeNode {
                prev_ptr: node
                    .prev
                    .map_or(ptr::null_mut(), |k| self.mirror.entry_ptr(k.slot())),
                next_ptr: node
                    .next
                    .map_or(ptr::null_mut(), |k| self.mirror.entry_ptr(k.slot())),
                data_ptr: node
                    .data
                    .as_ref()
                    .map_or(ptr::null_mut(), |p| p.as_ptr().cast()),
                worker_affinity: node.affinity,
            }
        } else {
            NativeNode {
                worker_affinity: node.affinity,
                ..NativeNode::EMPTY
            }
        };
        self.mirror.set(key.slot(), entry);
    }
}

impl std::fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStore")
            .field("len", &self.nodes.len())
            .field("kind", &self.config.kind)
            .field("mirror_segments", &self.mirror.segment_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::{CollectionError, SequentialIssuer};
    use std::cmp::Ordering;
    use std::ffi::c_void;

    fn store(kind: NodeKind) -> NodeStore {
        NodeStore::new(StoreConfig::new(kind).with_segment_len(16), 7).unwrap()
    }

    fn particle(lon: f64) -> Particle {
        Particle::new(lon, 0.0, 0.0, 0.0)
    }

    fn assert_mirrored(store: &NodeStore, key: NodeKey) {
        let entry = store.native(key).unwrap();
        let expect = |k: Option<NodeKey>| {
            k.map_or(ptr::null_mut(), |k| store.native_ptr(k))
        };
        assert_eq!(entry.prev_ptr, expect(store.prev(key)));
        assert_eq!(entry.next_ptr, expect(store.next(key)));
        let data: *mut c_void = store
            .particle(key)
            .map_or(ptr::null_mut(), |p| ptr::from_ref(p).cast_mut().cast());
        assert_eq!(entry.data_ptr, data);
    }

    #[test]
    fn create_without_id_asks_issuer() {
        let mut issuer = SequentialIssuer::starting_at(5);
        let mut s = store(NodeKind::Mirrored);
        let k = s.create(None, Some(particle(1.0)), &mut issuer);
        assert_eq!(s.id(k), Some(ParticleId(5)));
        assert_eq!(s.particle(k).unwrap().id, ParticleId(5));
        assert_mirrored(&s, k);
    }

    #[test]
    fn create_with_explicit_id_skips_issuer() {
        let mut issuer = SequentialIssuer::new();
        let mut s = store(NodeKind::Mirrored);
        let k = s.create(Some(ParticleId(42)), None, &mut issuer);
        assert_eq!(s.id(k), Some(ParticleId(42)));
        assert_eq!(issuer.total_issued(), 0);
        assert!(s.native(k).unwrap().data_ptr.is_null());
    }

    #[test]
    fn insert_between_links_and_mirrors_neighbours() {
        let mut issuer = SequentialIssuer::new();
        let mut s = store(NodeKind::Mirrored);
        let a = s.create(None, Some(particle(0.0)), &mut issuer);
        let c = s.create(None, Some(particle(2.0)), &mut issuer);
        s.insert_between(c, Some(a), None);
        let b = s.create(None, Some(particle(1.0)), &mut issuer);
        s.insert_between(b, Some(a), Some(c));

        assert_eq!(s.next(a), Some(b));
        assert_eq!(s.prev(c), Some(b));
        for k in [a, b, c] {
            assert_mirrored(&s, k);
        }
        let ids: Vec<_> = s.chain(Some(a)).map(|n| n.id()).collect();
        assert_eq!(ids, vec![ParticleId(0), ParticleId(2), ParticleId(1)]);
    }

    #[test]
    fn unlink_repairs_neighbours_and_is_idempotent() {
        let mut issuer = SequentialIssuer::new();
        let mut s = store(NodeKind::Mirrored);
        let a = s.create(None, Some(particle(0.0)), &mut issuer);
        let b = s.create(None, Some(particle(1.0)), &mut issuer);
        let c = s.create(None, Some(particle(2.0)), &mut issuer);
        s.insert_between(b, Some(a), None);
        s.insert_between(c, Some(b), None);

        s.unlink(b);
        assert_eq!(s.next(a), Some(c));
        assert_eq!(s.prev(c), Some(a));
        assert!(s.native(b).unwrap().is_detached());
        assert_mirrored(&s, a);
        assert_mirrored(&s, c);

        s.unlink(b);
        assert_eq!(s.next(a), Some(c));
    }

    #[test]
    fn relink_after_unlink_is_noop() {
        let mut issuer = SequentialIssuer::new();
        let mut s = store(NodeKind::Mirrored);
        let a = s.create(None, Some(particle(0.0)), &mut issuer);
        let b = s.create(None, Some(particle(1.0)), &mut issuer);
        s.unlink(b);
        s.relink(b, Some(a), None);
        assert_eq!(s.prev(b), None);
        assert!(s.native(b).unwrap().is_detached());
    }

    #[test]
    fn destroy_releases_id_once_and_stamps_payload() {
        let mut issuer = SequentialIssuer::new();
        let mut s = store(NodeKind::Mirrored);
        let a = s.create(None, Some(particle(0.0)), &mut issuer);
        let p = s.destroy(a, &mut issuer).unwrap();
        assert_eq!(p.state(), ParticleState::Destroyed);
        assert_eq!(issuer.released(), 1);
        assert!(s.destroy(a, &mut issuer).is_none());
        assert_eq!(issuer.released(), 1);
        assert!(s.native_ptr(a).is_null());
    }

    #[test]
    fn replace_payload_updates_data_pointer() {
        let mut issuer = SequentialIssuer::new();
        let mut s = store(NodeKind::Mirrored);
        let a = s.create(None, Some(particle(0.0)), &mut issuer);
        let old = s.replace_payload(a, Some(particle(9.0))).unwrap();
        assert_eq!(old.lon, 0.0);
        assert_eq!(s.particle(a).unwrap().lon, 9.0);
        assert_mirrored(&s, a);
        s.replace_payload(a, None);
        assert!(s.native(a).unwrap().data_ptr.is_null());
    }

    #[test]
    #[allow(unsafe_code)]
    fn data_pointer_stays_readable_after_mutable_access() {
        let mut issuer = SequentialIssuer::new();
        let mut s = store(NodeKind::Mirrored);
        let a = s.create(None, Some(particle(0.0)), &mut issuer);
        let data = s.native(a).unwrap().data_ptr.cast::<Particle>();
        s.particle_mut(a).unwrap().lon = 4.0;
        s.particle_mut(a).unwrap().set_state(ParticleState::PendingDelete);
        // SAFETY: node `a` is alive and no borrow of its payload is held.
        let seen = unsafe { &*data };
        assert_eq!(seen.lon, 4.0);
        assert_eq!(seen.state(), ParticleState::PendingDelete);
        assert_mirrored(&s, a);
    }

    #[test]
    fn managed_store_writes_no_mirror() {
        let mut issuer = SequentialIssuer::new();
        let mut s = store(NodeKind::Managed);
        let a = s.create(None, Some(particle(0.0)), &mut issuer);
        assert_eq!(s.native(a), None);
        assert!(s.native_ptr(a).is_null());
        assert_eq!(s.mirror().segment_count(), 0);
    }

    #[test]
    fn equality_by_payload_identity_then_id() {
        let mut issuer = SequentialIssuer::new();
        let mut s = store(NodeKind::Mirrored);
        let a = s.create(Some(ParticleId(1)), Some(particle(0.0)), &mut issuer);
        let b = s.create(Some(ParticleId(1)), Some(particle(0.0)), &mut issuer);
        let c = s.create(Some(ParticleId(1)), None, &mut issuer);
        let (na, nb, nc) = (s.get(a).unwrap(), s.get(b).unwrap(), s.get(c).unwrap());
        assert!(na.try_eq(&na).unwrap());
        assert!(!na.try_eq(&nb).unwrap());
        assert!(na.try_eq(&nc).unwrap());
        assert_eq!(na.try_cmp(&nb).unwrap(), Ordering::Equal);
    }

    #[test]
    fn comparing_kinds_fails() {
        let mut issuer = SequentialIssuer::new();
        let mut mirrored = store(NodeKind::Mirrored);
        let mut managed = store(NodeKind::Managed);
        let a = mirrored.create(None, None, &mut issuer);
        let b = managed.create(None, None, &mut issuer);
        let err = mirrored
            .get(a)
            .unwrap()
            .try_cmp(&managed.get(b).unwrap())
            .unwrap_err();
        assert_eq!(
            err,
            CollectionError::KindMismatch {
                left: NodeKind::Mirrored,
                right: NodeKind::Managed,
            }
        );
    }
}
