//! The public particle collection.
//!
//! [`ParticleCollection`] ties together the node store (nodes and their
//! native mirror), the positional list, an identifier index, the injected
//! identifier issuer and, in distributed runs, the partitioner and the
//! communicator.
//!
//! # Lifecycle
//!
//! ```text
//! add ──▶ Active ──delete──▶ PendingDelete ──compact──▶ Destroyed
//!            └──────────────remove / pop─────────────────▶ Destroyed
//! ```
//!
//! Soft-deleted particles stay linked, and counted by [`len`], until
//! [`compact`] sweeps them. Traversal, [`begin`]/[`end`] and export skip
//! them.
//!
//! [`len`]: ParticleCollection::len
//! [`compact`]: ParticleCollection::compact
//! [`begin`]: ParticleCollection::begin
//! [`end`]: ParticleCollection::end

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use drift_core::{
    CollectionError, ConfigError, IdIssuer, NodeKey, NodeKind, Particle, ParticleId,
    ParticleState, WorkerRank,
};
use drift_nodes::{LinkedParticleList, MirrorTable, NativeNode, NodeRef, NodeStore};

use crate::comm::{self, Communicator, Packet, SoloComm};
use crate::config::CollectionConfig;
use crate::export::{
    has_started, in_write_window, Column, WriteBatch, WriteSelection, WriteState, WriteStatus,
};
use crate::init::ParticleInit;
use crate::iter::{Iter, Nodes};
use crate::partition::{check_enough, Partitioner};

/// Ordered, identifier-indexed particle set with a native mirror.
///
/// Single-threaded: every mutation takes `&mut self`, so no kernel pass
/// over the mirror can overlap one. Changing a particle's `id` through
/// mutable access is not supported.
pub struct ParticleCollection {
    store: NodeStore,
    list: LinkedParticleList,
    index: BTreeMap<ParticleId, NodeKey>,
    issuer: Box<dyn IdIssuer>,
    comm: Box<dyn Communicator>,
    partition: Option<Partitioner>,
    config: CollectionConfig,
    rng: ChaCha8Rng,
}

impl ParticleCollection {
    // ── Construction ───────────────────────────────────────────────

    /// Empty, non-distributed collection.
    pub fn new(config: CollectionConfig, issuer: Box<dyn IdIssuer>) -> Result<Self, ConfigError> {
        Self::with_comm(config, issuer, Box::new(SoloComm))
    }

    /// Empty collection bound to a worker group.
    ///
    /// No partitioner exists until [`from_init`](Self::from_init) builds
    /// one, so particles added here stay local.
    pub fn with_comm(
        config: CollectionConfig,
        issuer: Box<dyn IdIssuer>,
        comm: Box<dyn Communicator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = NodeStore::new(config.store.clone(), config.seed)?;
        Ok(Self {
            store,
            list: LinkedParticleList::new(),
            index: BTreeMap::new(),
            issuer,
            comm,
            partition: None,
            rng: ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1)),
            config,
        })
    }

    /// Build a collection from parallel arrays.
    ///
    /// In a group of more than one worker, particles are partitioned
    /// (by the supplied labels, or by k-means on the coordinator) and each
    /// worker keeps only its own. When explicit identifiers are given, the
    /// issuer is rebased past the largest one across all workers. Every
    /// worker of the group must call this with the same input.
    pub fn from_init(
        config: CollectionConfig,
        issuer: Box<dyn IdIssuer>,
        comm: Box<dyn Communicator>,
        init: ParticleInit,
    ) -> Result<Self, CollectionError> {
        init.validate(&config)?;
        let ids = init
            .ids
            .as_ref()
            .map(|raw| {
                raw.iter()
                    .map(|&v| ParticleId::from_explicit(v))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let mut coll = Self::with_comm(config, issuer, comm)?;
        let n = init.len();
        let workers = coll.comm.size();
        let points = init.points();
        // Checked on every worker before any exchange, so all of them fail
        // together whether or not labels were supplied.
        if workers > 1 {
            check_enough(n, workers)?;
        }
        let partition = match &init.partitions {
            Some(labels) => Some(Partitioner::from_labels(&points, labels, workers)?),
            None if workers > 1 => Some(coll.initial_partition(&points)?),
            None => None,
        };

        let rank = coll.comm.rank();
        let owned: Vec<bool> = match &partition {
            Some(p) => p.labels().iter().map(|&l| l == rank.0).collect(),
            None => vec![true; n],
        };
        coll.partition = partition;

        let mut local_max = -1i64;
        for i in (0..n).filter(|&i| owned[i]) {
            let mut particle = Particle::new(init.lon[i], init.lat[i], init.depth[i], init.time[i])
                .with_dt(init.dt)
                .with_variables(init.variables_at(&coll.config, i));
            if let Some(ids) = &ids {
                particle.id = ids[i];
                local_max = local_max.max(ids[i].0 as i64);
            }
            coll.insert_local(particle)?;
        }

        let max = coll.comm.all_reduce_max(local_max)?;
        if max >= 0 {
            coll.issuer.set_next(ParticleId(max as u64 + 1));
        }
        log::info!(
            "worker {rank} holds {} of {n} initial particles",
            coll.list.len()
        );
        Ok(coll)
    }

    fn initial_partition(&mut self, points: &[[f64; 2]]) -> Result<Partitioner, CollectionError> {
        let workers = self.comm.size();
        let root = WorkerRank::COORDINATOR;
        let packet = if self.comm.rank() == root {
            let p = Partitioner::initial(points, workers, self.config.kmeans_max_iter, &mut self.rng)?;
            log::info!("partitioned {} particles across {workers} workers", points.len());
            Some(Packet::Assignment {
                labels: p.labels().to_vec(),
                centers: p.centers().to_vec(),
            })
        } else {
            None
        };
        match self.comm.broadcast(packet, root)? {
            Packet::Assignment { labels, centers } => {
                Ok(Partitioner::from_assignment(labels, centers, workers))
            }
            other => Err(comm::unexpected("assignment", &other)),
        }
    }

    // ── Introspection ──────────────────────────────────────────────

    /// The configuration this collection was built with.
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Number of positions, including soft-deleted particles not yet
    /// compacted.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the collection holds no particles at all.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Number of particles traversal would visit.
    pub fn active_count(&self) -> usize {
        self.nodes().count()
    }

    /// Node kind of every node.
    pub fn kind(&self) -> NodeKind {
        self.store.kind()
    }

    /// This worker's rank.
    pub fn rank(&self) -> WorkerRank {
        self.comm.rank()
    }

    /// The partitioner, in distributed runs.
    pub fn partitioner(&self) -> Option<&Partitioner> {
        self.partition.as_ref()
    }

    /// The identifier issuer.
    pub fn issuer(&self) -> &dyn IdIssuer {
        &*self.issuer
    }

    // ── Traversal ──────────────────────────────────────────────────

    /// First node that is not soft-deleted.
    pub fn begin(&self) -> Option<NodeRef<'_>> {
        self.nodes().next()
    }

    /// Last node that is not soft-deleted.
    pub fn end(&self) -> Option<NodeRef<'_>> {
        self.nodes().next_back()
    }

    /// Valid nodes in chain order.
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes::new(&self.store, self.list.first(), self.list.last())
    }

    /// Valid particles in chain order.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self.nodes())
    }

    /// Copies of all valid particles.
    pub fn to_vec(&self) -> Vec<Particle> {
        self.iter().cloned().collect()
    }

    // ── Lookup ─────────────────────────────────────────────────────

    /// Payload at a position, soft-deleted or not.
    pub fn get_by_index(&self, index: usize) -> Option<&Particle> {
        self.store.particle(self.list.get(index)?)
    }

    /// Mutable payload at a position.
    pub fn get_by_index_mut(&mut self, index: usize) -> Option<&mut Particle> {
        let key = self.list.get(index)?;
        self.store.particle_mut(key)
    }

    /// Payload with identifier `id`.
    pub fn get_by_id(&self, id: ParticleId) -> Option<&Particle> {
        self.store.particle(*self.index.get(&id)?)
    }

    /// Mutable payload with identifier `id`.
    pub fn get_by_id_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        let key = *self.index.get(&id)?;
        self.store.particle_mut(key)
    }

    /// Node at a position.
    pub fn get_node_by_index(&self, index: usize) -> Option<NodeRef<'_>> {
        self.store.get(self.list.get(index)?)
    }

    /// Node carrying identifier `id`.
    pub fn get_node_by_id(&self, id: ParticleId) -> Option<NodeRef<'_>> {
        self.store.get(*self.index.get(&id)?)
    }

    /// Payloads at several positions; misses are `None`.
    pub fn get_multi_by_indices(&self, indices: &[usize]) -> Vec<Option<&Particle>> {
        indices.iter().map(|&i| self.get_by_index(i)).collect()
    }

    /// Payloads for several identifiers; misses are `None`.
    pub fn get_multi_by_ids(&self, ids: &[ParticleId]) -> Vec<Option<&Particle>> {
        ids.iter().map(|&id| self.get_by_id(id)).collect()
    }

    /// Valid particles of this collection whose identifiers are live in
    /// `other`.
    pub fn get_same(&self, other: &ParticleCollection) -> Vec<&Particle> {
        self.iter()
            .filter(|p| other.index.contains_key(&p.id))
            .collect()
    }

    /// Position of the particle with identifier `id`.
    pub fn index_of_id(&self, id: ParticleId) -> Option<usize> {
        if !self.index.contains_key(&id) {
            return None;
        }
        self.list.index_of_id(id)
    }

    /// Position of a node.
    pub fn index_of_node(&self, key: NodeKey) -> Option<usize> {
        self.list.index_of(key)
    }

    /// Positions of soft-deleted particles.
    pub fn deleted_indices(&self) -> Vec<usize> {
        self.list
            .keys()
            .enumerate()
            .filter(|&(_, k)| self.is_pending(k))
            .map(|(i, _)| i)
            .collect()
    }

    /// Identifiers of soft-deleted particles.
    pub fn deleted_ids(&self) -> Vec<ParticleId> {
        self.list
            .keys()
            .filter(|&k| self.is_pending(k))
            .filter_map(|k| self.store.id(k))
            .collect()
    }

    fn is_pending(&self, key: NodeKey) -> bool {
        self.store
            .particle(key)
            .is_some_and(Particle::is_pending_delete)
    }

    /// One variable across all valid particles, in chain order.
    pub fn variable(&self, name: &str) -> Result<Vec<f64>, ConfigError> {
        if !self.config.knows_variable(name) {
            return Err(ConfigError::UnknownVariable {
                name: name.to_string(),
            });
        }
        let rows = self.valid_rows();
        Ok(match self.column(name, &rows) {
            Some(Column::Float(v)) => v,
            Some(Column::Int(v)) => v.into_iter().map(|x| x as f64).collect(),
            None => Vec::new(),
        })
    }

    // ── Insertion ──────────────────────────────────────────────────

    /// Add one particle.
    ///
    /// [`ParticleId::UNASSIGNED`] requests a fresh identifier. In a
    /// partitioned run this is a collective call: the coordinator assigns
    /// the particle to a worker and only that worker stores it. Returns
    /// the position the particle landed at, or `None` if another worker
    /// owns it.
    pub fn add_single(&mut self, particle: Particle) -> Result<Option<usize>, CollectionError> {
        Ok(self.add_multiple(vec![particle])?.pop().flatten())
    }

    /// Add many particles with a single assignment round.
    ///
    /// Positions are as of each insertion; later insertions may shift
    /// them.
    pub fn add_multiple(
        &mut self,
        particles: Vec<Particle>,
    ) -> Result<Vec<Option<usize>>, CollectionError> {
        let points: Vec<[f64; 2]> = particles.iter().map(Particle::lon_lat).collect();
        let labels = self.assign_round(&points)?;
        let rank = self.comm.rank().0;
        let mut placed = Vec::with_capacity(particles.len());
        for (i, particle) in particles.into_iter().enumerate() {
            let mine = labels.as_ref().is_none_or(|l| l[i] == rank);
            placed.push(if mine {
                Some(self.insert_local(particle)?)
            } else {
                None
            });
        }
        Ok(placed)
    }

    /// Add copies of every valid particle of `other`, keeping their
    /// identifiers.
    pub fn add_same(
        &mut self,
        other: &ParticleCollection,
    ) -> Result<Vec<Option<usize>>, CollectionError> {
        let mut copies = other.to_vec();
        for p in &mut copies {
            p.set_state(ParticleState::Active);
        }
        self.add_multiple(copies)
    }

    fn assign_round(&mut self, points: &[[f64; 2]]) -> Result<Option<Vec<u32>>, CollectionError> {
        let Some(partition) = self.partition.as_mut() else {
            return Ok(None);
        };
        let root = WorkerRank::COORDINATOR;
        let is_root = self.comm.rank() == root;
        let packet = if is_root {
            let labels = points.iter().map(|&p| partition.assign(p)).collect();
            Some(Packet::Assignment {
                labels,
                centers: partition.centers().to_vec(),
            })
        } else {
            None
        };
        match self.comm.broadcast(packet, root)? {
            Packet::Assignment { labels, centers } => {
                if !is_root {
                    partition.apply(&labels, centers);
                }
                log::debug!("assigned {} particles to workers", labels.len());
                Ok(Some(labels))
            }
            other => Err(comm::unexpected("assignment", &other)),
        }
    }

    fn insert_local(&mut self, mut particle: Particle) -> Result<usize, CollectionError> {
        let fresh = particle.id.is_unassigned();
        let id = if fresh {
            self.issuer
                .next_id(particle.lon, particle.lat, particle.depth, particle.time)
        } else {
            particle.id
        };
        if self.index.contains_key(&id) {
            if fresh {
                self.issuer.release_id(id);
            }
            return Err(CollectionError::InvalidArgument {
                reason: format!("particle id {id} is already live"),
            });
        }
        if !fresh {
            // Fresh identifiers must never collide with explicit ones.
            self.issuer.set_next(ParticleId(id.0.saturating_add(1)));
        }
        if particle.variables.len() < self.config.variables.len() {
            particle.variables.resize(self.config.variables.len(), 0.0);
        }
        particle.set_state(ParticleState::Active);

        let key = self.store.create(Some(id), Some(particle), &mut *self.issuer);
        let pos = self.list.insert_sorted(id, key);
        let prev = pos.checked_sub(1).and_then(|i| self.list.get(i));
        let next = self.list.get(pos + 1);
        self.store.insert_between(key, prev, next);
        self.store.set_affinity(key, self.comm.rank().0 as i32);
        self.index.insert(id, key);
        Ok(pos)
    }

    // ── Soft deletion ──────────────────────────────────────────────

    /// Mark the particle at a position for deletion.
    pub fn delete_by_index(&mut self, index: usize) -> Result<(), CollectionError> {
        let key = self.list.by_position(index)?;
        if let Some(p) = self.store.particle_mut(key) {
            p.set_state(ParticleState::PendingDelete);
        }
        Ok(())
    }

    /// Mark the particle with identifier `id` for deletion.
    ///
    /// Returns whether such a particle exists.
    pub fn delete_by_id(&mut self, id: ParticleId) -> bool {
        match self.get_by_id_mut(id) {
            Some(p) => {
                p.set_state(ParticleState::PendingDelete);
                true
            }
            None => false,
        }
    }

    /// Physically remove every soft-deleted particle.
    ///
    /// Returns how many were removed. Idempotent.
    pub fn compact(&mut self) -> usize {
        let doomed: Vec<NodeKey> = self.list.keys().filter(|&k| self.is_pending(k)).collect();
        let removed = self.detach_many(&doomed).len();
        if removed > 0 {
            log::debug!(
                "compacted {removed} soft-deleted particles, {} remain",
                self.list.len()
            );
        }
        removed
    }

    /// Alias of [`compact`](Self::compact).
    pub fn remove_deleted(&mut self) -> usize {
        self.compact()
    }

    // ── Physical removal ───────────────────────────────────────────

    /// Remove the particle at a position and return it.
    pub fn remove_single_by_index(&mut self, index: usize) -> Result<Particle, CollectionError> {
        let key = self.list.by_position(index)?;
        self.detach(key).ok_or(CollectionError::IndexOutOfRange {
            index: index as i64,
            len: self.list.len(),
        })
    }

    /// Remove the particle with identifier `id` and return it.
    pub fn remove_single_by_id(&mut self, id: ParticleId) -> Option<Particle> {
        let key = *self.index.get(&id)?;
        self.detach(key)
    }

    /// Remove the stored particle matching `particle`'s identifier.
    pub fn remove_single_by_object(&mut self, particle: &Particle) -> Option<Particle> {
        self.remove_single_by_id(particle.id)
    }

    /// Remove the particle carried by a node.
    pub fn remove_single_by_node(&mut self, key: NodeKey) -> Option<Particle> {
        if self.list.index_of(key).is_none() {
            return None;
        }
        self.detach(key)
    }

    /// Remove every particle whose identifier is in `ids`, in one forward
    /// pass. Returns how many were removed.
    ///
    /// Soft-deleted particles are skipped and stay pending until
    /// [`compact`](Self::compact).
    pub fn remove_multi_by_ids(&mut self, ids: &[ParticleId]) -> usize {
        let wanted: BTreeSet<ParticleId> = ids.iter().copied().collect();
        let keys: Vec<NodeKey> = self
            .list
            .keys()
            .filter(|&k| {
                self.store
                    .particle(k)
                    .is_some_and(|p| p.is_valid() && wanted.contains(&p.id))
            })
            .collect();
        self.detach_many(&keys).len()
    }

    /// Remove the particles at several positions.
    ///
    /// All positions refer to the collection before any removal. Fails
    /// without removing anything if one is out of range.
    pub fn remove_multi_by_indices(&mut self, indices: &[usize]) -> Result<usize, CollectionError> {
        let keys = indices
            .iter()
            .map(|&i| self.list.by_position(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.detach_many(&keys).len())
    }

    /// Remove every particle whose identifier is live in `other`.
    ///
    /// Soft-deleted particles of this collection are left for
    /// [`compact`](Self::compact).
    pub fn remove_same(&mut self, other: &ParticleCollection) -> usize {
        let ids: Vec<ParticleId> = other.index.keys().copied().collect();
        self.remove_multi_by_ids(&ids)
    }

    // ── Pop ────────────────────────────────────────────────────────

    /// Remove and return the particle at `index`.
    ///
    /// Negative indices count from the end; `None` pops the last particle.
    pub fn pop_single_by_index(&mut self, index: Option<i64>) -> Result<Particle, CollectionError> {
        let pos = self.resolve(index.unwrap_or(-1))?;
        self.remove_single_by_index(pos)
    }

    /// Remove and return the particle with identifier `id`.
    pub fn pop_single_by_id(&mut self, id: ParticleId) -> Option<Particle> {
        self.remove_single_by_id(id)
    }

    /// Remove and return the particles at several positions, in the order
    /// given. Negative indices count from the end.
    ///
    /// Every position refers to the collection before any removal, so a
    /// repeated position removes its particle once.
    pub fn pop_multi_by_indices(&mut self, indices: &[i64]) -> Result<Vec<Particle>, CollectionError> {
        let keys = indices
            .iter()
            .map(|&i| self.resolve(i).and_then(|pos| self.list.by_position(pos)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.detach_many(&keys))
    }

    /// Remove and return the particles with the given identifiers, in the
    /// order given. Unknown identifiers are skipped.
    pub fn pop_multi_by_ids(&mut self, ids: &[ParticleId]) -> Vec<Particle> {
        let keys: Vec<NodeKey> = ids.iter().filter_map(|id| self.index.get(id).copied()).collect();
        self.detach_many(&keys)
    }

    fn resolve(&self, index: i64) -> Result<usize, CollectionError> {
        let len = self.list.len() as i64;
        let pos = if index < 0 { len + index } else { index };
        if pos < 0 || pos >= len {
            return Err(CollectionError::IndexOutOfRange {
                index,
                len: self.list.len(),
            });
        }
        Ok(pos as usize)
    }

    fn detach(&mut self, key: NodeKey) -> Option<Particle> {
        let id = self.store.id(key)?;
        self.list.remove(key);
        if self.index.get(&id) == Some(&key) {
            self.index.remove(&id);
        }
        self.store.destroy(key, &mut *self.issuer)
    }

    fn detach_many(&mut self, keys: &[NodeKey]) -> Vec<Particle> {
        if keys.is_empty() {
            return Vec::new();
        }
        let doomed: HashSet<NodeKey> = keys.iter().copied().collect();
        self.list.retain(|k| !doomed.contains(&k));
        let mut removed = Vec::with_capacity(keys.len());
        for &key in keys {
            if let Some(id) = self.store.id(key) {
                if self.index.get(&id) == Some(&key) {
                    self.index.remove(&id);
                }
            }
            if let Some(p) = self.store.destroy(key, &mut *self.issuer) {
                removed.push(p);
            }
        }
        removed
    }

    // ── Whole-collection operations ────────────────────────────────

    /// Destroy every node, releasing all identifiers.
    pub fn clear(&mut self) {
        let mut cursor = self.list.first();
        while let Some(key) = cursor {
            cursor = self.store.next(key);
            self.store.destroy(key, &mut *self.issuer);
        }
        self.list.clear();
        self.index.clear();
    }

    /// Merge with another collection. Not implemented.
    pub fn merge(&mut self, _other: Option<&mut ParticleCollection>) -> Result<(), CollectionError> {
        Err(CollectionError::NotImplemented { operation: "merge" })
    }

    /// Split off part of this collection. Not implemented.
    pub fn split(&mut self, _indices: Option<&[usize]>) -> Result<ParticleCollection, CollectionError> {
        Err(CollectionError::NotImplemented { operation: "split" })
    }

    /// Live particle count of every worker, delivered to the coordinator.
    ///
    /// Collective call. Returns `None` on non-coordinating workers.
    pub fn worker_counts(&self) -> Result<Option<Vec<usize>>, CollectionError> {
        let gathered = self.comm.gather(
            Packet::Value(self.active_count() as i64),
            WorkerRank::COORDINATOR,
        )?;
        gathered
            .map(|all| {
                all.into_iter()
                    .map(|p| p.into_value().map(|v| v as usize))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
    }

    // ── Native access ──────────────────────────────────────────────

    /// Mirror entry of the first node in the chain, or null.
    ///
    /// Soft-deleted nodes are part of the native chain; kernels check
    /// the payload state themselves.
    pub fn native_head(&self) -> *mut NativeNode {
        self.list
            .first()
            .map_or(std::ptr::null_mut(), |k| self.store.native_ptr(k))
    }

    /// Mirror entry of the node at a position.
    pub fn native_ptr(&self, index: usize) -> Option<*mut NativeNode> {
        let ptr = self.store.native_ptr(self.list.get(index)?);
        (!ptr.is_null()).then_some(ptr)
    }

    /// The segmented mirror table.
    pub fn native_table(&self) -> &MirrorTable {
        self.store.mirror()
    }

    /// The underlying node store.
    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    // ── Export ─────────────────────────────────────────────────────

    /// Columns to write for output time `time`.
    ///
    /// Skipped entirely when `time` was the last regular write, or when
    /// the writer only writes on delete and this is a regular write.
    pub fn to_write_batch(
        &self,
        time: f64,
        state: &mut WriteState,
        selection: &WriteSelection,
    ) -> WriteBatch {
        let mut batch = WriteBatch::default();
        let deleted_write = selection.is_deleted_write();
        if state.last_time_written == Some(time) || (state.write_ondelete && !deleted_write) {
            return batch;
        }

        if self.list.is_empty() {
            log::warn!("particle collection is empty on write at time {time}");
        } else {
            let rows = self.select_rows(time, selection);
            if let Some(&max) = rows.iter().max() {
                for name in &state.var_names {
                    match self.column(name, &rows) {
                        Some(column) => {
                            batch.columns.insert(name.clone(), column);
                        }
                        None => log::warn!("skipping unknown output variable '{name}'"),
                    }
                }
                state.max_index_written = Some(state.max_index_written.map_or(max, |m| m.max(max)));
            }

            let mismatched = rows
                .iter()
                .filter_map(|&i| self.get_by_index(i))
                .filter(|p| {
                    !p.is_pending_delete() && p.time.is_finite() && (time - p.time).abs() > 1e-3
                })
                .count();
            if mismatched > 0 {
                log::warn!("output time is {time}, but {mismatched} particles have a different time");
            }

            if !state.time_written.contains(&time) {
                state.time_written.push(time);
            }

            if !state.var_names_once.is_empty() {
                let first: Vec<usize> = self
                    .list
                    .keys()
                    .enumerate()
                    .filter_map(|(i, k)| self.store.particle(k).map(|p| (i, p)))
                    .filter(|(_, p)| {
                        p.is_valid()
                            && !state.written_once.contains(&p.id)
                            && has_started(p.time, p.dt, time)
                    })
                    .map(|(i, _)| i)
                    .collect();
                if !first.is_empty() {
                    for name in ["id", "index"].into_iter().chain(state.var_names_once.iter().map(String::as_str)) {
                        if let Some(column) = self.column(name, &first) {
                            batch.once.insert(name.to_string(), column);
                        }
                    }
                    state
                        .written_once
                        .extend(first.iter().filter_map(|&i| self.list.id_at(i)));
                }
            }
        }

        if !deleted_write {
            state.last_time_written = Some(time);
        }
        batch
    }

    /// Set how often a variable is written.
    pub fn set_variable_write_status(
        &self,
        state: &mut WriteState,
        name: &str,
        status: WriteStatus,
    ) -> Result<(), ConfigError> {
        state.set_write_status(name, status, |n| self.config.knows_variable(n))
    }

    fn select_rows(&self, time: f64, selection: &WriteSelection) -> Vec<usize> {
        match selection {
            WriteSelection::Active => self
                .list
                .keys()
                .enumerate()
                .filter(|&(_, k)| {
                    self.store.particle(k).is_some_and(|p| {
                        p.is_valid() && in_write_window(p.time, p.dt, time)
                    })
                })
                .map(|(i, _)| i)
                .collect(),
            WriteSelection::DeletedOnly => self.deleted_indices(),
            WriteSelection::Indices(indices) => indices
                .iter()
                .copied()
                .filter(|&i| i < self.list.len())
                .collect(),
            WriteSelection::Ids(ids) => ids.iter().filter_map(|&id| self.index_of_id(id)).collect(),
        }
    }

    fn valid_rows(&self) -> Vec<usize> {
        self.list
            .keys()
            .enumerate()
            .filter(|&(_, k)| self.store.particle(k).is_some_and(Particle::is_valid))
            .map(|(i, _)| i)
            .collect()
    }

    fn column(&self, name: &str, rows: &[usize]) -> Option<Column> {
        let particles = move || rows.iter().filter_map(move |&i| self.get_by_index(i));
        match name {
            "id" => Some(Column::Int(particles().map(|p| p.id.0 as i64).collect())),
            "index" => Some(Column::Int(rows.iter().map(|&i| i as i64).collect())),
            "state" => Some(Column::Int(
                particles().map(|p| p.state_code() as i64).collect(),
            )),
            "lon" => Some(Column::Float(particles().map(|p| p.lon).collect())),
            "lat" => Some(Column::Float(particles().map(|p| p.lat).collect())),
            "depth" => Some(Column::Float(particles().map(|p| p.depth).collect())),
            "time" => Some(Column::Float(particles().map(|p| p.time).collect())),
            "dt" => Some(Column::Float(particles().map(|p| p.dt).collect())),
            other => {
                let slot = self.config.variable_index(other)?;
                Some(Column::Float(
                    particles()
                        .map(|p| p.variables.get(slot).copied().unwrap_or(0.0))
                        .collect(),
                ))
            }
        }
    }
}

impl<'a> IntoIterator for &'a ParticleCollection {
    type Item = &'a Particle;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Drop for ParticleCollection {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for ParticleCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleCollection")
            .field("len", &self.list.len())
            .field("kind", &self.store.kind())
            .field("rank", &self.comm.rank())
            .field("workers", &self.comm.size())
            .field("partitioned", &self.partition.is_some())
            .finish()
    }
}
