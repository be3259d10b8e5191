//! Positional index over a node chain.

use drift_core::{CollectionError, NodeKey, ParticleId};

/// Ordered sequence of node keys with positional access.
///
/// Keeps only positional bookkeeping; linking nodes into the chain is the
/// owner's job. Positions follow insertion, and [`insert_sorted`] places
/// each key at the bisect-right position of its identifier, so for
/// identifiers issued in increasing order positional order and identifier
/// order coincide. Other workloads get no ordering guarantee.
///
/// [`insert_sorted`]: LinkedParticleList::insert_sorted
#[derive(Clone, Debug, Default)]
pub struct LinkedParticleList {
    entries: Vec<(ParticleId, NodeKey)>,
}

impl LinkedParticleList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key` after every entry whose identifier is `<= id`.
    ///
    /// Returns the position the key landed at.
    pub fn insert_sorted(&mut self, id: ParticleId, key: NodeKey) -> usize {
        let pos = self.entries.partition_point(|&(other, _)| other <= id);
        self.entries.insert(pos, (id, key));
        pos
    }

    /// Position of `key`, by identity.
    pub fn index_of(&self, key: NodeKey) -> Option<usize> {
        self.entries.iter().position(|&(_, k)| k == key)
    }

    /// Position of the entry with identifier `id`.
    ///
    /// Binary search first; falls back to a scan when the entries are not
    /// sorted around `id`.
    pub fn index_of_id(&self, id: ParticleId) -> Option<usize> {
        let pos = self.entries.partition_point(|&(other, _)| other < id);
        if self.entries.get(pos).is_some_and(|&(other, _)| other == id) {
            return Some(pos);
        }
        self.entries.iter().position(|&(other, _)| other == id)
    }

    /// Remove `key`, returning the position it occupied.
    pub fn remove(&mut self, key: NodeKey) -> Option<usize> {
        let pos = self.index_of(key)?;
        self.entries.remove(pos);
        Some(pos)
    }

    /// Remove the entry at `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<NodeKey, CollectionError> {
        if index >= self.entries.len() {
            return Err(self.out_of_range(index));
        }
        Ok(self.entries.remove(index).1)
    }

    /// Key at `index`.
    pub fn by_position(&self, index: usize) -> Result<NodeKey, CollectionError> {
        self.get(index).ok_or_else(|| self.out_of_range(index))
    }

    /// Key at `index`, or `None`.
    pub fn get(&self, index: usize) -> Option<NodeKey> {
        self.entries.get(index).map(|&(_, k)| k)
    }

    /// Identifier recorded at `index`.
    pub fn id_at(&self, index: usize) -> Option<ParticleId> {
        self.entries.get(index).map(|&(id, _)| id)
    }

    /// First key.
    pub fn first(&self) -> Option<NodeKey> {
        self.get(0)
    }

    /// Last key.
    pub fn last(&self) -> Option<NodeKey> {
        self.entries.last().map(|&(_, k)| k)
    }

    /// Number of positions, including soft-deleted nodes not yet compacted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in positional order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = NodeKey> + ExactSizeIterator + '_ {
        self.entries.iter().map(|&(_, k)| k)
    }

    /// Keep only the keys for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(NodeKey) -> bool) {
        self.entries.retain(|&(_, k)| keep(k));
    }

    /// Drop every position.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn out_of_range(&self, index: usize) -> CollectionError {
        CollectionError::IndexOutOfRange {
            index: index as i64,
            len: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(slot: u32) -> NodeKey {
        NodeKey::new(slot, 0)
    }

    #[test]
    fn ascending_ids_append() {
        let mut list = LinkedParticleList::new();
        for i in 0..5 {
            assert_eq!(list.insert_sorted(ParticleId(i), key(i as u32)), i as usize);
        }
        assert_eq!(list.len(), 5);
        assert_eq!(list.by_position(3).unwrap(), key(3));
    }

    #[test]
    fn bisect_right_places_duplicates_after() {
        let mut list = LinkedParticleList::new();
        list.insert_sorted(ParticleId(1), key(0));
        list.insert_sorted(ParticleId(3), key(1));
        assert_eq!(list.insert_sorted(ParticleId(1), key(2)), 1);
        assert_eq!(list.insert_sorted(ParticleId(2), key(3)), 2);
        let order: Vec<_> = list.keys().collect();
        assert_eq!(order, vec![key(0), key(2), key(3), key(1)]);
    }

    #[test]
    fn out_of_range_position_errors() {
        let mut list = LinkedParticleList::new();
        list.insert_sorted(ParticleId(0), key(0));
        assert_eq!(
            list.by_position(1),
            Err(CollectionError::IndexOutOfRange { index: 1, len: 1 })
        );
        assert!(list.remove_at(5).is_err());
        assert_eq!(list.get(1), None);
    }

    #[test]
    fn remove_by_identity() {
        let mut list = LinkedParticleList::new();
        for i in 0..3 {
            list.insert_sorted(ParticleId(i), key(i as u32));
        }
        assert_eq!(list.remove(key(1)), Some(1));
        assert_eq!(list.remove(key(1)), None);
        assert_eq!(list.index_of(key(2)), Some(1));
    }

    #[test]
    fn index_of_id_finds_sorted_and_unsorted() {
        let mut list = LinkedParticleList::new();
        for i in [10u64, 20, 30] {
            list.insert_sorted(ParticleId(i), key(i as u32));
        }
        assert_eq!(list.index_of_id(ParticleId(20)), Some(1));
        assert_eq!(list.index_of_id(ParticleId(25)), None);
    }
}
