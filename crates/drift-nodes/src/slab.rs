//! Generational slab keyed by [`NodeKey`].
//!
//! Destroyed entries leave their slot with a bumped generation, so keys
//! held past destruction resolve to `None` instead of whatever reused the
//! slot. Double-remove is a safe no-op.

use drift_core::NodeKey;

struct Slot<T> {
    generation: u32,
    data: Option<T>,
}

/// Slot+generation storage reusing slots through a free list.
///
/// Slot indices are dense and stable for an entry's lifetime, which is what
/// lets the node store bind each node to the mirror entry with the same
/// index.
pub struct Slab<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
}

impl<T> Slab<T> {
    /// Create an empty slab.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Insert a value and return its key.
    pub fn insert(&mut self, value: T) -> NodeKey {
        self.len += 1;
        if let Some(slot_idx) = self.free_list.pop() {
            let slot = &mut self.slots[slot_idx as usize];
            slot.data = Some(value);
            NodeKey::new(slot_idx, slot.generation)
        } else {
            let slot_idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                data: Some(value),
            });
            NodeKey::new(slot_idx, 0)
        }
    }

    /// Shared access to the value behind a key.
    ///
    /// Returns `None` if the key is stale or was never issued.
    pub fn get(&self, key: NodeKey) -> Option<&T> {
        let slot = self.slots.get(key.slot() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.data.as_ref()
    }

    /// Mutable access to the value behind a key.
    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut T> {
        let slot = self.slots.get_mut(key.slot() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.data.as_mut()
    }

    /// Whether `key` resolves to a live value.
    pub fn contains(&self, key: NodeKey) -> bool {
        self.get(key).is_some()
    }

    /// Remove the value behind a key, returning it.
    ///
    /// Bumps the slot's generation. A slot whose generation wraps to zero
    /// is retired for good instead of going back on the free list, since
    /// keys from its first epoch would otherwise resolve again.
    pub fn remove(&mut self, key: NodeKey) -> Option<T> {
        let slot_idx = key.slot();
        let slot = self.slots.get_mut(slot_idx as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        let value = slot.data.take()?;
        self.len -= 1;
        slot.generation = slot.generation.wrapping_add(1);
        if slot.generation != 0 {
            self.free_list.push(slot_idx);
        } else {
            log::debug!("retiring slab slot {slot_idx} after generation wrap");
        }
        Some(value)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no values are live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever allocated, live or not.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Iterate live `(key, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &T)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.data
                .as_ref()
                .map(|v| (NodeKey::new(idx as u32, slot.generation), v))
        })
    }
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}
