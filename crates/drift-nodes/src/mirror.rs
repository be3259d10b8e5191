//! The native mirror: C-layout node shadows in address-stable segments.
//!
//! Compiled kernels walk the particle chain through [`NativeNode`]s
//! without calling back into Rust. Each entry lives in a fixed-capacity
//! segment that is allocated whole and never reallocated, so a pointer to
//! an entry stays valid for the lifetime of the table.
//!
//! ```text
//! MirrorTable
//! └── segments: Vec<Box<[Cell<NativeNode>]>>
//!     ├── [0]  slots 0 .. segment_len
//!     ├── [1]  slots segment_len .. 2*segment_len
//!     └── ...
//! ```
//!
//! Entries sit in `Cell`s so the table can hand out raw pointers from a
//! shared borrow and keep updating entries without invalidating them.

use std::cell::Cell;
use std::ffi::c_void;
use std::ptr;

/// C-layout shadow of a node.
///
/// All pointers are null when the corresponding link or payload is
/// absent. `worker_affinity` is `-1` when unassigned.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeNode {
    /// Mirror entry of the previous node.
    pub prev_ptr: *mut NativeNode,
    /// Mirror entry of the next node.
    pub next_ptr: *mut NativeNode,
    /// The node's [`Particle`](drift_core::Particle) payload.
    pub data_ptr: *mut c_void,
    /// Worker rank the particle is assigned to.
    pub worker_affinity: i32,
}

impl NativeNode {
    /// Entry of a node with no links and no payload.
    pub const EMPTY: NativeNode = NativeNode {
        prev_ptr: ptr::null_mut(),
        next_ptr: ptr::null_mut(),
        data_ptr: ptr::null_mut(),
        worker_affinity: -1,
    };

    /// Whether all three pointers are null.
    pub fn is_detached(&self) -> bool {
        self.prev_ptr.is_null() && self.next_ptr.is_null() && self.data_ptr.is_null()
    }
}

impl Default for NativeNode {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Segmented table of [`NativeNode`]s indexed by slab slot.
pub struct MirrorTable {
    segments: Vec<Box<[Cell<NativeNode>]>>,
    segment_len: usize,
    shift: u32,
}

// SAFETY: every pointer stored in the table refers either to another
// entry of this table or to a payload allocation owned by the same node
// store.
// Both move together with the table, and the table is only mutated
// through `&mut` of its owner, so handing it to another thread hands over
// everything its pointers can reach.
#[allow(unsafe_code)]
unsafe impl Send for MirrorTable {}

impl MirrorTable {
    /// Create an empty table. `segment_len` must be a power of two.
    pub fn new(segment_len: usize) -> Self {
        debug_assert!(segment_len.is_power_of_two());
        Self {
            segments: Vec::new(),
            segment_len,
            shift: segment_len.trailing_zeros(),
        }
    }

    fn locate(&self, slot: u32) -> (usize, usize) {
        let slot = slot as usize;
        (slot >> self.shift, slot & (self.segment_len - 1))
    }

    fn cell(&self, slot: u32) -> Option<&Cell<NativeNode>> {
        let (seg, off) = self.locate(slot);
        self.segments.get(seg).map(|s| &s[off])
    }

    /// Grow until `slot` has an entry. New entries start [`NativeNode::EMPTY`].
    pub fn ensure(&mut self, slot: u32) {
        let (seg, _) = self.locate(slot);
        while self.segments.len() <= seg {
            let segment: Box<[Cell<NativeNode>]> = (0..self.segment_len)
                .map(|_| Cell::new(NativeNode::EMPTY))
                .collect();
            self.segments.push(segment);
            log::debug!(
                "mirror grew to {} segments of {} entries",
                self.segments.len(),
                self.segment_len
            );
        }
    }

    /// Copy of the entry at `slot`.
    pub fn get(&self, slot: u32) -> Option<NativeNode> {
        self.cell(slot).map(Cell::get)
    }

    /// Overwrite the entry at `slot`. No-op if the slot has no entry.
    pub fn set(&self, slot: u32, entry: NativeNode) {
        if let Some(cell) = self.cell(slot) {
            cell.set(entry);
        }
    }

    /// Stable address of the entry at `slot`, or null if it has none.
    pub fn entry_ptr(&self, slot: u32) -> *mut NativeNode {
        self.cell(slot).map_or(ptr::null_mut(), Cell::as_ptr)
    }

    /// Number of entries per segment.
    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    /// Number of allocated segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Total number of entries across all segments.
    pub fn capacity(&self) -> usize {
        self.segments.len() * self.segment_len
    }

    /// Base address of every segment, in slot order.
    ///
    /// Each segment holds [`segment_len`](Self::segment_len) contiguous
    /// entries.
    pub fn segment_ptrs(&self) -> Vec<*mut NativeNode> {
        self.segments
            .iter()
            .map(|s| Cell::as_ptr(&s[0]))
            .collect()
    }

    /// Reset every entry to [`NativeNode::EMPTY`], keeping the segments.
    pub fn reset(&self) {
        for segment in &self.segments {
            for cell in segment.iter() {
                cell.set(NativeNode::EMPTY);
            }
        }
    }
}
