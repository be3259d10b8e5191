//! Strongly-typed identifiers.

use std::fmt;

use crate::error::CollectionError;

/// Globally unique identifier of a particle.
///
/// Issued by an [`IdIssuer`](crate::IdIssuer) or supplied by the caller
/// when re-materializing particles that were exported or removed earlier.
/// [`ParticleId::UNASSIGNED`] marks a particle that has not been given an
/// identifier yet; adding such a particle to a collection requests a
/// fresh one.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(pub u64);

impl ParticleId {
    /// Sentinel for "no identifier assigned yet".
    pub const UNASSIGNED: ParticleId = ParticleId(u64::MAX);

    /// Whether this is the [`UNASSIGNED`](Self::UNASSIGNED) sentinel.
    pub fn is_unassigned(self) -> bool {
        self == Self::UNASSIGNED
    }

    /// Validate an explicit, signed identifier supplied by a caller.
    ///
    /// Negative values are rejected with
    /// [`CollectionError::InvalidArgument`]. Every non-negative `i64` maps
    /// below the unassigned sentinel.
    pub fn from_explicit(value: i64) -> Result<Self, CollectionError> {
        if value < 0 {
            return Err(CollectionError::InvalidArgument {
                reason: format!("particle id must be non-negative, got {value}"),
            });
        }
        Ok(Self(value as u64))
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unassigned() {
            write!(f, "unassigned")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u64> for ParticleId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Rank of a cooperating worker process in a distributed run.
///
/// Rank 0 is the coordinator that computes partition assignments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerRank(pub u32);

impl WorkerRank {
    /// The coordinating worker.
    pub const COORDINATOR: WorkerRank = WorkerRank(0);

    /// Rank as a `usize` index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for WorkerRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for WorkerRank {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Slot + generation handle of a node inside a node store.
///
/// The slot index binds a node to its native mirror entry 1:1. The
/// generation makes keys of destroyed nodes detectably stale, so a key
/// kept past destruction resolves to nothing instead of a newer node
/// that reused the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeKey {
    slot: u32,
    generation: u32,
}

impl NodeKey {
    /// Build a key from its parts.
    pub fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Slot index inside the store (and the mirror table).
    pub fn slot(self) -> u32 {
        self.slot
    }

    /// Generation counter of the slot when this key was issued.
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Pack into a `u64`: upper 32 bits slot, lower 32 bits generation.
    pub fn to_bits(self) -> u64 {
        ((self.slot as u64) << 32) | (self.generation as u64)
    }

    /// Inverse of [`to_bits`](Self::to_bits).
    pub fn from_bits(bits: u64) -> Self {
        Self {
            slot: (bits >> 32) as u32,
            generation: bits as u32,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}
