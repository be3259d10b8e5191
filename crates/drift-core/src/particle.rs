//! The particle record and its lifecycle state.
//!
//! [`Particle`] is `#[repr(C)]` up to and including `state`, so native
//! kernels handed a `data_ptr` through the mirror can read and write the
//! physical fields directly. Extra user variables follow the fixed prefix
//! and are only reachable from Rust.

use smallvec::SmallVec;

use crate::id::ParticleId;

/// Values of the user-defined extra variables, in registration order.
///
/// Inline up to four variables, which covers the common cases (age,
/// beaching flag, temperature samples) without a heap allocation.
pub type Variables = SmallVec<[f64; 4]>;

/// Lifecycle of a particle's membership in a collection.
///
/// ```text
/// Active --soft delete--> PendingDelete --compact--> Destroyed
/// Active --physical remove-----------------------> Destroyed
/// ```
///
/// No transition leaves `Destroyed` for the node that carried the
/// particle; a destroyed record added to a collection again starts a new
/// node lifecycle.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ParticleState {
    /// Live and visited by traversal.
    #[default]
    Active = 0,
    /// Soft-deleted: still linked, skipped by traversal, removed on compaction.
    PendingDelete = 1,
    /// Physically removed from its collection.
    Destroyed = 2,
}

impl ParticleState {
    /// Decode a raw state code as written by a kernel.
    ///
    /// Returns `None` for codes that are not lifecycle states.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Active),
            1 => Some(Self::PendingDelete),
            2 => Some(Self::Destroyed),
            _ => None,
        }
    }

    /// The raw code stored in [`Particle`].
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Physical state of one simulated entity.
///
/// Owned exclusively by the node that carries it.
#[repr(C)]
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    /// Longitude (or x).
    pub lon: f64,
    /// Latitude (or y).
    pub lat: f64,
    /// Depth (or z).
    pub depth: f64,
    /// Simulation time of the particle.
    pub time: f64,
    /// Integration step size. Negative for backward runs.
    pub dt: f64,
    /// Unique identifier, or [`ParticleId::UNASSIGNED`].
    pub id: ParticleId,
    /// Raw lifecycle code; see [`ParticleState`].
    state: i32,
    /// Extra user variables, ordered as registered with the collection.
    pub variables: Variables,
}

// Layout of the kernel-visible prefix. Kernels compiled against this
// layout read `state` at byte 48.
const _: () = assert!(std::mem::offset_of!(Particle, lon) == 0);
const _: () = assert!(std::mem::offset_of!(Particle, id) == 40);
const _: () = assert!(std::mem::offset_of!(Particle, state) == 48);

impl Particle {
    /// Create an active particle with no identifier and unit `dt`.
    pub fn new(lon: f64, lat: f64, depth: f64, time: f64) -> Self {
        Self {
            lon,
            lat,
            depth,
            time,
            dt: 1.0,
            id: ParticleId::UNASSIGNED,
            state: ParticleState::Active.code(),
            variables: Variables::new(),
        }
    }

    /// Builder: set an explicit identifier.
    pub fn with_id(mut self, id: ParticleId) -> Self {
        self.id = id;
        self
    }

    /// Builder: set the step size.
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Builder: set the extra variable values.
    pub fn with_variables(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.variables = values.into_iter().collect();
        self
    }

    /// Current lifecycle state.
    ///
    /// Codes outside the lifecycle set (kernels may stash their own status
    /// codes here) count as [`ParticleState::Active`].
    pub fn state(&self) -> ParticleState {
        ParticleState::from_code(self.state).unwrap_or(ParticleState::Active)
    }

    /// The raw state code, exactly as last written.
    pub fn state_code(&self) -> i32 {
        self.state
    }

    /// Overwrite the lifecycle state.
    pub fn set_state(&mut self, state: ParticleState) {
        self.state = state.code();
    }

    /// Whether traversal should visit this particle.
    pub fn is_valid(&self) -> bool {
        self.state() == ParticleState::Active
    }

    /// Whether the particle has been soft-deleted and awaits compaction.
    pub fn is_pending_delete(&self) -> bool {
        self.state() == ParticleState::PendingDelete
    }

    /// Position as `[lon, lat]`, the coordinate order used for partitioning.
    pub fn lon_lat(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}
