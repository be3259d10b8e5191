//! Drift: ordered particle collections for Lagrangian simulations.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Drift sub-crates. For most users, adding `drift` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use drift::prelude::*;
//!
//! let mut particles = ParticleCollection::new(
//!     CollectionConfig::new(42),
//!     Box::new(SequentialIssuer::new()),
//! )
//! .unwrap();
//! for lon in [0.0, 10.0, 20.0] {
//!     particles.add_single(Particle::new(lon, 0.0, 0.0, 0.0)).unwrap();
//! }
//!
//! let middle = particles.get_by_index(1).unwrap().id;
//! particles.delete_by_id(middle);
//! assert_eq!(particles.iter().count(), 2);
//!
//! assert_eq!(particles.compact(), 1);
//! assert_eq!(particles.len(), 2);
//! assert!(!particles.native_head().is_null());
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `drift-core` | Particle record, identifiers, issuer contract, errors |
//! | [`nodes`] | `drift-nodes` | Node store, native mirror, positional list |
//! | [`collection`] | `drift-collection` | Collection, export, partitioning, communicators |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`drift-core`).
///
/// Contains the C-layout [`types::Particle`], the lifecycle
/// [`types::ParticleState`], error types, and the [`types::IdIssuer`]
/// contract.
pub use drift_core as types;

/// Node storage and native mirror (`drift-nodes`).
///
/// Most users never touch [`nodes::NodeStore`] directly; kernels read
/// [`nodes::NativeNode`] entries through raw pointers.
pub use drift_nodes as nodes;

/// The particle collection (`drift-collection`).
///
/// [`collection::ParticleCollection`] plus export batching
/// ([`collection::WriteState`]) and distributed partitioning
/// ([`collection::Partitioner`], [`collection::Communicator`]).
pub use drift_collection as collection;

/// Common imports for typical Drift usage.
///
/// ```rust
/// use drift::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use drift_core::{
        IdIssuer, NodeKind, Particle, ParticleId, ParticleState, SequentialIssuer, WorkerRank,
    };

    // Errors
    pub use drift_core::{CollectionError, ConfigError};

    // Nodes
    pub use drift_nodes::{NativeNode, NodeRef, StoreConfig};

    // Collection
    pub use drift_collection::{
        CollectionConfig, Communicator, ParticleCollection, ParticleInit, SoloComm, WriteBatch,
        WriteSelection, WriteState, WriteStatus,
    };
}
