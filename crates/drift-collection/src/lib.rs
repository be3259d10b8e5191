//! Particle collection for Lagrangian simulations.
//!
//! Provides [`ParticleCollection`], an identifier-ordered particle set
//! whose node chain is mirrored into native memory for compiled kernels.
//! Supports soft deletion with deferred compaction, export batching for
//! output writers, and spatial partitioning across cooperating workers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod collection;
pub mod comm;
pub mod config;
pub mod export;
pub mod init;
pub mod iter;
pub mod kmeans;
pub mod partition;

pub use collection::ParticleCollection;
pub use comm::{Communicator, Packet, SoloComm, ThreadComm};
pub use config::{CollectionConfig, BUILTIN_VARIABLES};
pub use export::{Column, WriteBatch, WriteSelection, WriteState, WriteStatus};
pub use init::ParticleInit;
pub use iter::{Iter, Nodes};
pub use partition::Partitioner;
