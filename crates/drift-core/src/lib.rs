//! Core types and traits for the Drift particle collection.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Drift workspace:
//! particle and node identifiers, the particle record handed to native
//! kernels, the lifecycle state machine, error types, and the
//! [`IdIssuer`] contract.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod issuer;
pub mod kind;
pub mod particle;

pub use error::{CollectionError, ConfigError};
pub use id::{NodeKey, ParticleId, WorkerRank};
pub use issuer::{IdIssuer, SequentialIssuer};
pub use kind::NodeKind;
pub use particle::{Particle, ParticleState, Variables};
