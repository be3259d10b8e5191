//! Node storage, native mirror and linked particle list for Drift.
//!
//! Owns the dual representation of a particle chain: managed nodes in a
//! generational slab, and C-layout shadows of the same nodes that compiled
//! kernels traverse through raw pointers. This crate is one of two that
//! may contain `unsafe` code (along with `drift-ffi`).
//!
//! # Architecture
//!
//! ```text
//! NodeStore
//! ├── Slab<Node>            (slot + generation keys, free list)
//! │   └── Node { id, prev, next, Payload }     (raw heap particle)
//! └── MirrorTable           (fixed-capacity segments, never reallocated)
//!     └── NativeNode { prev_ptr, next_ptr, data_ptr, worker_affinity }
//!
//! LinkedParticleList        (positional index: Vec<(ParticleId, NodeKey)>)
//! ```
//!
//! Node and mirror entry share a slot index. Every mutation through
//! [`NodeStore`] rewrites the mirror entries it affects before it returns.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod config;
pub mod list;
pub mod mirror;
pub mod node;
mod payload;
pub mod slab;
pub mod store;

pub use config::StoreConfig;
pub use list::LinkedParticleList;
pub use mirror::{MirrorTable, NativeNode};
pub use node::{Chain, NodeRef};
pub use slab::Slab;
pub use store::NodeStore;
