//! Test utilities and mock types for Drift development.
//!
//! Provides an [`IdIssuer`] that records every release, a checker for
//! the native mirror of a [`NodeStore`], and particle fixtures.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::HashSet;
use std::ffi::c_void;
use std::ptr;
use std::sync::{Arc, Mutex, PoisonError};

use drift_core::{IdIssuer, NodeKey, ParticleId, SequentialIssuer};
use drift_nodes::NodeStore;

/// Sequential issuer that logs every released identifier.
///
/// Clones share the log, so a test can keep one clone and hand the other
/// to the collection under test.
#[derive(Clone, Debug, Default)]
pub struct RecordingIssuer {
    inner: SequentialIssuer,
    released: Arc<Mutex<Vec<ParticleId>>>,
}

impl RecordingIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers released so far, in release order.
    pub fn released(&self) -> Vec<ParticleId> {
        self.released
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Panics if any identifier was released more than once.
    pub fn assert_released_once(&self) {
        let released = self.released();
        let mut seen = HashSet::new();
        for id in &released {
            assert!(seen.insert(*id), "identifier {id} released twice");
        }
    }
}

impl IdIssuer for RecordingIssuer {
    fn next_id(&mut self, lon: f64, lat: f64, depth: f64, time: f64) -> ParticleId {
        self.inner.next_id(lon, lat, depth, time)
    }

    fn release_id(&mut self, id: ParticleId) {
        self.inner.release_id(id);
        self.released
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }

    fn total_issued(&self) -> u64 {
        self.inner.total_issued()
    }

    fn set_next(&mut self, id: ParticleId) {
        self.inner.set_next(id);
    }
}

/// Check every live node's mirror entry against its managed links.
///
/// For a managed store this only checks that no mirror entry is exposed.
pub fn assert_mirror_consistent(store: &NodeStore) {
    let resolve = |k: Option<NodeKey>| k.map_or(ptr::null_mut(), |k| store.native_ptr(k));
    for node in store.iter() {
        let key = node.key();
        let Some(entry) = store.native(key) else {
            assert!(!store.kind().is_mirrored(), "mirrored node {key} has no entry");
            assert!(store.native_ptr(key).is_null());
            continue;
        };
        assert_eq!(entry.prev_ptr, resolve(store.prev(key)), "prev of {key}");
        assert_eq!(entry.next_ptr, resolve(store.next(key)), "next of {key}");
        let data: *mut c_void = node
            .particle()
            .map_or(ptr::null_mut(), |p| ptr::from_ref(p).cast_mut().cast());
        assert_eq!(entry.data_ptr, data, "data of {key}");
    }
}

/// Identifiers along the chain starting at `head`.
pub fn chain_ids(store: &NodeStore, head: Option<NodeKey>) -> Vec<ParticleId> {
    store.chain(head).map(|n| n.id()).collect()
}
