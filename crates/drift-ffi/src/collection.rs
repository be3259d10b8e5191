//! Collection lifecycle and native chain access over FFI.
//!
//! Uses per-collection `Arc<Mutex<ParticleCollection>>` so the global
//! `COLLECTIONS` table lock is only held for handle lookup. Different
//! collections can be driven from different threads concurrently.
//!
//! Pointers returned by `drift_collection_native_head` stay valid until
//! the next mutating call on the same collection.

use std::sync::{Arc, Mutex};

use drift_collection::ParticleCollection;
use drift_core::{NodeKey, Particle, ParticleId, ParticleState, SequentialIssuer};
use drift_nodes::{NativeNode, Slab};

use crate::status::DriftStatus;
use crate::types::DriftCollectionConfig;

type CollectionArc = Arc<Mutex<ParticleCollection>>;

static COLLECTIONS: Mutex<Slab<CollectionArc>> = Mutex::new(Slab::new());

/// Clone the Arc for a collection handle, briefly locking the global table.
///
/// Returns `None` if the handle is invalid or the mutex is poisoned.
fn get_collection(handle: u64) -> Option<CollectionArc> {
    COLLECTIONS
        .lock()
        .ok()?
        .get(NodeKey::from_bits(handle))
        .cloned()
}

/// Write the default configuration to `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn drift_collection_config_default(out: *mut DriftCollectionConfig) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return DriftStatus::InvalidArgument as i32;
        }
        // SAFETY: out is non-null and valid per caller contract.
        unsafe { *out = DriftCollectionConfig::default() };
        DriftStatus::Ok as i32
    })
}

/// Create an empty collection with a sequential identifier issuer.
///
/// `config` may be null to use the defaults. On success, writes the
/// collection handle to `handle_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn drift_collection_create(
    config: *const DriftCollectionConfig,
    handle_out: *mut u64,
) -> i32 {
    ffi_guard!({
        if handle_out.is_null() {
            return DriftStatus::InvalidArgument as i32;
        }
        let raw = if config.is_null() {
            DriftCollectionConfig::default()
        } else {
            // SAFETY: config is non-null and valid per caller contract.
            unsafe { *config }
        };
        let Some(config) = raw.to_config() else {
            return DriftStatus::InvalidArgument as i32;
        };
        let collection = match ParticleCollection::new(config, Box::new(SequentialIssuer::new())) {
            Ok(c) => c,
            Err(e) => return DriftStatus::from(&e) as i32,
        };
        let key = ffi_lock!(COLLECTIONS).insert(Arc::new(Mutex::new(collection)));
        // SAFETY: handle_out is non-null and valid per caller contract.
        unsafe { *handle_out = key.to_bits() };
        DriftStatus::Ok as i32
    })
}

/// Destroy a collection, releasing every particle.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn drift_collection_destroy(handle: u64) -> i32 {
    ffi_guard!({
        match ffi_lock!(COLLECTIONS).remove(NodeKey::from_bits(handle)) {
            Some(_) => DriftStatus::Ok as i32,
            None => DriftStatus::InvalidHandle as i32,
        }
    })
}

/// Add one particle.
///
/// A negative `id` requests a fresh identifier. The identifier used is
/// written to `id_out` unless it is null.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn drift_collection_add(
    handle: u64,
    id: i64,
    lon: f64,
    lat: f64,
    depth: f64,
    time: f64,
    id_out: *mut u64,
) -> i32 {
    ffi_guard!({
        let Some(arc) = get_collection(handle) else {
            return DriftStatus::InvalidHandle as i32;
        };
        let mut coll = ffi_lock!(arc);
        let mut particle = Particle::new(lon, lat, depth, time);
        if id >= 0 {
            particle.id = ParticleId(id as u64);
        }
        let pos = match coll.add_single(particle) {
            Ok(Some(pos)) => pos,
            Ok(None) => return DriftStatus::InternalError as i32,
            Err(e) => return DriftStatus::from(&e) as i32,
        };
        let Some(assigned) = coll.get_by_index(pos).map(|p| p.id) else {
            return DriftStatus::InternalError as i32;
        };
        if !id_out.is_null() {
            // SAFETY: id_out is non-null and valid per caller contract.
            unsafe { *id_out = assigned.0 };
        }
        DriftStatus::Ok as i32
    })
}

/// Number of positions, including soft-deleted particles.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn drift_collection_len(handle: u64, len_out: *mut usize) -> i32 {
    ffi_guard!({
        if len_out.is_null() {
            return DriftStatus::InvalidArgument as i32;
        }
        let Some(arc) = get_collection(handle) else {
            return DriftStatus::InvalidHandle as i32;
        };
        let coll = ffi_lock!(arc);
        let len = coll.len();
        // SAFETY: len_out is non-null and valid per caller contract.
        unsafe { *len_out = len };
        DriftStatus::Ok as i32
    })
}

/// Mark the particle with identifier `id` for deletion.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn drift_collection_delete_by_id(handle: u64, id: u64) -> i32 {
    ffi_guard!({
        let Some(arc) = get_collection(handle) else {
            return DriftStatus::InvalidHandle as i32;
        };
        let mut coll = ffi_lock!(arc);
        if coll.delete_by_id(ParticleId(id)) {
            DriftStatus::Ok as i32
        } else {
            DriftStatus::NotFound as i32
        }
    })
}

/// Remove the particle with identifier `id` immediately.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn drift_collection_remove_by_id(handle: u64, id: u64) -> i32 {
    ffi_guard!({
        let Some(arc) = get_collection(handle) else {
            return DriftStatus::InvalidHandle as i32;
        };
        let mut coll = ffi_lock!(arc);
        match coll.remove_single_by_id(ParticleId(id)) {
            Some(_) => DriftStatus::Ok as i32,
            None => DriftStatus::NotFound as i32,
        }
    })
}

/// Remove all soft-deleted particles. The count is written to
/// `removed_out` unless it is null.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn drift_collection_compact(handle: u64, removed_out: *mut usize) -> i32 {
    ffi_guard!({
        let Some(arc) = get_collection(handle) else {
            return DriftStatus::InvalidHandle as i32;
        };
        let mut coll = ffi_lock!(arc);
        let removed = coll.compact();
        if !removed_out.is_null() {
            // SAFETY: removed_out is non-null and valid per caller contract.
            unsafe { *removed_out = removed };
        }
        DriftStatus::Ok as i32
    })
}

/// Write the mirror entry of the first node to `head_out`.
///
/// Null for an empty or managed collection. Kernels walk `next_ptr`
/// from here and must skip payloads whose state is not active.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn drift_collection_native_head(handle: u64, head_out: *mut *mut NativeNode) -> i32 {
    ffi_guard!({
        if head_out.is_null() {
            return DriftStatus::InvalidArgument as i32;
        }
        let Some(arc) = get_collection(handle) else {
            return DriftStatus::InvalidHandle as i32;
        };
        let coll = ffi_lock!(arc);
        let head = coll.native_head();
        // SAFETY: head_out is non-null and valid per caller contract.
        unsafe { *head_out = head };
        DriftStatus::Ok as i32
    })
}

/// Walk the native chain and copy out the identifiers of active
/// particles, in chain order.
///
/// Writes the number found to `n_out`. Returns `BufferTooSmall` (with
/// `n_out` set to the required count) if `cap` is too small.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn drift_collection_walk_ids(
    handle: u64,
    ids_out: *mut u64,
    cap: usize,
    n_out: *mut usize,
) -> i32 {
    ffi_guard!({
        if n_out.is_null() || (ids_out.is_null() && cap > 0) {
            return DriftStatus::InvalidArgument as i32;
        }
        let Some(arc) = get_collection(handle) else {
            return DriftStatus::InvalidHandle as i32;
        };
        // Held for the whole walk so no mutation can move the chain.
        let coll = ffi_lock!(arc);
        let ids = walk_active_ids(coll.native_head());
        // SAFETY: n_out is non-null and valid per caller contract.
        unsafe { *n_out = ids.len() };
        if ids.len() > cap {
            return DriftStatus::BufferTooSmall as i32;
        }
        if !ids.is_empty() {
            // SAFETY: ids_out has room for cap >= ids.len() elements and
            // does not overlap the freshly allocated `ids`.
            unsafe { std::ptr::copy_nonoverlapping(ids.as_ptr(), ids_out, ids.len()) };
        }
        DriftStatus::Ok as i32
    })
}

/// Follow `next_ptr` links from `head`, reading each payload the way a
/// compiled kernel would.
///
/// The caller must hold the owning collection's lock.
#[allow(unsafe_code)]
fn walk_active_ids(head: *mut NativeNode) -> Vec<u64> {
    let mut ids = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: mirror entries live in segments that are never
        // reallocated while the collection exists, and the caller holds
        // the collection lock so no link changes during the walk.
        let entry = unsafe { *cursor };
        if !entry.data_ptr.is_null() {
            // SAFETY: a non-null data_ptr points at the heap payload owned
            // by the live node; it is only read here.
            let particle = unsafe { &*entry.data_ptr.cast::<Particle>() };
            if particle.state() == ParticleState::Active {
                ids.push(particle.id.0);
            }
        }
        cursor = entry.next_ptr;
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn create() -> u64 {
        let mut h = 0u64;
        assert_eq!(drift_collection_create(ptr::null(), &mut h), DriftStatus::Ok as i32);
        h
    }

    fn add(h: u64, id: i64, lon: f64) -> u64 {
        let mut out = 0u64;
        assert_eq!(
            drift_collection_add(h, id, lon, 0.0, 0.0, 0.0, &mut out),
            DriftStatus::Ok as i32
        );
        out
    }

    fn walk(h: u64) -> Vec<u64> {
        let mut buf = [0u64; 16];
        let mut n = 0usize;
        assert_eq!(
            drift_collection_walk_ids(h, buf.as_mut_ptr(), buf.len(), &mut n),
            DriftStatus::Ok as i32
        );
        buf[..n].to_vec()
    }

    #[test]
    fn create_add_walk_destroy() {
        let h = create();
        add(h, -1, 0.0);
        add(h, -1, 10.0);
        add(h, 50, 20.0);
        assert_eq!(walk(h), vec![0, 1, 50]);

        let mut len = 0usize;
        assert_eq!(drift_collection_len(h, &mut len), DriftStatus::Ok as i32);
        assert_eq!(len, 3);
        assert_eq!(drift_collection_destroy(h), DriftStatus::Ok as i32);
    }

    #[test]
    fn native_walk_skips_soft_deleted() {
        let h = create();
        for lon in [0.0, 1.0, 2.0] {
            add(h, -1, lon);
        }
        assert_eq!(drift_collection_delete_by_id(h, 1), DriftStatus::Ok as i32);
        assert_eq!(drift_collection_delete_by_id(h, 9), DriftStatus::NotFound as i32);
        assert_eq!(walk(h), vec![0, 2]);

        let mut removed = 0usize;
        assert_eq!(drift_collection_compact(h, &mut removed), DriftStatus::Ok as i32);
        assert_eq!(removed, 1);
        assert_eq!(drift_collection_remove_by_id(h, 0), DriftStatus::Ok as i32);
        assert_eq!(drift_collection_remove_by_id(h, 0), DriftStatus::NotFound as i32);
        assert_eq!(walk(h), vec![2]);
        drift_collection_destroy(h);
    }

    #[test]
    fn short_buffer_reports_required_len() {
        let h = create();
        add(h, -1, 0.0);
        add(h, -1, 1.0);
        let mut buf = [0u64; 1];
        let mut n = 0usize;
        assert_eq!(
            drift_collection_walk_ids(h, buf.as_mut_ptr(), buf.len(), &mut n),
            DriftStatus::BufferTooSmall as i32
        );
        assert_eq!(n, 2);
        drift_collection_destroy(h);
    }

    #[test]
    fn duplicate_id_is_invalid_argument() {
        let h = create();
        add(h, 7, 0.0);
        assert_eq!(
            drift_collection_add(h, 7, 1.0, 0.0, 0.0, 0.0, ptr::null_mut()),
            DriftStatus::InvalidArgument as i32
        );
        drift_collection_destroy(h);
    }

    #[test]
    fn stale_handle_rejected() {
        let h = create();
        assert_eq!(drift_collection_destroy(h), DriftStatus::Ok as i32);
        assert_eq!(drift_collection_destroy(h), DriftStatus::InvalidHandle as i32);
        let mut len = 0usize;
        assert_eq!(drift_collection_len(h, &mut len), DriftStatus::InvalidHandle as i32);
    }

    #[test]
    fn managed_collection_has_null_head() {
        let config = DriftCollectionConfig {
            kind: crate::types::DriftNodeKind::Managed as i32,
            ..DriftCollectionConfig::default()
        };
        let mut h = 0u64;
        assert_eq!(drift_collection_create(&config, &mut h), DriftStatus::Ok as i32);
        add(h, -1, 0.0);
        let mut head: *mut NativeNode = ptr::null_mut();
        assert_eq!(drift_collection_native_head(h, &mut head), DriftStatus::Ok as i32);
        assert!(head.is_null());
        drift_collection_destroy(h);
    }

    #[test]
    fn bad_segment_len_is_config_error() {
        let config = DriftCollectionConfig {
            segment_len: 10,
            ..DriftCollectionConfig::default()
        };
        let mut h = 0u64;
        assert_eq!(
            drift_collection_create(&config, &mut h),
            DriftStatus::ConfigError as i32
        );
    }
}
