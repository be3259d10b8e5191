//! Heap payload with a stable raw address.
//!
//! The mirror hands `data_ptr` to compiled kernels, which read and write
//! the particle behind Rust's back. A `Box<Particle>` would re-assert
//! unique ownership on every `&mut` borrow and invalidate that pointer, so
//! the payload is held as a raw allocation instead and every Rust access
//! is derived from the same pointer the mirror publishes.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use drift_core::Particle;

/// Owned, heap-allocated particle addressed through one raw pointer.
pub(crate) struct Payload(NonNull<Particle>);

// SAFETY: a payload owns its allocation exclusively, like `Box<Particle>`.
// Shared access only hands out `&Particle` and mutation needs `&mut self`.
unsafe impl Send for Payload {}
// SAFETY: see `Send`; `Particle` is itself `Sync`.
unsafe impl Sync for Payload {}

impl Payload {
    pub(crate) fn new(particle: Particle) -> Self {
        Self(NonNull::from(Box::leak(Box::new(particle))))
    }

    /// The address published in the mirror. Stable for the payload's life.
    pub(crate) fn as_ptr(&self) -> *mut Particle {
        self.0.as_ptr()
    }

    pub(crate) fn get(&self) -> &Particle {
        // SAFETY: the pointer came from `Box::leak` and stays allocated
        // until `into_inner` or `drop`; `&self` rules out a live `&mut`.
        unsafe { self.0.as_ref() }
    }

    pub(crate) fn get_mut(&mut self) -> &mut Particle {
        // SAFETY: as in `get`; `&mut self` makes this the only Rust borrow.
        // The reborrow is derived from the published pointer, so that
        // pointer stays valid once the borrow ends.
        unsafe { self.0.as_mut() }
    }

    pub(crate) fn into_inner(self) -> Particle {
        let ptr = self.0.as_ptr();
        std::mem::forget(self);
        // SAFETY: `ptr` came from `Box::leak` and `forget` above ensures
        // it is reclaimed exactly once.
        *unsafe { Box::from_raw(ptr) }
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        // SAFETY: the allocation came from `Box::leak` and is reclaimed
        // only here or in `into_inner`, which skips this drop.
        drop(unsafe { Box::from_raw(self.0.as_ptr()) });
    }
}
