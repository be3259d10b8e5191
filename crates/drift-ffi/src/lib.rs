//! C FFI bindings for the Drift particle collection.
//!
//! Exposes a C-compatible API for language bindings and compiled
//! kernels. This crate is one of two that may contain `unsafe` code
//! (along with `drift-nodes`).
//!
//! Every exported function returns an `i32` status from [`DriftStatus`]
//! and catches panics at the boundary.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

/// Run `$body`, converting a panic into [`DriftStatus::Panicked`].
macro_rules! ffi_guard {
    ($body:block) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $body)) {
            Ok(status) => status,
            Err(_) => {
                log::error!("panic caught at FFI boundary");
                $crate::status::DriftStatus::Panicked as i32
            }
        }
    };
}

/// Lock a mutex or return [`DriftStatus::InternalError`] if poisoned.
macro_rules! ffi_lock {
    ($mutex:expr) => {
        match $mutex.lock() {
            Ok(guard) => guard,
            Err(_) => return $crate::status::DriftStatus::InternalError as i32,
        }
    };
}

pub mod collection;
pub mod status;
pub mod types;

pub use status::DriftStatus;
pub use types::{DriftCollectionConfig, DriftNodeKind};
