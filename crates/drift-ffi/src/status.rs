//! C-compatible status codes.
//!
//! [`DriftStatus`] is a `repr(i32)` enum covering every error condition
//! of the collection. Conversions from [`CollectionError`] and
//! [`ConfigError`] are provided.

use drift_core::{CollectionError, ConfigError};

/// C-compatible status code returned by all FFI functions.
///
/// `Ok` = 0, all errors are negative. Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriftStatus {
    /// Success.
    Ok = 0,
    /// Handle is invalid or was already destroyed.
    InvalidHandle = -1,
    /// Configuration validation error.
    ConfigError = -2,
    /// An argument is null, out of range, or otherwise invalid.
    InvalidArgument = -3,
    /// Positional index outside the collection.
    IndexOutOfRange = -4,
    /// No particle with the requested identifier.
    NotFound = -5,
    /// Nodes of different kinds were compared.
    KindMismatch = -6,
    /// A collective exchange failed.
    CommunicationFailed = -7,
    /// Operation not implemented.
    NotImplemented = -8,
    /// Caller-provided buffer is too small.
    BufferTooSmall = -9,
    /// Internal error (e.g. poisoned mutex after a prior panic).
    InternalError = -10,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl From<&ConfigError> for DriftStatus {
    fn from(_e: &ConfigError) -> Self {
        DriftStatus::ConfigError
    }
}

impl From<&CollectionError> for DriftStatus {
    fn from(e: &CollectionError) -> Self {
        match e {
            CollectionError::Config(_) => DriftStatus::ConfigError,
            CollectionError::IndexOutOfRange { .. } => DriftStatus::IndexOutOfRange,
            CollectionError::InvalidArgument { .. } => DriftStatus::InvalidArgument,
            CollectionError::KindMismatch { .. } => DriftStatus::KindMismatch,
            CollectionError::Communication { .. } => DriftStatus::CommunicationFailed,
            CollectionError::NotImplemented { .. } => DriftStatus::NotImplemented,
        }
    }
}
