//! Error types for the Drift particle collection.
//!
//! Two layers: [`ConfigError`] for fatal configuration problems detected
//! while building a collection or partitioning it, and
//! [`CollectionError`] for everything an operation on a live collection
//! can report. Lookup misses are not errors; they surface as `None`.

use std::error::Error;
use std::fmt;

use crate::kind::NodeKind;

/// Fatal configuration errors. No recovery is attempted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Parallel input arrays passed to bulk construction differ in length.
    LengthMismatch {
        /// Name of the offending input array.
        field: String,
        /// Length of the `lon` array that everything is checked against.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },
    /// Fewer particles than workers at initial distributed assignment.
    TooFewParticles {
        /// Number of particles supplied.
        particles: usize,
        /// Number of workers in the group.
        workers: usize,
    },
    /// A supplied partition label lies outside `[0, workers)`.
    PartitionOutOfRange {
        /// The offending label.
        label: i64,
        /// Number of workers in the group.
        workers: usize,
    },
    /// An extra variable was supplied that the collection does not register.
    UnknownVariable {
        /// The unrecognised variable name.
        name: String,
    },
    /// The same extra variable name was registered twice.
    DuplicateVariable {
        /// The duplicated name.
        name: String,
    },
    /// Mirror segment length is not a power of two or is below the minimum.
    InvalidSegmentLen {
        /// The configured value.
        value: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "{field} has {actual} entries but positions have {expected}"
            ),
            Self::TooFewParticles { particles, workers } => write!(
                f,
                "cannot partition {particles} particles across {workers} workers"
            ),
            Self::PartitionOutOfRange { label, workers } => write!(
                f,
                "partition label {label} outside [0, {workers})"
            ),
            Self::UnknownVariable { name } => write!(f, "unknown particle variable '{name}'"),
            Self::DuplicateVariable { name } => {
                write!(f, "particle variable '{name}' registered twice")
            }
            Self::InvalidSegmentLen { value } => write!(
                f,
                "mirror segment length {value} must be a power of two and at least 16"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Errors reported by node, list and collection operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollectionError {
    /// Configuration was rejected.
    Config(ConfigError),
    /// A positional index lies outside `[0, len)`.
    IndexOutOfRange {
        /// The requested index (may be negative for end-relative pops).
        index: i64,
        /// Number of positions tracked at the time of the call.
        len: usize,
    },
    /// An argument is malformed, e.g. a negative explicit particle id.
    InvalidArgument {
        /// Description of the problem.
        reason: String,
    },
    /// Two nodes of incompatible kinds were compared.
    KindMismatch {
        /// Kind of the left-hand node.
        left: NodeKind,
        /// Kind of the right-hand node.
        right: NodeKind,
    },
    /// A collective exchange with other workers failed.
    Communication {
        /// Description of the failure.
        reason: String,
    },
    /// The operation exists in the API but has no algorithm yet.
    NotImplemented {
        /// Name of the operation.
        operation: &'static str,
    },
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            Self::KindMismatch { left, right } => {
                write!(f, "cannot compare {left} node with {right} node")
            }
            Self::Communication { reason } => write!(f, "communication failed: {reason}"),
            Self::NotImplemented { operation } => {
                write!(f, "{operation} is not implemented")
            }
        }
    }
}

impl Error for CollectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CollectionError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
