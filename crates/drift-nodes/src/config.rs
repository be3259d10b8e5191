//! Node store configuration parameters.

use drift_core::{ConfigError, NodeKind};

/// Configuration for a [`NodeStore`](crate::NodeStore).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Number of native mirror entries per segment.
    ///
    /// Default: 1024. Must be a power of two and at least 16. Segments are
    /// allocated whole and never move, so this trades resident memory for
    /// the number of allocations a growing collection performs.
    pub segment_len: usize,

    /// Whether nodes carry a native mirror.
    pub kind: NodeKind,
}

impl StoreConfig {
    /// Default mirror segment length.
    pub const DEFAULT_SEGMENT_LEN: usize = 1024;

    /// Smallest accepted mirror segment length.
    pub const MIN_SEGMENT_LEN: usize = 16;

    /// Config for the given node kind with the default segment length.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            segment_len: Self::DEFAULT_SEGMENT_LEN,
            kind,
        }
    }

    /// Builder: override the mirror segment length.
    pub fn with_segment_len(mut self, segment_len: usize) -> Self {
        self.segment_len = segment_len;
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segment_len < Self::MIN_SEGMENT_LEN || !self.segment_len.is_power_of_two() {
            return Err(ConfigError::InvalidSegmentLen {
                value: self.segment_len,
            });
        }
        Ok(())
    }

    /// Bytes occupied by one mirror segment.
    pub fn segment_bytes(&self) -> usize {
        self.segment_len * std::mem::size_of::<crate::NativeNode>()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(NodeKind::default())
    }
}
