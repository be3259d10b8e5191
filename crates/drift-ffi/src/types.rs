//! C-compatible configuration types.

use drift_collection::CollectionConfig;
use drift_core::NodeKind;
use drift_nodes::StoreConfig;

/// Node representation for `DriftCollectionConfig::kind`.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriftNodeKind {
    /// Managed nodes only; no native mirror.
    Managed = 0,
    /// Nodes mirrored into C-layout memory.
    Mirrored = 1,
}

impl DriftNodeKind {
    /// Decode a raw value from C.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Managed),
            1 => Some(Self::Mirrored),
            _ => None,
        }
    }
}

impl From<DriftNodeKind> for NodeKind {
    fn from(kind: DriftNodeKind) -> Self {
        match kind {
            DriftNodeKind::Managed => NodeKind::Managed,
            DriftNodeKind::Mirrored => NodeKind::Mirrored,
        }
    }
}

/// Collection settings passed by value from C.
///
/// Obtain defaults from `drift_collection_config_default` and override
/// fields as needed.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriftCollectionConfig {
    /// Seed for random issuer positions.
    pub seed: u64,
    /// Mirror segment length; a power of two, at least 16.
    pub segment_len: usize,
    /// Raw `DriftNodeKind`.
    pub kind: i32,
}

impl Default for DriftCollectionConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            segment_len: StoreConfig::DEFAULT_SEGMENT_LEN,
            kind: DriftNodeKind::Mirrored as i32,
        }
    }
}

impl DriftCollectionConfig {
    /// Convert to a collection config. `None` for an unknown kind.
    pub fn to_config(&self) -> Option<CollectionConfig> {
        let kind = DriftNodeKind::from_raw(self.kind)?;
        let store = StoreConfig::new(kind.into()).with_segment_len(self.segment_len);
        Some(CollectionConfig::new(self.seed).with_store(store))
    }
}
