//! Node kinds.

use std::fmt;

/// Representation a node store maintains for its nodes.
///
/// Collections driven by compiled kernels use [`NodeKind::Mirrored`]:
/// every node carries a native shadow that kernels traverse through raw
/// pointers. Collections driven by Rust-only kernels use
/// [`NodeKind::Managed`] and skip the mirror entirely. Nodes of
/// different kinds never compare with each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Managed links only.
    Managed,
    /// Managed links plus a native mirror kept in lockstep.
    #[default]
    Mirrored,
}

impl NodeKind {
    /// Whether nodes of this kind maintain a native mirror.
    pub fn is_mirrored(self) -> bool {
        matches!(self, Self::Mirrored)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Managed => write!(f, "managed"),
            Self::Mirrored => write!(f, "mirrored"),
        }
    }
}
