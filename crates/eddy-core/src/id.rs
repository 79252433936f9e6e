//! Strongly-typed identifiers and the [`LatticeCoord`] type alias.

use std::fmt;

/// Integer lattice coordinate `[x, y, z]`.
///
/// Two-dimensional lattices keep `z == 0`. Coordinates are signed so that
/// halo cells of a block (which lie outside its core extent) are
/// addressable with the same type.
pub type LatticeCoord = [i32; 3];

/// Identifies a cuboid within a cuboid decomposition.
///
/// Cuboid ids are dense: a decomposition of `N` cuboids uses exactly
/// `CuboidId(0)..CuboidId(N - 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CuboidId(pub u32);

impl CuboidId {
    /// The id as a `usize`, for indexing.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CuboidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CuboidId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a compute rank (one participant of the message-passing
/// universe).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RankId(pub u32);

impl RankId {
    /// The coordinating rank that computes shared decisions such as the
    /// load-balancer assignment.
    pub const ROOT: RankId = RankId(0);

    /// The id as a `usize`, for indexing.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RankId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
