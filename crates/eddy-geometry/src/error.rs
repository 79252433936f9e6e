//! Error types for geometry construction and load balancing.

use eddy_comm::CommError;
use eddy_core::CuboidId;
use thiserror::Error;

/// Errors from building or querying a cuboid decomposition, and from
/// computing or distributing a load-balancer assignment.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GeometryError {
    /// A cuboid id outside `0..count`.
    #[error("cuboid {id} out of range (decomposition has {count} cuboids)")]
    InvalidCuboid {
        /// The offending id.
        id: CuboidId,
        /// Number of cuboids in the decomposition.
        count: usize,
    },
    /// The bounding shape covers no lattice site.
    #[error("domain is empty at the requested spacing")]
    EmptyDomain,
    /// Lattice spacing must be finite and positive.
    #[error("invalid lattice spacing {0}")]
    InvalidSpacing(f64),
    /// Only two- and three-dimensional lattices are supported.
    #[error("unsupported dimension {0} (expected 2 or 3)")]
    InvalidDimension(usize),
    /// The requested cuboid count cannot be realised.
    #[error("cannot split {voxels} voxels into {requested} cuboids")]
    TooManyCuboids {
        /// Requested cuboid count.
        requested: usize,
        /// Lattice sites available.
        voxels: u64,
    },
    /// A rank assignment does not describe the decomposition.
    #[error("invalid assignment: {reason}")]
    InvalidAssignment {
        /// What went wrong.
        reason: String,
    },
    /// Distributing the assignment failed.
    #[error("load balancer distribution failed: {0}")]
    Comm(#[from] CommError),
}
