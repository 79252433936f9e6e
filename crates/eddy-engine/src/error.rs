//! Error types for lattice setup and halo exchange.

use eddy_block::BlockError;
use eddy_comm::CommError;
use eddy_geometry::GeometryError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::super_lattice::LatticeState;

/// Errors while building or configuring a [`SuperLattice`](crate::SuperLattice).
///
/// All of these are fatal: they surface eagerly at setup and are never
/// downgraded to warnings.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Invalid lattice configuration.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    /// Decomposition or load-balancer failure.
    #[error("geometry: {0}")]
    Geometry(#[from] GeometryError),
    /// Block construction or field access failure.
    #[error("block: {0}")]
    Block(#[from] BlockError),
    /// Message passing failed during a setup collective.
    #[error("communication: {0}")]
    Comm(#[from] CommError),
    /// A communicator asked for a deeper halo than blocks allocate.
    #[error("halo width {requested} exceeds the allocated overlap {allocated}")]
    OverlapExceedsPadding {
        /// Requested halo width.
        requested: i32,
        /// Overlap the blocks were built with.
        allocated: i32,
    },
    /// The decomposition and the descriptor disagree on dimension.
    #[error("decomposition is {got}-dimensional but {descriptor} needs {expected}")]
    DimensionMismatch {
        /// Descriptor name.
        descriptor: &'static str,
        /// Descriptor dimension.
        expected: usize,
        /// Decomposition dimension.
        got: usize,
    },
    /// The load balancer does not describe this decomposition and universe.
    #[error("load balancer covers {covered} cuboids on {ranks} ranks, expected {cuboids} on {size}")]
    BalancerMismatch {
        /// Cuboids known to the balancer.
        covered: usize,
        /// Ranks known to the balancer.
        ranks: usize,
        /// Cuboids in the decomposition.
        cuboids: usize,
        /// Ranks in the universe.
        size: usize,
    },
    /// A setup operation after the lattice left the configuring phase.
    #[error("{operation} is not allowed once the lattice is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// Current lifecycle state.
        state: LatticeState,
    },
}

/// Failure of one halo exchange. The pipeline treats it as fatal.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ExchangeError {
    /// Message passing failed (peer gone or panicked).
    #[error("communication: {0}")]
    Comm(#[from] CommError),
    /// Packing or unpacking block data failed.
    #[error("block: {0}")]
    Block(#[from] BlockError),
}
