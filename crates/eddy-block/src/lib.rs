//! Per-block lattice storage and kernels for the Eddy engine.
//!
//! A [`BlockLattice`] holds one cuboid's populations and auxiliary
//! fields plus its halo, on one [`Platform`](eddy_core::Platform). Local
//! physics plugs in through [`Dynamics`]; non-local operators through
//! [`PostProcessor`]. Cross-block communication lives in `eddy-engine`;
//! this crate only exposes the pack/unpack/copy primitives it needs.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod block;
pub mod cell;
pub mod dynamics;
pub mod error;
pub mod geometry;
mod memory;
pub mod post_processor;
pub mod statistics;
pub mod store;

pub use block::BlockLattice;
pub use cell::{Batch, Cell, CellRef, LaneChunk, LANES};
pub use dynamics::{Dynamics, DynamicsMap, DynamicsSlot, NoDynamics, Run};
pub use error::BlockError;
pub use geometry::BlockGeometry;
pub use memory::DeviceBuffer;
pub use post_processor::{BlockAccess, PostProcessor};
pub use statistics::{BlockStatistics, CellStatistic};
pub use store::{AuxFields, FieldArray, FieldStore};
