//! Geometric partition and load balancing for the Eddy engine.
//!
//! - [`Cuboid`] / [`CuboidDecomposition`]: deterministic split of a
//!   (possibly periodic) lattice domain into weighted cuboids, physical
//!   to lattice mapping, and halo neighbourhoods.
//! - [`Indicator`]: setup-time membership tests in physical space.
//! - [`MaterialSource`] / [`MaterialGeometry`]: per-site integer tags.
//! - [`LoadBalancer`]: global cuboid id → (rank, local index).
//!
//! Nothing here executes a simulation step.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod balancer;
pub mod cuboid;
pub mod decomposition;
pub mod error;
pub mod indicator;
pub mod lattice_box;
pub mod material;

pub use balancer::{greedy_assignment, HeuristicConfig, LoadBalancer};
pub use cuboid::Cuboid;
pub use decomposition::{CuboidDecomposition, HaloOverlap, SNAP_TOLERANCE};
pub use error::GeometryError;
pub use indicator::{Indicator, IndicatorCuboid, IndicatorDifference, IndicatorSphere};
pub use lattice_box::LatticeBox;
pub use material::{MaterialGeometry, MaterialSource};
