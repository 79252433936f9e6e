//! Eddy: a block-parallel lattice-Boltzmann execution core.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Eddy sub-crates. For most users, adding `eddy` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use eddy::prelude::*;
//!
//! // A periodic 16x8 channel cut into four cuboids on one rank.
//! let mut domain = CuboidDecomposition::new(Cuboid::new([0.0; 3], 1.0, [16, 8, 1]), 2, 4).unwrap();
//! domain.set_periodicity([true, true, false]);
//!
//! let mut lattice =
//!     SuperLattice::<D2Q9>::with_heuristic(RunContext::solo(), domain, LatticeConfig::default()).unwrap();
//! let bgk: Arc<dyn Dynamics<D2Q9>> = Arc::new(Bgk::new(1.2));
//! lattice.set_dynamics(&Domain::Everywhere, &bgk).unwrap();
//! lattice.define_rho_u(&Domain::Everywhere, 1.0, [0.01, 0.0, 0.0]).unwrap();
//! lattice.initialize().unwrap();
//!
//! for _ in 0..10 {
//!     lattice.collide_and_stream();
//! }
//! let stats = lattice.statistics().unwrap();
//! assert_eq!(stats.cell_count, 128);
//! assert!((stats.average_rho - 1.0).abs() < 1e-12);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `eddy-core` | Ids, descriptors, field and parameter registries, stages |
//! | [`comm`] | `eddy-comm` | Ranks, point-to-point messages, collectives |
//! | [`geometry`] | `eddy-geometry` | Cuboids, decomposition, indicators, load balancing |
//! | [`block`] | `eddy-block` | Block storage, platforms, `Dynamics` and `PostProcessor` |
//! | [`dynamics`] | `eddy-dynamics` | Reference collision rules and post-processors |
//! | [`engine`] | `eddy-engine` | `SuperLattice`, halo exchange, statistics |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and ids (`eddy-core`).
///
/// Lattice descriptors ([`types::D2Q9`], [`types::D3Q19`],
/// [`types::D3Q27`]), [`types::FieldSet`], [`types::ParameterId`] and
/// the pipeline [`types::Stage`]s.
pub use eddy_core as types;

/// Message passing between ranks (`eddy-comm`).
///
/// [`comm::Universe::run`] starts simulated ranks on threads.
pub use eddy_comm as comm;

/// Domain partition and load balancing (`eddy-geometry`).
pub use eddy_geometry as geometry;

/// Per-block storage and kernels (`eddy-block`).
///
/// The [`block::Dynamics`] and [`block::PostProcessor`] traits are the
/// extension points for user physics.
pub use eddy_block as block;

/// Reference dynamics and post-processors (`eddy-dynamics`).
pub use eddy_dynamics as dynamics;

/// The distributed lattice driver (`eddy-engine`).
pub use eddy_engine as engine;

/// Common imports for typical Eddy usage.
///
/// ```rust
/// use eddy::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use eddy_core::{
        CuboidId, Descriptor, FieldId, FieldSet, LatticeCoord, ParameterId, Platform, ProcessingContext, RankId,
        Stage, D2Q9, D3Q19, D3Q27,
    };

    // Communication
    pub use eddy_comm::{Comm, Universe};

    // Geometry
    pub use eddy_geometry::{
        Cuboid, CuboidDecomposition, Indicator, IndicatorCuboid, IndicatorSphere, LoadBalancer, MaterialGeometry,
        MaterialSource,
    };

    // Block extension points
    pub use eddy_block::{BlockAccess, Cell, CellRef, CellStatistic, Dynamics, PostProcessor};

    // Reference physics
    pub use eddy_dynamics::{
        Bgk, BounceBack, EquilibriumBoundary, ForceCoupling, ForcedBgk, MomentaWriter, NoCollision, NoDynamics,
    };

    // Engine
    pub use eddy_engine::{
        Domain, LatticeConfig, LatticeStatistics, PlatformPolicy, RunContext, SetupError, StepMetrics,
        SuperLattice,
    };
}
