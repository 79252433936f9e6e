//! Reference collision rules and post-processors for the Eddy engine.
//!
//! Every type here plugs into a block through the
//! [`Dynamics`](eddy_block::Dynamics) or
//! [`PostProcessor`](eddy_block::PostProcessor) contract and is generic
//! over the lattice descriptor.
//!
//! # Dynamics
//!
//! | type | parameters | fields |
//! |---|---|---|
//! | [`NoDynamics`] | none | none |
//! | [`NoCollision`] | none | none |
//! | [`Bgk`] | `OMEGA` | none |
//! | [`ForcedBgk`] | `OMEGA` | `FORCE` |
//! | [`BounceBack`] | none | none |
//!
//! # Post-processors
//!
//! | type | typical stage | communicates |
//! |---|---|---|
//! | [`EquilibriumBoundary`] | `PostCoupling` | populations when extrapolating |
//! | [`MomentaWriter`] | `PostPostProcess` | none |
//! | [`ForceCoupling`] | `Coupling` | none |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bgk;
pub mod bounce_back;
pub mod equilibrium_boundary;
pub mod force_coupling;
pub mod forced_bgk;
pub mod momenta_writer;
pub mod no_collision;

pub use bgk::Bgk;
pub use bounce_back::BounceBack;
pub use eddy_block::NoDynamics;
pub use equilibrium_boundary::EquilibriumBoundary;
pub use force_coupling::ForceCoupling;
pub use forced_bgk::ForcedBgk;
pub use momenta_writer::MomentaWriter;
pub use no_collision::NoCollision;
