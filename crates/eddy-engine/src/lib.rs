//! Distributed lattice driver for the Eddy engine.
//!
//! A [`SuperLattice`] owns every [`BlockLattice`](eddy_block::BlockLattice)
//! of one rank and steps them together:
//!
//! ```text
//! collide ─▶ PostCollide exchange ─▶ stream
//!   ─▶ PreCoupling ─▶ Coupling ─▶ PostCoupling ─▶ PostPostProcess
//! ```
//!
//! Blocks collide and stream in parallel on the rayon pool; halo
//! exchanges between stages go through one [`BlockCommunicator`] per
//! stage, copying directly between blocks of the same rank and through
//! [`eddy_comm::Comm`] otherwise. Everything process-wide travels in a
//! [`RunContext`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod communicator;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod statistics;
pub mod super_lattice;

pub use communicator::BlockCommunicator;
pub use config::{ConfigError, LatticeConfig, PlatformPolicy};
pub use context::{RunContext, RunContextBuilder};
pub use domain::Domain;
pub use error::{ExchangeError, SetupError};
pub use metrics::StepMetrics;
pub use statistics::LatticeStatistics;
pub use super_lattice::{LatticeState, SuperLattice};
