//! Core types and descriptors for the Eddy lattice-Boltzmann engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other crate in the workspace: cuboid
//! and rank identifiers, lattice descriptors, field and parameter
//! registries, pipeline stages, and execution platform tags.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod descriptor;
pub mod error;
pub mod field;
pub mod id;
pub mod parameter;
pub mod platform;
pub mod stage;

pub use descriptor::{Descriptor, D2Q9, D3Q19, D3Q27, MAX_Q};
pub use error::ParseError;
pub use field::{FieldDef, FieldId, FieldSet, FieldSetIter};
pub use id::{CuboidId, LatticeCoord, RankId};
pub use parameter::{ParameterId, ParameterSet};
pub use platform::{Platform, ProcessingContext};
pub use stage::Stage;
