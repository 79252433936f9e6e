//! Rank-to-rank message passing for the Eddy lattice-Boltzmann engine.
//!
//! A [`Universe`] is a set of ranks, each holding a [`Comm`]. Ranks
//! exchange byte payloads with non-blocking [`Comm::isend`] /
//! [`Comm::irecv`] and complete receives with [`Comm::wait`]. Collectives
//! ([`Comm::barrier`], [`Comm::broadcast`], [`Comm::gather`],
//! [`Comm::all_reduce_sum`], [`Comm::all_reduce_max`]) are built on top.
//!
//! Ranks are threads of one process; the API mirrors the subset of a
//! message-passing runtime the engine needs, so the engine never depends
//! on whether ranks share an address space.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod collective;
pub mod comm;
pub mod error;
pub mod universe;

pub use comm::{Comm, RecvRequest, SendRequest, RESERVED_TAG_BASE};
pub use error::CommError;
pub use universe::Universe;
