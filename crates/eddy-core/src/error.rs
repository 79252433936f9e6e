//! Error types shared across the workspace.

use thiserror::Error;

/// Failure to parse one of the core enums from its textual name.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The string does not name a [`Platform`](crate::Platform).
    #[error("unknown platform '{0}' (expected cpu_scalar, cpu_simd or gpu)")]
    UnknownPlatform(String),
    /// The string does not name a [`Stage`](crate::Stage).
    #[error("unknown stage '{0}'")]
    UnknownStage(String),
}
