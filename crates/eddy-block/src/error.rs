//! Error types for block setup and data access.

use eddy_core::{FieldId, LatticeCoord};
use thiserror::Error;

/// Errors from constructing a block or addressing its data.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BlockError {
    /// The field was never allocated on this block.
    #[error("field {0} is not allocated on this block")]
    FieldNotAllocated(FieldId),
    /// The descriptor does not declare the field.
    #[error("descriptor {descriptor} declares no field {field}")]
    FieldNotDeclared {
        /// Requested field.
        field: FieldId,
        /// Descriptor name.
        descriptor: &'static str,
    },
    /// A value has the wrong number of components for its field.
    #[error("field {field} has {expected} components, got {got}")]
    ComponentMismatch {
        /// Target field.
        field: FieldId,
        /// Components declared by the descriptor.
        expected: usize,
        /// Components supplied.
        got: usize,
    },
    /// Overlap must be at least one site for streaming.
    #[error("overlap {0} is too small (streaming needs at least 1)")]
    OverlapTooSmall(i32),
    /// Core extent must be positive on every active axis.
    #[error("invalid core extent {0:?}")]
    InvalidExtent([i32; 3]),
    /// A coordinate outside the padded block.
    #[error("coordinate {0:?} outside the padded block")]
    OutOfBounds(LatticeCoord),
    /// A packed payload does not match the expected size.
    #[error("payload has {got} values, expected {expected}")]
    PayloadSize {
        /// Values the unpack needs.
        expected: usize,
        /// Values supplied.
        got: usize,
    },
}
