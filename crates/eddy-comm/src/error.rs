//! Communication error types.

use eddy_core::RankId;
use thiserror::Error;

/// Errors from point-to-point and collective operations.
///
/// None of these are retried by the engine: a failed exchange aborts the
/// run.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommError {
    /// The destination or source rank is not part of the universe.
    #[error("rank {rank} out of range (universe size {size})")]
    InvalidRank {
        /// The offending rank.
        rank: RankId,
        /// Number of ranks in the universe.
        size: usize,
    },
    /// The tag falls in the range reserved for collectives.
    #[error("tag {tag:#x} is reserved for collective operations")]
    ReservedTag {
        /// The offending tag.
        tag: u64,
    },
    /// The peer's mailbox is gone (its rank has exited).
    #[error("rank {peer} disconnected")]
    Disconnected {
        /// The unreachable rank.
        peer: RankId,
    },
    /// Another rank of the universe panicked while this one was waiting.
    #[error("a peer rank failed while rank {rank} was waiting for tag {tag:#x} from rank {src}")]
    PeerFailed {
        /// The waiting rank.
        rank: RankId,
        /// The rank the message was expected from.
        src: RankId,
        /// The awaited tag.
        tag: u64,
    },
    /// A collective received a payload of the wrong length.
    #[error("collective payload from rank {src} has {got} bytes, expected {expected}")]
    PayloadLength {
        /// Sending rank.
        src: RankId,
        /// Expected byte count.
        expected: usize,
        /// Received byte count.
        got: usize,
    },
}
