//! The explicit per-process run context.
//!
//! Rank, universe size, output directory and the RNG seed travel in a
//! [`RunContext`] that is passed to whatever needs them; nothing in the
//! engine reads process-global state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eddy_comm::Comm;
use eddy_core::RankId;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Rank-local handle to the universe plus run-wide settings.
#[derive(Clone, Debug)]
pub struct RunContext {
    comm: Arc<Comm>,
    output_dir: PathBuf,
    seed: u64,
}

/// Builder for [`RunContext`].
#[derive(Debug)]
pub struct RunContextBuilder {
    comm: Comm,
    output_dir: PathBuf,
    seed: u64,
}

impl RunContextBuilder {
    /// Directory for output files. Default: `./eddy-output`.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Seed for every RNG derived from the context. Default: 0.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Finish the context.
    pub fn build(self) -> RunContext {
        RunContext {
            comm: Arc::new(self.comm),
            output_dir: self.output_dir,
            seed: self.seed,
        }
    }
}

impl RunContext {
    /// Start building a context around this rank's communicator.
    pub fn builder(comm: Comm) -> RunContextBuilder {
        RunContextBuilder {
            comm,
            output_dir: PathBuf::from("eddy-output"),
            seed: 0,
        }
    }

    /// A single-rank context with default settings.
    pub fn solo() -> Self {
        Self::builder(Comm::solo()).build()
    }

    /// This rank's communicator.
    pub fn comm(&self) -> &Comm {
        &self.comm
    }

    pub(crate) fn shared_comm(&self) -> Arc<Comm> {
        Arc::clone(&self.comm)
    }

    /// This rank.
    pub fn rank(&self) -> RankId {
        self.comm.rank()
    }

    /// Number of ranks.
    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generator seeded from the run seed, same sequence on every rank.
    pub fn shared_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }

    /// Generator seeded from the run seed on a stream unique to this rank.
    pub fn rank_rng(&self) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(u64::from(self.rank().0));
        rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn builder_sets_fields() {
        let ctx = RunContext::builder(Comm::solo())
            .output_dir("/tmp/run")
            .seed(42)
            .build();
        assert_eq!(ctx.seed(), 42);
        assert_eq!(ctx.output_dir(), Path::new("/tmp/run"));
        assert_eq!(ctx.rank(), RankId::ROOT);
        assert_eq!(ctx.size(), 1);
    }

    #[test]
    fn shared_rng_is_reproducible() {
        let ctx = RunContext::builder(Comm::solo()).seed(7).build();
        let a: u64 = ctx.shared_rng().random();
        let b: u64 = ctx.shared_rng().random();
        assert_eq!(a, b);
    }

    #[test]
    fn rank_streams_differ() {
        let mut comms = eddy_comm::Universe::create(2).into_iter();
        let r0 = RunContext::builder(comms.next().unwrap()).seed(7).build();
        let r1 = RunContext::builder(comms.next().unwrap()).seed(7).build();
        let a: u64 = r0.rank_rng().random();
        let b: u64 = r1.rank_rng().random();
        assert_ne!(a, b);
    }
}
