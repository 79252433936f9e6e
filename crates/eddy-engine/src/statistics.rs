//! Lattice-wide statistics reduced across ranks.

use eddy_block::BlockStatistics;
use eddy_comm::{Comm, CommError};

/// Density, energy and speed summary of the last completed step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatticeStatistics {
    /// Mean density over counted cells.
    pub average_rho: f64,
    /// Mean kinetic energy per unit mass, `0.5 * <u²>`.
    pub average_energy: f64,
    /// Largest speed.
    pub max_u: f64,
    /// Cells counted, over every rank.
    pub cell_count: u64,
}

impl LatticeStatistics {
    /// Summary of one accumulator.
    pub fn from_block(stats: &BlockStatistics) -> Self {
        Self::from_sums(stats.sum_rho, stats.sum_u_sqr, stats.max_u_sqr, stats.count)
    }

    fn from_sums(sum_rho: f64, sum_u_sqr: f64, max_u_sqr: f64, count: u64) -> Self {
        if count == 0 {
            return Self::default();
        }
        let n = count as f64;
        Self {
            average_rho: sum_rho / n,
            average_energy: 0.5 * sum_u_sqr / n,
            max_u: max_u_sqr.sqrt(),
            cell_count: count,
        }
    }

    /// Reduce per-block accumulators of every rank.
    ///
    /// Collective: every rank must call it with its local accumulators.
    pub fn reduce<'a>(comm: &Comm, local: impl IntoIterator<Item = &'a BlockStatistics>) -> Result<Self, CommError> {
        let mut merged = BlockStatistics::default();
        for s in local {
            merged.merge(s);
        }
        let sums = comm.all_reduce_sum(&[merged.sum_rho, merged.sum_u_sqr, merged.count as f64])?;
        let max = comm.all_reduce_max(&[merged.max_u_sqr])?;
        Ok(Self::from_sums(sums[0], sums[1], max[0], sums[2] as u64))
    }
}
