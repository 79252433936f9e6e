//! Per-block statistics accumulators.

/// Density and squared speed of one collided cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellStatistic {
    /// Density.
    pub rho: f64,
    /// Squared velocity magnitude.
    pub u_sqr: f64,
}

/// Running sums over the cells collided since the last reset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockStatistics {
    /// Sum of densities.
    pub sum_rho: f64,
    /// Sum of squared speeds.
    pub sum_u_sqr: f64,
    /// Largest squared speed.
    pub max_u_sqr: f64,
    /// Number of cells folded in.
    pub count: u64,
}

impl BlockStatistics {
    /// Fold one cell in.
    #[inline]
    pub fn increment(&mut self, rho: f64, u_sqr: f64) {
        self.sum_rho += rho;
        self.sum_u_sqr += u_sqr;
        if u_sqr > self.max_u_sqr {
            self.max_u_sqr = u_sqr;
        }
        self.count += 1;
    }

    /// Merge another accumulator into this one.
    pub fn merge(&mut self, other: &BlockStatistics) {
        self.sum_rho += other.sum_rho;
        self.sum_u_sqr += other.sum_u_sqr;
        self.max_u_sqr = self.max_u_sqr.max(other.max_u_sqr);
        self.count += other.count;
    }

    /// Clear every accumulator.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Mean density, or zero if no cell was folded in.
    pub fn average_rho(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_rho / self.count as f64
        }
    }
}
