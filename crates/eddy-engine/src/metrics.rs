//! Per-step timing metrics of a [`SuperLattice`](crate::SuperLattice).

use eddy_core::Stage;

/// Timings collected during the last `collide_and_stream()`.
///
/// All durations are in microseconds and cover this rank only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepMetrics {
    /// Wall-clock time for the whole step.
    pub total_us: u64,
    /// Collision over every local block.
    pub collide_us: u64,
    /// Streaming over every local block.
    pub stream_us: u64,
    /// Post-processing per stage that ran operators.
    pub post_process_us: Vec<(Stage, u64)>,
    /// Halo exchange per stage that communicated, waits included.
    pub communication_us: Vec<(Stage, u64)>,
    /// Cumulative host/device traffic of local blocks, in bytes.
    pub device_bytes: u64,
}

impl StepMetrics {
    /// Total post-processing time.
    pub fn post_process_total_us(&self) -> u64 {
        self.post_process_us.iter().map(|(_, us)| us).sum()
    }

    /// Total communication time.
    pub fn communication_total_us(&self) -> u64 {
        self.communication_us.iter().map(|(_, us)| us).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = StepMetrics::default();
        assert_eq!(m.total_us, 0);
        assert!(m.post_process_us.is_empty());
        assert_eq!(m.communication_total_us(), 0);
    }

    #[test]
    fn totals_sum_stages() {
        let m = StepMetrics {
            post_process_us: vec![(Stage::PreCoupling, 3), (Stage::PostCoupling, 4)],
            communication_us: vec![(Stage::PostCollide, 10)],
            ..StepMetrics::default()
        };
        assert_eq!(m.post_process_total_us(), 7);
        assert_eq!(m.communication_total_us(), 10);
    }
}
