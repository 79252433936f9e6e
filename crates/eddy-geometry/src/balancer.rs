//! Assignment of cuboids to ranks.
//!
//! The default [`LoadBalancer::heuristic`] is a greedy longest-processing-
//! time scheme: the heaviest unassigned cuboid goes to the currently
//! least-loaded rank, with ties broken by lowest id on both sides. It is
//! computed on [`RankId::ROOT`] and sent point-to-point to every other
//! rank, so all ranks hold the same table even if their floating-point
//! environments differ.

use eddy_comm::Comm;
use eddy_core::{CuboidId, RankId};
use indexmap::IndexMap;

use crate::decomposition::CuboidDecomposition;
use crate::error::GeometryError;

/// Message tag used to distribute the assignment.
const ASSIGNMENT_TAG: u64 = 0xba1a;

/// Tuning of the greedy heuristic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeuristicConfig {
    /// Cost of a full site relative to an empty one. A cuboid's weight
    /// is `full + empty / ratio_full_empty`.
    pub ratio_full_empty: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            ratio_full_empty: 3.7,
        }
    }
}

impl HeuristicConfig {
    /// Blended workload of a cuboid.
    pub fn weight(&self, full: u64, volume: u64) -> f64 {
        let empty = volume.saturating_sub(full);
        full as f64 + empty as f64 / self.ratio_full_empty
    }
}

/// Global cuboid id ↔ (rank, local index) mapping.
///
/// `glob` maps this rank's dense local indices to global ids; `loc` is
/// its inverse; `owner` maps every global id to its rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadBalancer {
    rank: RankId,
    size: usize,
    glob: Vec<CuboidId>,
    loc: IndexMap<CuboidId, usize>,
    owner: Vec<RankId>,
}

impl LoadBalancer {
    /// Build from an explicit `owner` table (global id → rank).
    pub fn from_assignment(rank: RankId, size: usize, owner: Vec<RankId>) -> Result<Self, GeometryError> {
        if let Some(bad) = owner.iter().find(|r| r.index() >= size) {
            return Err(GeometryError::InvalidAssignment {
                reason: format!("rank {bad} exceeds universe size {size}"),
            });
        }
        let glob: Vec<CuboidId> = owner
            .iter()
            .enumerate()
            .filter(|(_, r)| **r == rank)
            .map(|(i, _)| CuboidId(i as u32))
            .collect();
        let loc = glob.iter().enumerate().map(|(l, g)| (*g, l)).collect();
        Ok(Self {
            rank,
            size,
            glob,
            loc,
            owner,
        })
    }

    /// Every cuboid on rank 0, local index equal to global id.
    pub fn single_rank(count: usize) -> Self {
        let glob: Vec<CuboidId> = (0..count as u32).map(CuboidId).collect();
        let loc = glob.iter().enumerate().map(|(l, g)| (*g, l)).collect();
        Self {
            rank: RankId::ROOT,
            size: 1,
            glob,
            loc,
            owner: vec![RankId::ROOT; count],
        }
    }

    /// Greedy assignment computed on the root rank and distributed to
    /// all others.
    ///
    /// With a single rank the heuristic is skipped. Every rank must call
    /// this collectively. A failed distribution is returned as an error
    /// and is not retried.
    pub fn heuristic(
        decomposition: &CuboidDecomposition,
        comm: &Comm,
        config: &HeuristicConfig,
    ) -> Result<Self, GeometryError> {
        let count = decomposition.len();
        if comm.size() == 1 {
            return Ok(Self::single_rank(count));
        }

        let owner = if comm.is_root() {
            let weights: Vec<f64> = decomposition
                .iter()
                .map(|(_, c)| config.weight(c.weight(), c.lattice_volume()))
                .collect();
            let owner = greedy_assignment(&weights, comm.size());
            let wire: Vec<u32> = owner.iter().map(|r| r.0).collect();
            for r in (1..comm.size() as u32).map(RankId) {
                comm.isend_pod(r, ASSIGNMENT_TAG, &wire)?.wait()?;
            }
            owner
        } else {
            let req = comm.irecv(RankId::ROOT, ASSIGNMENT_TAG)?;
            let wire: Vec<u32> = comm.wait_pod(req)?;
            if wire.len() != count {
                return Err(GeometryError::InvalidAssignment {
                    reason: format!("received {} entries for {count} cuboids", wire.len()),
                });
            }
            wire.into_iter().map(RankId).collect()
        };

        let balancer = Self::from_assignment(comm.rank(), comm.size(), owner)?;
        tracing::info!(
            rank = %comm.rank(),
            local = balancer.local_count(),
            total = count,
            "load balancer assigned cuboids"
        );
        Ok(balancer)
    }

    /// Recompute after the decomposition changed. Collective.
    pub fn re_init(
        &mut self,
        decomposition: &CuboidDecomposition,
        comm: &Comm,
        config: &HeuristicConfig,
    ) -> Result<(), GeometryError> {
        *self = Self::heuristic(decomposition, comm, config)?;
        Ok(())
    }

    /// This rank.
    pub fn rank(&self) -> RankId {
        self.rank
    }

    /// Number of ranks.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of cuboids owned by this rank.
    pub fn local_count(&self) -> usize {
        self.glob.len()
    }

    /// Global id of a local index.
    ///
    /// # Panics
    ///
    /// Panics if `local >= local_count()`.
    pub fn glob(&self, local: usize) -> CuboidId {
        self.glob[local]
    }

    /// Local index of a global id, if this rank owns it.
    pub fn loc(&self, global: CuboidId) -> Option<usize> {
        self.loc.get(&global).copied()
    }

    /// Owning rank of a global id.
    pub fn rank_of(&self, global: CuboidId) -> Option<RankId> {
        self.owner.get(global.index()).copied()
    }

    /// Whether this rank owns `global`.
    pub fn is_local(&self, global: CuboidId) -> bool {
        self.loc.contains_key(&global)
    }

    /// Global ids owned by this rank, in local-index order.
    pub fn local_ids(&self) -> &[CuboidId] {
        &self.glob
    }

    /// The full global id → rank table.
    pub fn owners(&self) -> &[RankId] {
        &self.owner
    }
}

/// Greedy longest-processing-time assignment.
///
/// Repeatedly takes the heaviest unassigned cuboid (lowest id on ties)
/// and gives it to the least-loaded rank (lowest rank on ties).
pub fn greedy_assignment(weights: &[f64], ranks: usize) -> Vec<RankId> {
    let mut order: Vec<usize> = (0..weights.len()).collect();
    // Stable sort keeps id order among equal weights.
    order.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]));

    let mut load = vec![0.0f64; ranks];
    let mut owner = vec![RankId::ROOT; weights.len()];
    for c in order {
        let mut target = 0;
        for r in 1..ranks {
            if load[r] < load[target] {
                target = r;
            }
        }
        load[target] += weights[c];
        owner[c] = RankId(target as u32);
    }
    owner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_balances_and_breaks_ties_by_id() {
        let owner = greedy_assignment(&[1.0, 1.0, 1.0, 1.0], 2);
        assert_eq!(owner, vec![RankId(0), RankId(1), RankId(0), RankId(1)]);
    }

    #[test]
    fn heaviest_cuboid_goes_first() {
        let owner = greedy_assignment(&[1.0, 5.0, 2.0, 2.0], 2);
        // 5 -> r0, 2 (id 2) -> r1, 2 (id 3) -> r1, 1 -> r1
        assert_eq!(owner, vec![RankId(1), RankId(0), RankId(1), RankId(1)]);
    }

    #[test]
    fn blended_weight_discounts_empty_sites() {
        let cfg = HeuristicConfig::default();
        assert_eq!(cfg.weight(10, 10), 10.0);
        assert!((cfg.weight(0, 37) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn single_rank_is_identity() {
        let lb = LoadBalancer::single_rank(5);
        for i in 0..5u32 {
            assert_eq!(lb.loc(CuboidId(i)), Some(i as usize));
            assert_eq!(lb.rank_of(CuboidId(i)), Some(RankId(0)));
            assert_eq!(lb.glob(i as usize), CuboidId(i));
        }
    }

    #[test]
    fn assignment_with_unknown_rank_is_rejected() {
        assert!(matches!(
            LoadBalancer::from_assignment(RankId(0), 2, vec![RankId(0), RankId(2)]),
            Err(GeometryError::InvalidAssignment { .. })
        ));
    }

    #[test]
    fn local_indices_are_dense_in_id_order() {
        let owner = vec![RankId(1), RankId(0), RankId(1), RankId(1)];
        let lb = LoadBalancer::from_assignment(RankId(1), 2, owner).unwrap();
        assert_eq!(lb.local_ids(), &[CuboidId(0), CuboidId(2), CuboidId(3)]);
        assert_eq!(lb.loc(CuboidId(2)), Some(1));
        assert_eq!(lb.loc(CuboidId(1)), None);
    }
}
