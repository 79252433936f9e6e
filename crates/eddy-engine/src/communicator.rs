//! Halo exchange for one pipeline stage.
//!
//! A [`BlockCommunicator`] is built once per stage from the geometry
//! alone. For every cuboid it enumerates the source regions feeding its
//! halo (periodic images included) and sorts each transfer into one of
//! three lists:
//!
//! - **local**: both blocks live on this rank; copied directly.
//! - **send**: source local, destination remote; packed per peer rank.
//! - **receive**: destination local, source remote; unpacked per peer.
//!
//! Every rank walks the full decomposition in the same order, so the
//! sender and receiver of a message agree on its layout without any
//! handshake.
//!
//! # Exchange protocol
//!
//! ```text
//! receive()  post one receive per peer
//! send()     pack and post one send per peer
//! (local copies)
//! wait()     complete every receive and unpack it
//! ```

use std::fmt;

use eddy_block::{BlockGeometry, BlockLattice};
use eddy_comm::{Comm, RecvRequest, SendRequest};
use eddy_core::{CuboidId, Descriptor, FieldSet, LatticeCoord, RankId, Stage};
use eddy_geometry::{CuboidDecomposition, LoadBalancer};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{ExchangeError, SetupError};

/// Tags of halo messages: this base with the stage code in the low bits.
const HALO_TAG_BASE: u64 = 0x4841_4c4f << 16;

/// Cells of one local block taking part in a transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Segment {
    block: usize,
    cells: Vec<usize>,
}

/// A transfer between two blocks of this rank.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LocalCopy {
    src: Segment,
    dst: Segment,
}

/// The halo exchange plan and in-flight state of one stage.
pub struct BlockCommunicator {
    stage: Stage,
    fields: FieldSet,
    width: i32,
    tag: u64,
    local: Vec<LocalCopy>,
    sends: IndexMap<RankId, Vec<Segment>>,
    recvs: IndexMap<RankId, Vec<Segment>>,
    pending: Vec<RecvRequest>,
    sent: Vec<SendRequest>,
}

fn negate(c: LatticeCoord) -> LatticeCoord {
    c.map(|v| -v)
}

impl BlockCommunicator {
    /// Plan the exchange of `fields` over `width` halo layers for every
    /// block this rank owns.
    ///
    /// Fails with [`SetupError::OverlapExceedsPadding`] if `width`
    /// exceeds the `overlap` the blocks were built with.
    pub fn new(
        stage: Stage,
        fields: FieldSet,
        width: i32,
        overlap: i32,
        decomposition: &CuboidDecomposition,
        balancer: &LoadBalancer,
    ) -> Result<Self, SetupError> {
        if width > overlap {
            return Err(SetupError::OverlapExceedsPadding {
                requested: width,
                allocated: overlap,
            });
        }
        let mut comm = Self {
            stage,
            fields,
            width,
            tag: HALO_TAG_BASE | u64::from(stage.code()),
            local: Vec::new(),
            sends: IndexMap::new(),
            recvs: IndexMap::new(),
            pending: Vec::new(),
            sent: Vec::new(),
        };
        if fields.is_empty() || width < 1 {
            return Ok(comm);
        }

        let rank = balancer.rank();
        let dim = decomposition.dim();
        let geometries = decomposition
            .iter()
            .map(|(_, c)| BlockGeometry::new(c.extent(), overlap, dim))
            .collect::<Result<Vec<_>, _>>()?;
        let owner = |id: CuboidId| {
            balancer.rank_of(id).ok_or(eddy_geometry::GeometryError::InvalidCuboid {
                id,
                count: balancer.owners().len(),
            })
        };

        for (dst, dst_cuboid) in decomposition.iter() {
            let dst_rank = owner(dst)?;
            for halo in decomposition.halo_sources(dst, width)? {
                let src_rank = owner(halo.source)?;
                if src_rank != rank && dst_rank != rank {
                    continue;
                }
                let src_cuboid = decomposition.get(halo.source)?;
                let dst_box = halo.region.translate(negate(dst_cuboid.offset()));
                let src_box = halo
                    .region
                    .translate(negate(halo.shift))
                    .translate(negate(src_cuboid.offset()));
                let src_cells = geometries[halo.source.index()].indices_in(&src_box);
                let dst_cells = geometries[dst.index()].indices_in(&dst_box);
                debug_assert_eq!(src_cells.len(), dst_cells.len());

                let local_index = |id: CuboidId| balancer.loc(id).unwrap_or_default();
                let src = Segment {
                    block: local_index(halo.source),
                    cells: src_cells,
                };
                let dst = Segment {
                    block: local_index(dst),
                    cells: dst_cells,
                };
                match (src_rank == rank, dst_rank == rank) {
                    (true, true) => comm.local.push(LocalCopy { src, dst }),
                    (true, false) => comm.sends.entry(dst_rank).or_default().push(src),
                    (false, true) => comm.recvs.entry(src_rank).or_default().push(dst),
                    (false, false) => {}
                }
            }
        }
        debug!(
            %stage,
            fields = fields.len(),
            width,
            local = comm.local.len(),
            send_peers = comm.sends.len(),
            recv_peers = comm.recvs.len(),
            "communicator built"
        );
        Ok(comm)
    }

    /// Stage this communicator serves.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Fields exchanged.
    pub fn fields(&self) -> FieldSet {
        self.fields
    }

    /// Halo layers exchanged.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Whether there is nothing to exchange on this rank.
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.sends.is_empty() && self.recvs.is_empty()
    }

    /// Ranks this rank sends to.
    pub fn send_peers(&self) -> impl Iterator<Item = RankId> + '_ {
        self.sends.keys().copied()
    }

    /// Ranks this rank receives from.
    pub fn recv_peers(&self) -> impl Iterator<Item = RankId> + '_ {
        self.recvs.keys().copied()
    }

    /// Number of block-to-block copies within this rank.
    pub fn local_copies(&self) -> usize {
        self.local.len()
    }

    /// Post one non-blocking receive per peer.
    pub fn receive(&mut self, comm: &Comm) -> Result<(), ExchangeError> {
        debug_assert!(self.pending.is_empty(), "receive() called twice without wait()");
        self.pending = self
            .recvs
            .keys()
            .map(|&peer| comm.irecv(peer, self.tag))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    /// Pack this rank's contributions and post one send per peer.
    pub fn send<D: Descriptor>(&mut self, comm: &Comm, blocks: &[BlockLattice<D>]) -> Result<(), ExchangeError> {
        for (&peer, segments) in &self.sends {
            let mut buf = Vec::new();
            for s in segments {
                blocks[s.block].pack(&self.fields, &s.cells, &mut buf)?;
            }
            self.sent.push(comm.isend_pod(peer, self.tag, &buf)?);
        }
        Ok(())
    }

    /// Copy between blocks of this rank.
    pub fn copy_local<D: Descriptor>(&self, blocks: &mut [BlockLattice<D>]) -> Result<(), ExchangeError> {
        for copy in &self.local {
            let (s, d) = (copy.src.block, copy.dst.block);
            if s == d {
                blocks[d].copy_within(&self.fields, &copy.src.cells, &copy.dst.cells)?;
            } else {
                let (src, dst) = pair_mut(blocks, s, d);
                dst.copy_from(src, &self.fields, &copy.src.cells, &copy.dst.cells)?;
            }
        }
        Ok(())
    }

    /// Complete every posted receive and unpack it into the halos.
    pub fn wait<D: Descriptor>(&mut self, comm: &Comm, blocks: &mut [BlockLattice<D>]) -> Result<(), ExchangeError> {
        for req in self.sent.drain(..) {
            req.wait()?;
        }
        let pending = std::mem::take(&mut self.pending);
        for (req, segments) in pending.into_iter().zip(self.recvs.values()) {
            let data: Vec<f64> = comm.wait_pod(req)?;
            let mut offset = 0;
            for s in segments {
                offset += blocks[s.block].unpack(&self.fields, &s.cells, &data[offset..])?;
            }
            if offset != data.len() {
                return Err(eddy_block::BlockError::PayloadSize {
                    expected: offset,
                    got: data.len(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// The full protocol: receive, send, local copies, wait.
    pub fn exchange<D: Descriptor>(&mut self, comm: &Comm, blocks: &mut [BlockLattice<D>]) -> Result<(), ExchangeError> {
        if self.fields.is_empty() {
            return Ok(());
        }
        self.receive(comm)?;
        self.send(comm, blocks)?;
        self.copy_local(blocks)?;
        self.wait(comm, blocks)
    }
}

/// Shared access to `v[a]` and exclusive access to `v[b]`, `a != b`.
fn pair_mut<T>(v: &mut [T], a: usize, b: usize) -> (&T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = v.split_at_mut(b);
        (&lo[a], &mut hi[0])
    } else {
        let (lo, hi) = v.split_at_mut(a);
        (&hi[0], &mut lo[b])
    }
}

impl fmt::Debug for BlockCommunicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCommunicator")
            .field("stage", &self.stage)
            .field("fields", &self.fields)
            .field("width", &self.width)
            .field("local", &self.local.len())
            .field("send_peers", &self.sends.len())
            .field("recv_peers", &self.recvs.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_geometry::Cuboid;

    fn strip(count: usize) -> CuboidDecomposition {
        CuboidDecomposition::new(Cuboid::new([0.0; 3], 1.0, [8, 4, 1]), 2, count).unwrap()
    }

    #[test]
    fn deeper_halo_than_overlap_is_fatal() {
        let d = strip(2);
        let lb = LoadBalancer::single_rank(2);
        let err = BlockCommunicator::new(Stage::PostCollide, FieldSet::populations(), 2, 1, &d, &lb).unwrap_err();
        assert!(matches!(
            err,
            SetupError::OverlapExceedsPadding {
                requested: 2,
                allocated: 1
            }
        ));
    }

    #[test]
    fn single_rank_plan_is_all_local() {
        let d = strip(2);
        let lb = LoadBalancer::single_rank(2);
        let c = BlockCommunicator::new(Stage::PostCollide, FieldSet::populations(), 1, 1, &d, &lb).unwrap();
        // Each of the two cuboids feeds the other's halo.
        assert_eq!(c.local_copies(), 2);
        assert_eq!(c.send_peers().count(), 0);
        assert_eq!(c.recv_peers().count(), 0);
    }

    #[test]
    fn periodic_single_cuboid_feeds_itself() {
        let mut d = strip(1);
        d.set_periodicity([true, true, false]);
        let lb = LoadBalancer::single_rank(1);
        let c = BlockCommunicator::new(Stage::PostCollide, FieldSet::populations(), 1, 1, &d, &lb).unwrap();
        // Eight periodic images around a 2D box.
        assert_eq!(c.local_copies(), 8);
        let total: usize = c.local.iter().map(|l| l.dst.cells.len()).sum();
        assert_eq!(total, 10 * 6 - 8 * 4);
    }

    #[test]
    fn split_ranks_send_and_receive_symmetrically() {
        let d = strip(2);
        let owner = vec![RankId(0), RankId(1)];
        let r0 = LoadBalancer::from_assignment(RankId(0), 2, owner.clone()).unwrap();
        let r1 = LoadBalancer::from_assignment(RankId(1), 2, owner).unwrap();
        let c0 = BlockCommunicator::new(Stage::PostCollide, FieldSet::populations(), 1, 1, &d, &r0).unwrap();
        let c1 = BlockCommunicator::new(Stage::PostCollide, FieldSet::populations(), 1, 1, &d, &r1).unwrap();
        assert_eq!(c0.send_peers().collect::<Vec<_>>(), vec![RankId(1)]);
        assert_eq!(c1.recv_peers().collect::<Vec<_>>(), vec![RankId(0)]);
        let sent: usize = c0.sends[&RankId(1)].iter().map(|s| s.cells.len()).sum();
        let received: usize = c1.recvs[&RankId(0)].iter().map(|s| s.cells.len()).sum();
        assert_eq!(sent, received);
        // A 4x4 block borders its neighbour along one column of 4 sites.
        assert_eq!(sent, 4);
        assert_eq!(c0.local_copies(), 0);
    }

    #[test]
    fn empty_field_set_plans_nothing() {
        let d = strip(2);
        let lb = LoadBalancer::single_rank(2);
        let c = BlockCommunicator::new(Stage::Coupling, FieldSet::empty(), 1, 1, &d, &lb).unwrap();
        assert!(c.is_empty());
    }
}
