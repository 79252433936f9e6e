//! Collective operations built on point-to-point messaging.
//!
//! Every collective is a gather to [`RankId::ROOT`] followed by a
//! broadcast from it, so reductions combine contributions in rank
//! order and give bit-identical results on every rank. All ranks must
//! call the same collectives in the same order.

use eddy_core::RankId;

use crate::comm::{Comm, RESERVED_TAG_BASE};
use crate::error::CommError;

const TAG_BARRIER: u64 = RESERVED_TAG_BASE;
const TAG_BCAST: u64 = RESERVED_TAG_BASE | 1;
const TAG_GATHER: u64 = RESERVED_TAG_BASE | 2;
const TAG_REDUCE: u64 = RESERVED_TAG_BASE | 3;

impl Comm {
    /// Block until every rank has entered the barrier.
    pub fn barrier(&self) -> Result<(), CommError> {
        self.gather_bytes(RankId::ROOT, Vec::new(), TAG_BARRIER)?;
        self.broadcast_bytes(RankId::ROOT, Vec::new(), TAG_BARRIER)?;
        Ok(())
    }

    /// Distribute `data` from `root` to every rank. Non-root ranks pass
    /// anything (typically an empty vector) and receive root's bytes.
    pub fn broadcast(&self, root: RankId, data: Vec<u8>) -> Result<Vec<u8>, CommError> {
        self.broadcast_bytes(root, data, TAG_BCAST)
    }

    /// Collect each rank's bytes on `root`. Root receives `Some` with one
    /// entry per rank in rank order; every other rank receives `None`.
    pub fn gather(&self, root: RankId, data: Vec<u8>) -> Result<Option<Vec<Vec<u8>>>, CommError> {
        self.gather_bytes(root, data, TAG_GATHER)
    }

    /// Element-wise sum of `values` across all ranks.
    pub fn all_reduce_sum(&self, values: &[f64]) -> Result<Vec<f64>, CommError> {
        self.all_reduce_with(values, |a, b| a + b)
    }

    /// Element-wise maximum of `values` across all ranks.
    pub fn all_reduce_max(&self, values: &[f64]) -> Result<Vec<f64>, CommError> {
        self.all_reduce_with(values, f64::max)
    }

    fn all_reduce_with(&self, values: &[f64], op: fn(f64, f64) -> f64) -> Result<Vec<f64>, CommError> {
        let bytes = bytemuck::cast_slice(values).to_vec();
        let gathered = self.gather_bytes(RankId::ROOT, bytes, TAG_REDUCE)?;
        let reduced = match gathered {
            Some(parts) => {
                let mut acc = values.to_vec();
                for (r, part) in parts.iter().enumerate().skip(1) {
                    let expected = values.len() * std::mem::size_of::<f64>();
                    if part.len() != expected {
                        return Err(CommError::PayloadLength {
                            src: RankId(r as u32),
                            expected,
                            got: part.len(),
                        });
                    }
                    let theirs: Vec<f64> = bytemuck::pod_collect_to_vec(part);
                    for (a, b) in acc.iter_mut().zip(theirs) {
                        *a = op(*a, b);
                    }
                }
                bytemuck::cast_slice(&acc).to_vec()
            }
            None => Vec::new(),
        };
        let out = self.broadcast_bytes(RankId::ROOT, reduced, TAG_REDUCE)?;
        Ok(bytemuck::pod_collect_to_vec(&out))
    }

    fn broadcast_bytes(&self, root: RankId, data: Vec<u8>, tag: u64) -> Result<Vec<u8>, CommError> {
        if self.rank() == root {
            for r in (0..self.size() as u32).map(RankId).filter(|r| *r != root) {
                self.post(r, tag, data.clone())?;
            }
            Ok(data)
        } else {
            self.take(root, tag)
        }
    }

    fn gather_bytes(
        &self,
        root: RankId,
        data: Vec<u8>,
        tag: u64,
    ) -> Result<Option<Vec<Vec<u8>>>, CommError> {
        if self.rank() == root {
            let mut parts = Vec::with_capacity(self.size());
            for r in (0..self.size() as u32).map(RankId) {
                if r == root {
                    parts.push(data.clone());
                } else {
                    parts.push(self.take(r, tag)?);
                }
            }
            Ok(Some(parts))
        } else {
            self.post(root, tag, data)?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Universe;
    use eddy_core::RankId;

    #[test]
    fn all_reduce_sum_and_max_agree_on_every_rank() {
        let out = Universe::run(4, |comm| {
            let r = comm.rank().0 as f64;
            let sum = comm.all_reduce_sum(&[r, 1.0]).unwrap();
            let max = comm.all_reduce_max(&[r, -r]).unwrap();
            (sum, max)
        });
        for (sum, max) in out {
            assert_eq!(sum, vec![6.0, 4.0]);
            assert_eq!(max, vec![3.0, 0.0]);
        }
    }

    #[test]
    fn broadcast_from_non_root() {
        let out = Universe::run(3, |comm| {
            let data = if comm.rank() == RankId(2) { vec![42, 43] } else { Vec::new() };
            comm.broadcast(RankId(2), data).unwrap()
        });
        assert!(out.iter().all(|v| v == &vec![42, 43]));
    }

    #[test]
    fn gather_collects_in_rank_order() {
        let out = Universe::run(3, |comm| comm.gather(RankId::ROOT, vec![comm.rank().0 as u8]).unwrap());
        assert_eq!(out[0], Some(vec![vec![0], vec![1], vec![2]]));
        assert_eq!(out[1], None);
        assert_eq!(out[2], None);
    }

    #[test]
    fn repeated_barriers_do_not_deadlock() {
        let out = Universe::run(4, |comm| {
            for _ in 0..10 {
                comm.barrier().unwrap();
            }
            true
        });
        assert!(out.into_iter().all(|ok| ok));
    }

    #[test]
    fn single_rank_collectives_are_identities() {
        let comm = crate::Comm::solo();
        assert_eq!(comm.all_reduce_sum(&[1.5, 2.5]).unwrap(), vec![1.5, 2.5]);
        assert_eq!(comm.broadcast(RankId::ROOT, vec![7]).unwrap(), vec![7]);
        comm.barrier().unwrap();
    }
}
