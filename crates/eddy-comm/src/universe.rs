//! In-process universe of simulated ranks.

use std::panic;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use eddy_core::RankId;

use crate::comm::{Comm, Envelope};

/// Factory for a set of connected [`Comm`]s, one per rank.
///
/// Ranks are threads of the current process. A universe created with
/// [`Universe::run`] joins every rank before returning; if any rank
/// panicked, its peers' blocked waits fail and the first panic is
/// re-raised on the caller's thread.
#[derive(Debug)]
pub struct Universe;

impl Universe {
    /// Create `size` connected communicators, indexed by rank.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn create(size: usize) -> Vec<Comm> {
        assert!(size > 0, "a universe needs at least one rank");
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| crossbeam_channel::unbounded::<Envelope>()).unzip();
        let peers: Arc<[_]> = senders.into();
        let poisoned = Arc::new(AtomicBool::new(false));
        receivers
            .into_iter()
            .enumerate()
            .map(|(r, inbox)| Comm::new(RankId(r as u32), Arc::clone(&peers), inbox, Arc::clone(&poisoned)))
            .collect()
    }

    /// Run `f` once per rank on its own thread and collect the results
    /// in rank order.
    pub fn run<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(Comm) -> T + Sync,
    {
        let comms = Universe::create(size);
        tracing::debug!(size, "starting universe");
        let f = &f;
        let results: Vec<thread::Result<T>> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    thread::Builder::new()
                        .name(format!("eddy-rank-{}", comm.rank()))
                        .spawn_scoped(s, move || f(comm))
                        .expect("failed to spawn rank thread")
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut out = Vec::with_capacity(size);
        let mut first_panic = None;
        for r in results {
            match r {
                Ok(v) => out.push(v),
                Err(payload) => {
                    first_panic.get_or_insert(payload);
                }
            }
        }
        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommError;

    #[test]
    fn ranks_are_dense_and_ordered() {
        let ranks = Universe::run(4, |comm| (comm.rank(), comm.size()));
        assert_eq!(
            ranks,
            vec![(RankId(0), 4), (RankId(1), 4), (RankId(2), 4), (RankId(3), 4)]
        );
    }

    #[test]
    fn ring_exchange() {
        let got = Universe::run(3, |comm| {
            let n = comm.size() as u32;
            let next = RankId((comm.rank().0 + 1) % n);
            let prev = RankId((comm.rank().0 + n - 1) % n);
            let req = comm.irecv(prev, 0).unwrap();
            comm.isend(next, 0, vec![comm.rank().0 as u8]).unwrap();
            comm.wait(req).unwrap()[0]
        });
        assert_eq!(got, vec![2, 0, 1]);
    }

    #[test]
    fn panicking_rank_fails_blocked_peer() {
        let result = panic::catch_unwind(|| {
            Universe::run(2, |comm| {
                if comm.rank() == RankId(0) {
                    panic!("rank 0 gives up");
                }
                let req = comm.irecv(RankId(0), 5).unwrap();
                comm.wait(req)
            })
        });
        // The panic of rank 0 is re-raised; rank 1 must have returned
        // rather than hanging for the join to finish at all.
        assert!(result.is_err());
    }

    #[test]
    fn poisoned_wait_reports_peer_failure() {
        let mut comms = Universe::create(2);
        let survivor = comms.pop().unwrap();
        let doomed = comms.pop().unwrap();
        let _ = thread::spawn(move || {
            let _held = doomed;
            panic!("boom");
        })
        .join();
        let req = survivor.irecv(RankId(0), 1).unwrap();
        assert!(matches!(
            survivor.wait(req),
            Err(CommError::PeerFailed { src: RankId(0), tag: 1, .. })
        ));
    }
}
