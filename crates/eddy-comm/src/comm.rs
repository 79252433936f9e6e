//! Per-rank communicator with non-blocking point-to-point messaging.
//!
//! Every rank owns one unbounded crossbeam inbox. A send pushes an
//! [`Envelope`] into the destination's inbox and completes immediately;
//! a receive is matched on `(source, tag)` with non-overtaking order for
//! messages that share both. Envelopes that arrive while a rank waits
//! for something else are parked in a mailbox until a matching receive
//! is waited on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use bytemuck::Pod;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use eddy_core::RankId;

use crate::error::CommError;

/// Tags at or above this value are reserved for collectives.
pub const RESERVED_TAG_BASE: u64 = 1 << 63;

/// How often a blocked wait re-checks the universe's failure flag.
const POISON_POLL: Duration = Duration::from_millis(20);

/// A message in flight.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub(crate) src: RankId,
    pub(crate) tag: u64,
    pub(crate) payload: Vec<u8>,
}

/// Handle for a posted receive. Complete it with [`Comm::wait`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "a posted receive must be waited on"]
pub struct RecvRequest {
    src: RankId,
    tag: u64,
}

impl RecvRequest {
    /// The rank this receive is matched against.
    pub fn source(&self) -> RankId {
        self.src
    }

    /// The tag this receive is matched against.
    pub fn tag(&self) -> u64 {
        self.tag
    }
}

/// Handle for a posted send.
///
/// Sends are buffered by the destination's inbox, so the handle is
/// complete as soon as it exists; [`SendRequest::wait`] is the
/// completion point callers write against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendRequest {
    dest: RankId,
    bytes: usize,
}

impl SendRequest {
    /// Destination rank.
    pub fn dest(&self) -> RankId {
        self.dest
    }

    /// Payload size in bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Complete the send.
    pub fn wait(self) -> Result<(), CommError> {
        Ok(())
    }
}

/// A rank's endpoint into its universe.
///
/// Methods take `&self`; the mailbox is guarded internally so a `Comm`
/// may be shared by reference across the threads of one rank, though
/// only one of them should block in [`Comm::wait`] at a time.
pub struct Comm {
    rank: RankId,
    peers: Arc<[Sender<Envelope>]>,
    inbox: Receiver<Envelope>,
    mailbox: Mutex<Vec<Envelope>>,
    poisoned: Arc<AtomicBool>,
}

impl Comm {
    pub(crate) fn new(
        rank: RankId,
        peers: Arc<[Sender<Envelope>]>,
        inbox: Receiver<Envelope>,
        poisoned: Arc<AtomicBool>,
    ) -> Self {
        Self {
            rank,
            peers,
            inbox,
            mailbox: Mutex::new(Vec::new()),
            poisoned,
        }
    }

    /// A single-rank communicator. Collectives are identities.
    pub fn solo() -> Self {
        crate::Universe::create(1)
            .pop()
            .unwrap_or_else(|| unreachable!("a universe of one has one rank"))
    }

    /// This rank's id.
    pub fn rank(&self) -> RankId {
        self.rank
    }

    /// Number of ranks in the universe.
    pub fn size(&self) -> usize {
        self.peers.len()
    }

    /// Whether this is the coordinating rank.
    pub fn is_root(&self) -> bool {
        self.rank == RankId::ROOT
    }

    /// Whether some rank of the universe has panicked.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    fn check_rank(&self, rank: RankId) -> Result<(), CommError> {
        if rank.index() < self.size() {
            Ok(())
        } else {
            Err(CommError::InvalidRank {
                rank,
                size: self.size(),
            })
        }
    }

    fn check_user_tag(tag: u64) -> Result<(), CommError> {
        if tag >= RESERVED_TAG_BASE {
            Err(CommError::ReservedTag { tag })
        } else {
            Ok(())
        }
    }

    // ── Point-to-point ─────────────────────────────────────────

    /// Post a non-blocking send of raw bytes.
    pub fn isend(&self, dest: RankId, tag: u64, payload: Vec<u8>) -> Result<SendRequest, CommError> {
        Self::check_user_tag(tag)?;
        self.post(dest, tag, payload)
    }

    /// Post a non-blocking send of a slice of plain-old-data values.
    pub fn isend_pod<T: Pod>(
        &self,
        dest: RankId,
        tag: u64,
        data: &[T],
    ) -> Result<SendRequest, CommError> {
        self.isend(dest, tag, bytemuck::cast_slice(data).to_vec())
    }

    /// Post a non-blocking receive.
    pub fn irecv(&self, src: RankId, tag: u64) -> Result<RecvRequest, CommError> {
        Self::check_user_tag(tag)?;
        self.check_rank(src)?;
        Ok(RecvRequest { src, tag })
    }

    /// Block until the receive completes and return its payload.
    ///
    /// Fails with [`CommError::PeerFailed`] if any rank of the universe
    /// panics while this one is blocked.
    pub fn wait(&self, req: RecvRequest) -> Result<Vec<u8>, CommError> {
        self.take(req.src, req.tag)
    }

    /// Complete a receive and reinterpret its payload as `T`s.
    pub fn wait_pod<T: Pod>(&self, req: RecvRequest) -> Result<Vec<T>, CommError> {
        let bytes = self.wait(req)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Complete a batch of receives, returning payloads in request order.
    pub fn wait_all(&self, reqs: &[RecvRequest]) -> Result<Vec<Vec<u8>>, CommError> {
        reqs.iter().map(|r| self.wait(*r)).collect()
    }

    pub(crate) fn post(&self, dest: RankId, tag: u64, payload: Vec<u8>) -> Result<SendRequest, CommError> {
        self.check_rank(dest)?;
        let bytes = payload.len();
        let envelope = Envelope {
            src: self.rank,
            tag,
            payload,
        };
        self.peers[dest.index()]
            .send(envelope)
            .map_err(|_| CommError::Disconnected { peer: dest })?;
        tracing::trace!(src = %self.rank, %dest, tag, bytes, "posted send");
        Ok(SendRequest { dest, bytes })
    }

    pub(crate) fn take(&self, src: RankId, tag: u64) -> Result<Vec<u8>, CommError> {
        let mut mailbox = self.mailbox.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = mailbox.iter().position(|e| e.src == src && e.tag == tag) {
            return Ok(mailbox.remove(pos).payload);
        }
        loop {
            match self.inbox.recv_timeout(POISON_POLL) {
                Ok(e) if e.src == src && e.tag == tag => return Ok(e.payload),
                Ok(e) => mailbox.push(e),
                Err(RecvTimeoutError::Timeout) => {
                    if self.is_poisoned() {
                        return Err(CommError::PeerFailed {
                            rank: self.rank,
                            src,
                            tag,
                        });
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CommError::Disconnected { peer: src });
                }
            }
        }
    }
}

impl std::fmt::Debug for Comm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comm")
            .field("rank", &self.rank)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

impl Drop for Comm {
    fn drop(&mut self) {
        if thread::panicking() {
            self.poisoned.store(true, Ordering::Release);
            tracing::error!(rank = %self.rank, "rank panicked; poisoning universe");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Universe;

    #[test]
    fn self_send_is_received() {
        let comm = Comm::solo();
        let req = comm.irecv(RankId(0), 7).unwrap();
        comm.isend(RankId(0), 7, vec![1, 2, 3]).unwrap();
        assert_eq!(comm.wait(req).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn out_of_range_rank_is_rejected() {
        let comm = Comm::solo();
        assert!(matches!(
            comm.isend(RankId(3), 0, Vec::new()),
            Err(CommError::InvalidRank { size: 1, .. })
        ));
    }

    #[test]
    fn reserved_tags_are_rejected() {
        let comm = Comm::solo();
        assert!(matches!(
            comm.irecv(RankId(0), RESERVED_TAG_BASE),
            Err(CommError::ReservedTag { .. })
        ));
    }

    #[test]
    fn unmatched_messages_are_parked() {
        let comm = Comm::solo();
        comm.isend(RankId(0), 1, vec![1]).unwrap();
        comm.isend(RankId(0), 2, vec![2]).unwrap();
        let second = comm.irecv(RankId(0), 2).unwrap();
        let first = comm.irecv(RankId(0), 1).unwrap();
        assert_eq!(comm.wait(second).unwrap(), vec![2]);
        assert_eq!(comm.wait(first).unwrap(), vec![1]);
    }

    #[test]
    fn same_tag_messages_do_not_overtake() {
        let comm = Comm::solo();
        for i in 0..4u8 {
            comm.isend(RankId(0), 9, vec![i]).unwrap();
        }
        for i in 0..4u8 {
            let req = comm.irecv(RankId(0), 9).unwrap();
            assert_eq!(comm.wait(req).unwrap(), vec![i]);
        }
    }

    #[test]
    fn pod_payloads_survive_transfer() {
        let out = Universe::run(2, |comm| {
            let other = RankId(1 - comm.rank().0);
            let req = comm.irecv(other, 3).unwrap();
            let mine = [comm.rank().0 as f64 + 0.5; 4];
            comm.isend_pod(other, 3, &mine).unwrap().wait().unwrap();
            comm.wait_pod::<f64>(req).unwrap()
        });
        assert_eq!(out[0], vec![1.5; 4]);
        assert_eq!(out[1], vec![0.5; 4]);
    }
}
