//! Collective communication between cooperating workers.
//!
//! Every method is a synchronisation point: all workers of a group must
//! call the same collectives in the same order. A worker that skips one
//! leaves its peers blocked; there are no timeouts.
//!
//! ```text
//!   rank 0 (coordinator)          rank 1..n
//!   ────────────────────          ─────────
//!   broadcast(Some(pkt)) ───────▶ broadcast(None) -> pkt
//!   gather(v) -> [v0..vn] ◀────── gather(v)
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender};

use drift_core::{CollectionError, WorkerRank};

/// Payload of a collective exchange.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// Partition labels and per-worker centers computed by the coordinator.
    Assignment {
        /// One worker label per assigned particle.
        labels: Vec<u32>,
        /// Cluster centers as `[lon, lat]`, one per worker.
        centers: Vec<[f64; 2]>,
    },
    /// A single scalar.
    Value(i64),
}

impl Packet {
    /// Unwrap a [`Packet::Value`].
    pub fn into_value(self) -> Result<i64, CollectionError> {
        match self {
            Self::Value(v) => Ok(v),
            other => Err(unexpected("value", &other)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Assignment { .. } => "assignment",
            Self::Value(_) => "value",
        }
    }
}

pub(crate) fn unexpected(expected: &str, got: &Packet) -> CollectionError {
    CollectionError::Communication {
        reason: format!("expected {expected} packet, received {}", got.kind()),
    }
}

/// The distributed runtime as seen by a collection.
pub trait Communicator: Send {
    /// This worker's rank.
    fn rank(&self) -> WorkerRank;

    /// Number of workers in the group.
    fn size(&self) -> usize;

    /// Send `packet` from `root` to every worker.
    ///
    /// The root passes `Some`, everyone else `None`; all receive the
    /// root's packet.
    fn broadcast(&self, packet: Option<Packet>, root: WorkerRank) -> Result<Packet, CollectionError>;

    /// Collect one packet per worker at `root`, in rank order.
    ///
    /// Returns `Some` on the root and `None` elsewhere.
    fn gather(&self, packet: Packet, root: WorkerRank) -> Result<Option<Vec<Packet>>, CollectionError>;

    /// Maximum of `value` across all workers, delivered to all of them.
    fn all_reduce_max(&self, value: i64) -> Result<i64, CollectionError> {
        let root = WorkerRank::COORDINATOR;
        let max = match self.gather(Packet::Value(value), root)? {
            Some(all) => {
                let mut max = i64::MIN;
                for packet in all {
                    max = max.max(packet.into_value()?);
                }
                Some(Packet::Value(max))
            }
            None => None,
        };
        self.broadcast(max, root)?.into_value()
    }

    /// Block until every worker has reached the barrier.
    fn barrier(&self) -> Result<(), CollectionError> {
        self.all_reduce_max(0).map(|_| ())
    }
}

fn missing_root_packet(root: WorkerRank) -> CollectionError {
    CollectionError::InvalidArgument {
        reason: format!("broadcast root {root} supplied no packet"),
    }
}

// ── SoloComm ───────────────────────────────────────────────────────

/// Communicator for a single, non-distributed worker.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoloComm;

impl Communicator for SoloComm {
    fn rank(&self) -> WorkerRank {
        WorkerRank::COORDINATOR
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast(&self, packet: Option<Packet>, root: WorkerRank) -> Result<Packet, CollectionError> {
        packet.ok_or_else(|| missing_root_packet(root))
    }

    fn gather(&self, packet: Packet, _root: WorkerRank) -> Result<Option<Vec<Packet>>, CollectionError> {
        Ok(Some(vec![packet]))
    }
}

// ── ThreadComm ─────────────────────────────────────────────────────

/// Communicator connecting workers that run as threads of one process.
///
/// Each worker owns one inbox; messages from different peers arrive
/// interleaved and are buffered per source, so collectives match up by
/// sender and call order.
pub struct ThreadComm {
    rank: WorkerRank,
    peers: Vec<Sender<(u32, Packet)>>,
    inbox: Receiver<(u32, Packet)>,
    pending: RefCell<Vec<VecDeque<Packet>>>,
}

impl ThreadComm {
    /// Build a fully connected group of `size` workers.
    ///
    /// Element `i` of the result has rank `i`; move each into its own
    /// thread.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| crossbeam_channel::unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ThreadComm {
                rank: WorkerRank(rank as u32),
                peers: senders.clone(),
                inbox,
                pending: RefCell::new(vec![VecDeque::new(); size]),
            })
            .collect()
    }

    fn send(&self, to: WorkerRank, packet: Packet) -> Result<(), CollectionError> {
        let peer = self.peers.get(to.index()).ok_or_else(|| self.no_such_rank(to))?;
        peer.send((self.rank.0, packet))
            .map_err(|_| CollectionError::Communication {
                reason: format!("worker {to} has shut down"),
            })
    }

    fn recv_from(&self, from: WorkerRank) -> Result<Packet, CollectionError> {
        if from.index() >= self.peers.len() {
            return Err(self.no_such_rank(from));
        }
        if let Some(packet) = self.pending.borrow_mut()[from.index()].pop_front() {
            return Ok(packet);
        }
        loop {
            let (source, packet) = self.inbox.recv().map_err(|_| CollectionError::Communication {
                reason: format!("worker {} inbox disconnected", self.rank),
            })?;
            if source == from.0 {
                return Ok(packet);
            }
            self.pending.borrow_mut()[source as usize].push_back(packet);
        }
    }

    fn no_such_rank(&self, rank: WorkerRank) -> CollectionError {
        CollectionError::InvalidArgument {
            reason: format!("rank {rank} outside group of {}", self.peers.len()),
        }
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> WorkerRank {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn broadcast(&self, packet: Option<Packet>, root: WorkerRank) -> Result<Packet, CollectionError> {
        if self.rank != root {
            return self.recv_from(root);
        }
        let packet = packet.ok_or_else(|| missing_root_packet(root))?;
        for to in 0..self.peers.len() as u32 {
            if to != root.0 {
                self.send(WorkerRank(to), packet.clone())?;
            }
        }
        Ok(packet)
    }

    fn gather(&self, packet: Packet, root: WorkerRank) -> Result<Option<Vec<Packet>>, CollectionError> {
        if self.rank != root {
            self.send(root, packet)?;
            return Ok(None);
        }
        let mut all = Vec::with_capacity(self.peers.len());
        for from in 0..self.peers.len() as u32 {
            if from == root.0 {
                all.push(packet.clone());
            } else {
                all.push(self.recv_from(WorkerRank(from))?);
            }
        }
        Ok(Some(all))
    }
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.peers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn run_group<T: Send + 'static>(
        size: usize,
        f: impl Fn(ThreadComm) -> T + Send + Sync + Clone + 'static,
    ) -> Vec<T> {
        let handles: Vec<_> = ThreadComm::group(size)
            .into_iter()
            .map(|comm| {
                let f = f.clone();
                thread::spawn(move || f(comm))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    fn solo_is_identity() {
        let comm = SoloComm;
        assert_eq!(comm.all_reduce_max(7).unwrap(), 7);
        assert_eq!(
            comm.broadcast(Some(Packet::Value(3)), WorkerRank::COORDINATOR)
                .unwrap(),
            Packet::Value(3)
        );
        assert!(comm.barrier().is_ok());
    }

    #[test]
    fn solo_broadcast_without_packet_fails() {
        let err = SoloComm.broadcast(None, WorkerRank::COORDINATOR).unwrap_err();
        assert!(matches!(err, CollectionError::InvalidArgument { .. }));
    }

    #[test]
    fn thread_broadcast_reaches_everyone() {
        let got = run_group(4, |comm| {
            let packet = (comm.rank() == WorkerRank::COORDINATOR).then_some(Packet::Value(42));
            comm.broadcast(packet, WorkerRank::COORDINATOR).unwrap()
        });
        assert!(got.iter().all(|p| *p == Packet::Value(42)));
    }

    #[test]
    fn thread_all_reduce_max() {
        let got = run_group(3, |comm| comm.all_reduce_max(comm.rank().0 as i64 * 10).unwrap());
        assert_eq!(got, vec![20, 20, 20]);
    }

    #[test]
    fn thread_gather_is_rank_ordered() {
        let got = run_group(3, |comm| {
            comm.gather(Packet::Value(comm.rank().0 as i64), WorkerRank::COORDINATOR)
                .unwrap()
        });
        assert_eq!(
            got[0],
            Some(vec![Packet::Value(0), Packet::Value(1), Packet::Value(2)])
        );
        assert_eq!(got[1], None);
    }

    #[test]
    fn consecutive_collectives_do_not_cross() {
        let got = run_group(3, |comm| {
            let a = comm.all_reduce_max(comm.rank().0 as i64).unwrap();
            comm.barrier().unwrap();
            let b = comm.all_reduce_max(-(comm.rank().0 as i64)).unwrap();
            (a, b)
        });
        assert!(got.iter().all(|&(a, b)| a == 2 && b == 0));
    }
}
