//! Process groups for the distributed engine
//!
//! A process group is a fixed set of `P` ranks that run the same protocol in lockstep. The
//! [`Communicator`] trait exposes the four collectives the distributed engine needs; each one
//! is a rendezvous, so no rank gets past a call until its peers have reached the matching one.
//!
//! [`ChannelCommunicator`] hosts every rank as a thread of the current process and links each
//! ordered pair of ranks with its own channel. Messages between two ranks therefore arrive in
//! the order they were sent, whatever the other ranks are doing.
//!
//! ## Example
//!
//! ```
//! use hyperfft::group::{launch, Communicator, GroupConfig};
//!
//! let sizes = launch(4, &GroupConfig::default(), |comm| {
//!     let len = if comm.is_root() { 1024 } else { 0 };
//!     comm.broadcast_len(len)
//! })
//! .unwrap();
//!
//! assert!(sizes.into_iter().all(|n| n.unwrap() == 1024));
//! ```
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use num_complex::Complex64;
use tracing::{debug, trace};

use crate::error::{FftError, Result};

/// Rank that owns the global signal
pub const ROOT: usize = 0;

/// One collective step of the distributed protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Root announces the signal length
    Broadcast,
    /// Root hands every rank its partition
    Scatter,
    /// Pairwise partition swap for the stage of width `len`
    Exchange { len: usize },
    /// Every rank returns its partition to the root
    Gather,
}

/// The collectives a distributed transform is built from.
///
/// Calls are blocking and must be issued in the same order on every rank of the group.
pub trait Communicator {
    /// This participant's rank in `[0, size)`
    fn rank(&self) -> usize;

    /// Number of participants
    fn size(&self) -> usize;

    fn is_root(&self) -> bool {
        self.rank() == ROOT
    }

    /// Returns the root's `len` on every rank. Values passed by other ranks are ignored.
    fn broadcast_len(&self, len: usize) -> Result<usize>;

    /// Splits the root's `global` buffer into `size` contiguous chunks and returns chunk `rank`
    /// on every rank. Other ranks pass an empty slice.
    fn scatter(&self, global: &[Complex64]) -> Result<Vec<Complex64>>;

    /// Sends `local` to `partner` and returns the partner's buffer, for the stage of width `len`
    fn exchange(&self, partner: usize, len: usize, local: &[Complex64]) -> Result<Vec<Complex64>>;

    /// Concatenates every rank's `local` buffer in rank order on the root.
    /// Other ranks get an empty buffer.
    fn gather(&self, local: Vec<Complex64>) -> Result<Vec<Complex64>>;
}

/// Settings shared by every rank of a [`ChannelCommunicator`] group
#[derive(Debug, Clone, Default)]
pub struct GroupConfig {
    /// How long a rank waits for a peer before giving up. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl GroupConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

#[derive(Debug)]
enum Packet {
    Len(usize),
    Chunk(Vec<Complex64>),
    Exchange { len: usize, data: Vec<Complex64> },
    Gather(Vec<Complex64>),
}

impl Packet {
    fn phase(&self) -> Phase {
        match self {
            Packet::Len(_) => Phase::Broadcast,
            Packet::Chunk(_) => Phase::Scatter,
            Packet::Exchange { len, .. } => Phase::Exchange { len: *len },
            Packet::Gather(_) => Phase::Gather,
        }
    }
}

/// A rank of an in-process group whose members talk over crossbeam channels
#[derive(Debug)]
pub struct ChannelCommunicator {
    rank: usize,
    size: usize,
    /// Indexed by destination rank
    outgoing: Vec<Sender<Packet>>,
    /// Indexed by source rank
    incoming: Vec<Receiver<Packet>>,
    timeout: Option<Duration>,
}

impl ChannelCommunicator {
    /// Creates the `size` endpoints of a fully connected group, in rank order.
    ///
    /// Each endpoint is meant to be moved to its own thread.
    pub fn group(size: usize, config: &GroupConfig) -> Result<Vec<ChannelCommunicator>> {
        if size == 0 || !size.is_power_of_two() {
            return Err(FftError::InvalidGroupSize(size));
        }

        let mut outgoing: Vec<Vec<Sender<Packet>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut incoming: Vec<Vec<Receiver<Packet>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();

        for src in 0..size {
            for dst in incoming.iter_mut() {
                let (tx, rx) = unbounded();
                outgoing[src].push(tx);
                dst.push(rx);
            }
        }

        Ok(outgoing
            .into_iter()
            .zip(incoming)
            .enumerate()
            .map(|(rank, (outgoing, incoming))| ChannelCommunicator {
                rank,
                size,
                outgoing,
                incoming,
                timeout: config.timeout,
            })
            .collect())
    }

    fn send(&self, peer: usize, packet: Packet) -> Result<()> {
        trace!(rank = self.rank, peer, phase = ?packet.phase(), "send");
        self.outgoing[peer]
            .send(packet)
            .map_err(|_| FftError::Disconnected { peer })
    }

    fn recv(&self, peer: usize) -> Result<Packet> {
        let link = &self.incoming[peer];
        let packet = match self.timeout {
            Some(timeout) => link.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => FftError::Timeout { peer },
                RecvTimeoutError::Disconnected => FftError::Disconnected { peer },
            })?,
            None => link.recv().map_err(|_| FftError::Disconnected { peer })?,
        };
        trace!(rank = self.rank, peer, phase = ?packet.phase(), "recv");
        Ok(packet)
    }
}

fn mismatch(expected: Phase, packet: &Packet) -> FftError {
    FftError::PhaseMismatch {
        expected,
        found: packet.phase(),
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast_len(&self, len: usize) -> Result<usize> {
        if self.is_root() {
            for peer in (0..self.size).filter(|&peer| peer != ROOT) {
                self.send(peer, Packet::Len(len))?;
            }
            debug!(rank = self.rank, len, "broadcast signal length");
            return Ok(len);
        }

        match self.recv(ROOT)? {
            Packet::Len(len) => Ok(len),
            other => Err(mismatch(Phase::Broadcast, &other)),
        }
    }

    fn scatter(&self, global: &[Complex64]) -> Result<Vec<Complex64>> {
        if self.is_root() {
            assert_eq!(global.len() % self.size, 0);
            let chunk_len = global.len() / self.size;
            if chunk_len == 0 {
                for peer in (0..self.size).filter(|&peer| peer != ROOT) {
                    self.send(peer, Packet::Chunk(Vec::new()))?;
                }
                return Ok(Vec::new());
            }

            let mut chunks = global.chunks_exact(chunk_len);
            let own = chunks.next().map(<[Complex64]>::to_vec).unwrap_or_default();
            for (peer, chunk) in chunks.enumerate().map(|(i, chunk)| (i + 1, chunk)) {
                self.send(peer, Packet::Chunk(chunk.to_vec()))?;
            }
            debug!(rank = self.rank, chunk_len, "scattered partitions");
            return Ok(own);
        }

        match self.recv(ROOT)? {
            Packet::Chunk(chunk) => Ok(chunk),
            other => Err(mismatch(Phase::Scatter, &other)),
        }
    }

    fn exchange(&self, partner: usize, len: usize, local: &[Complex64]) -> Result<Vec<Complex64>> {
        assert!(partner < self.size && partner != self.rank);

        self.send(
            partner,
            Packet::Exchange {
                len,
                data: local.to_vec(),
            },
        )?;

        match self.recv(partner)? {
            Packet::Exchange { len: theirs, data } if theirs == len => Ok(data),
            other => Err(mismatch(Phase::Exchange { len }, &other)),
        }
    }

    fn gather(&self, local: Vec<Complex64>) -> Result<Vec<Complex64>> {
        if !self.is_root() {
            self.send(ROOT, Packet::Gather(local))?;
            return Ok(Vec::new());
        }

        let mut global = Vec::with_capacity(local.len() * self.size);
        global.extend(local);
        for peer in (0..self.size).filter(|&peer| peer != ROOT) {
            match self.recv(peer)? {
                Packet::Gather(chunk) => global.extend(chunk),
                other => return Err(mismatch(Phase::Gather, &other)),
            }
        }
        debug!(rank = self.rank, len = global.len(), "gathered partitions");
        Ok(global)
    }
}

/// Establishes a group of `size` ranks and runs `f` once per rank, each on its own thread.
///
/// Returns the per-rank results in rank order. A panic on any rank is propagated to the
/// caller once every rank has finished.
pub fn launch<F, R>(size: usize, config: &GroupConfig, f: F) -> Result<Vec<R>>
where
    F: Fn(ChannelCommunicator) -> R + Sync,
    R: Send,
{
    let comms = ChannelCommunicator::group(size, config)?;
    debug!(size, "launching process group");

    let results = std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join())
            .collect::<Vec<_>>()
    });

    Ok(results
        .into_iter()
        .map(|result| result.unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(range: std::ops::Range<usize>) -> Vec<Complex64> {
        range.map(|i| Complex64::new(i as f64, -(i as f64))).collect()
    }

    #[test]
    fn rejects_bad_group_sizes() {
        for size in [0, 3, 6] {
            assert!(matches!(
                ChannelCommunicator::group(size, &GroupConfig::default()),
                Err(FftError::InvalidGroupSize(s)) if s == size
            ));
        }
    }

    #[test]
    fn scatter_then_gather_is_identity() {
        let global = samples(0..32);
        let results = launch(4, &GroupConfig::default(), |comm| {
            let input = if comm.is_root() { global.clone() } else { Vec::new() };
            let n = comm.broadcast_len(input.len())?;
            let local = comm.scatter(&input)?;
            assert_eq!(local.len(), n / comm.size());
            assert_eq!(local[0].re as usize, comm.rank() * 8);
            comm.gather(local)
        })
        .unwrap();

        assert_eq!(results[0].as_ref().unwrap(), &global);
        assert!(results[1..].iter().all(|r| r.as_ref().unwrap().is_empty()));
    }

    #[test]
    fn exchange_swaps_with_partner() {
        let results = launch(4, &GroupConfig::default(), |comm| {
            let rank = comm.rank();
            let mine = samples(rank * 4..rank * 4 + 4);
            comm.exchange(rank ^ 2, 16, &mine)
        })
        .unwrap();

        for (rank, received) in results.into_iter().enumerate() {
            let partner = rank ^ 2;
            assert_eq!(received.unwrap(), samples(partner * 4..partner * 4 + 4));
        }
    }

    #[test]
    fn single_rank_group() {
        let results = launch(1, &GroupConfig::default(), |comm| {
            let n = comm.broadcast_len(8)?;
            let local = comm.scatter(&samples(0..n))?;
            comm.gather(local)
        })
        .unwrap();
        assert_eq!(results[0].as_ref().unwrap(), &samples(0..8));
    }

    #[test]
    fn detects_phase_mismatch() {
        let results = launch(2, &GroupConfig::default(), |comm| {
            if comm.is_root() {
                comm.broadcast_len(4).map(|_| ())
            } else {
                comm.scatter(&[]).map(|_| ())
            }
        })
        .unwrap();

        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(FftError::PhaseMismatch {
                expected: Phase::Scatter,
                found: Phase::Broadcast
            })
        ));
    }

    #[test]
    fn detects_exchange_width_mismatch() {
        let results = launch(2, &GroupConfig::default(), |comm| {
            let len = if comm.is_root() { 4 } else { 8 };
            comm.exchange(comm.rank() ^ 1, len, &samples(0..2))
        })
        .unwrap();

        assert!(results.iter().all(|r| matches!(r, Err(FftError::PhaseMismatch { .. }))));
    }

    #[test]
    fn reports_disconnected_peer() {
        let mut comms = ChannelCommunicator::group(2, &GroupConfig::default()).unwrap();
        let peer = comms.pop().unwrap();
        drop(peer);
        let root = comms.pop().unwrap();
        assert!(matches!(
            root.gather(samples(0..2)),
            Err(FftError::Disconnected { peer: 1 })
        ));
    }

    #[test]
    fn reports_timeout() {
        let comms = ChannelCommunicator::group(
            2,
            &GroupConfig::with_timeout(Duration::from_millis(10)),
        )
        .unwrap();
        assert!(matches!(
            comms[1].broadcast_len(0),
            Err(FftError::Timeout { peer: 0 })
        ));
    }
}
