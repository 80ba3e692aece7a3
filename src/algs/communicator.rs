//! Thin façade over intra-process (thread-per-rank) or inter-process (MPI)
//! message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees). All
//! handles are **waitable** but non-blocking — exchange.rs calls `.wait()`
//! before it trusts that a buffer is ready. Every collective in this crate
//! is built from matched `isend`/`irecv` pairs, so correctness depends on
//! all ranks issuing the same sequence of tagged calls (SPMD lock-step at
//! the level of collectives, not instructions).

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Tag disambiguating concurrent exchanges. One constant per collective
/// call site; size and payload stages of a single exchange use `self` and
/// `self.payload()`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    /// Owned-size all-gather during index map construction.
    pub const OWNERSHIP_SIZES: CommTag = CommTag(10);
    /// Ghost→claimed-owner consistency exchange.
    pub const OWNERSHIP_CLAIMS: CommTag = CommTag(12);
    /// Per-rank cell count all-gather in the dual graph builder.
    pub const CELL_OFFSETS: CommTag = CommTag(20);
    /// Global vertex count all-gather in the dual graph builder.
    pub const VERTEX_EXTENT: CommTag = CommTag(22);
    /// Candidate facet keys → postmaster.
    pub const FACET_CANDIDATES: CommTag = CommTag(24);
    /// Postmaster → candidate owners, matched pairs.
    pub const FACET_MATCHES: CommTag = CommTag(26);
    /// Interface vertex report, ghost holder → vertex owner.
    pub const INTERFACE_REPORT: CommTag = CommTag(30);
    /// Interested-rank broadcast, vertex owner → ghost holders.
    pub const STAR_BROADCAST: CommTag = CommTag(32);
    /// Cell count all-gather in the round-robin partitioner.
    pub const PARTITION_OFFSETS: CommTag = CommTag(40);

    /// Raw tag value.
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// Companion tag for the payload stage of a size/payload exchange.
    pub fn payload(self) -> CommTag {
        CommTag(self.0 + 1)
    }
}

/// Non-blocking point-to-point communication interface.
pub trait Communicator: Send + Sync {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// This process's rank in `[0, size)`.
    fn rank(&self) -> usize;
    /// Number of participating processes.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Compile-time no-op comm for pure serial use: one rank, no peers.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
}

// --- RayonComm: intra-process, one thread per simulated rank ---
type Key = (usize, usize, u16); // (src, dst, tag)

// Queue per (src, dst, tag) so a tag can be reused by sequential collectives
// without a faster rank overwriting an unconsumed message.
static MAILBOX: Lazy<DashMap<Key, VecDeque<Bytes>>> = Lazy::new(DashMap::new);

pub struct LocalHandle {
    buf: Arc<Mutex<Option<Vec<u8>>>>,
    handle: Option<JoinHandle<()>>,
}

impl Wait for LocalHandle {
    fn wait(mut self) -> Option<Vec<u8>> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let mut guard = self.buf.lock().unwrap();
        guard.take()
    }
}

/// Thread-backed communicator: rank `r` of `n` inside one OS process.
///
/// The mailbox is process-global, so concurrent *independent* simulations
/// in one test binary must be serialized (`#[serial]`).
#[derive(Clone, Debug)]
pub struct RayonComm {
    rank: usize,
    size: usize,
}

impl RayonComm {
    pub fn new(rank: usize, size: usize) -> Self {
        Self { rank, size }
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        MAILBOX
            .entry(key)
            .or_default()
            .push_back(Bytes::from(buf.to_vec()));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        let key = (peer, self.rank, tag);
        let buf_arc = Arc::new(Mutex::new(None));
        let buf_arc_clone = buf_arc.clone();
        let buf_len = buf.len();
        let handle = std::thread::spawn(move || {
            loop {
                let popped = MAILBOX.get_mut(&key).and_then(|mut q| q.pop_front());
                if let Some(bytes) = popped {
                    let mut guard = buf_arc_clone.lock().unwrap();
                    *guard = Some(bytes[..buf_len].to_vec());
                    break;
                }
                std::thread::yield_now();
            }
        });
        LocalHandle {
            buf: buf_arc,
            handle: Some(handle),
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::Threading;
    use mpi::topology::{Communicator as _, SimpleCommunicator};
    use mpi::traits::*;

    pub struct MpiComm {
        _universe: mpi::environment::Universe,
        world: Arc<SimpleCommunicator>,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new() -> Self {
            // Receives run on their own threads, so MPI must accept
            // concurrent calls from multiple threads.
            let (universe, _threading) = mpi::initialize_with_threading(Threading::Multiple)
                .expect("MPI initialization failed");
            let world = Arc::new(universe.world());
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                _universe: universe,
                world,
                rank,
                size,
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = LocalHandle;

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        // Blocking send is safe here: every collective posts all of its
        // receives (each on its own thread) before the first send, so a
        // matching receive is already active whatever the message size.
        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, tag as i32);
        }

        // Must not block the caller: the exchange layer posts every
        // receive of a collective before issuing any send. The blocking
        // MPI receive runs on a helper thread, as in `RayonComm`.
        fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> LocalHandle {
            let world = Arc::clone(&self.world);
            let buf_arc = Arc::new(Mutex::new(None));
            let buf_arc_clone = buf_arc.clone();
            let handle = std::thread::spawn(move || {
                let (data, _status) = world
                    .process_at_rank(peer as i32)
                    .receive_vec_with_tag::<u8>(tag as i32);
                let mut guard = buf_arc_clone.lock().unwrap();
                *guard = Some(data);
            });
            LocalHandle {
                buf: buf_arc,
                handle: Some(handle),
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
