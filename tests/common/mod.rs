//! Shared helpers for multi-rank integration tests.
//!
//! Every rank of a simulated process group runs the same SPMD closure on
//! its own thread over a `RayonComm`; results come back indexed by rank.
//! The mailbox is process-global, so tests using this harness must be
//! annotated `#[serial]`.

use mesh_halo::prelude::*;
use std::sync::Arc;

pub fn run_ranks<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(RayonComm) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let handles: Vec<_> = (0..n)
        .map(|rank| {
            let f = Arc::clone(&f);
            std::thread::spawn(move || f(RayonComm::new(rank, n)))
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("rank thread panicked"))
        .collect()
}
