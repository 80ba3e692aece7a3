//! Pluggable cell partitioning over the dual graph.
//!
//! The engine has zero dependency on any particular partitioning
//! algorithm: anything implementing [`Partitioner`] can decide where cells
//! go. The returned destination list assigns, per local cell, the owning
//! rank first and then any additional ranks that must hold the cell as a
//! ghost. [`RoundRobinPartitioner`] is the deterministic stub used in
//! tests; a METIS-backed k-way partitioner is available behind the
//! `metis-support` feature.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::dual_graph::build_dual_graph;
use crate::algs::exchange::exclusive_scan_u64;
use crate::mesh_error::MeshHaloError;
use crate::topology::GhostMode;
use crate::topology::adjacency::AdjacencyList;
use crate::topology::cell_type::CellType;

/// Opaque partitioning capability.
///
/// `dual_graph` links are global cell indices; `num_ghost_nodes` is the
/// count of distinct remote cells referenced. When `ghosting` is false,
/// every destination list entry must contain exactly the owner rank; when
/// true, additional ghost-holder ranks may follow the owner.
pub trait Partitioner {
    fn partition<C: Communicator>(
        &self,
        comm: &C,
        num_parts: usize,
        dual_graph: &AdjacencyList<u64>,
        num_ghost_nodes: usize,
        ghosting: bool,
    ) -> Result<AdjacencyList<usize>, MeshHaloError>;
}

/// Deterministic stub: owner = global cell index mod `num_parts`; with
/// ghosting, a cell is additionally sent to the owners of its graph
/// neighbors.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoundRobinPartitioner;

impl Partitioner for RoundRobinPartitioner {
    fn partition<C: Communicator>(
        &self,
        comm: &C,
        num_parts: usize,
        dual_graph: &AdjacencyList<u64>,
        _num_ghost_nodes: usize,
        ghosting: bool,
    ) -> Result<AdjacencyList<usize>, MeshHaloError> {
        if num_parts == 0 {
            return Err(MeshHaloError::Unsupported(
                "cannot partition into zero parts".into(),
            ));
        }
        let n_local = dual_graph.num_nodes() as u64;
        let (offset, _) = exclusive_scan_u64(comm, n_local, CommTag::PARTITION_OFFSETS)?;

        let owner = |global: u64| (global % num_parts as u64) as usize;
        let mut dests = Vec::with_capacity(dual_graph.num_nodes());
        for c in 0..dual_graph.num_nodes() {
            let own = owner(offset + c as u64);
            let mut list = vec![own];
            if ghosting {
                let mut extra: Vec<usize> = dual_graph
                    .links(c)
                    .iter()
                    .map(|&nbr| owner(nbr))
                    .filter(|&p| p != own)
                    .collect();
                extra.sort_unstable();
                extra.dedup();
                list.extend(extra);
            }
            dests.push(list);
        }
        Ok(AdjacencyList::from_nested(dests))
    }
}

/// METIS k-way partition of the local portion of the dual graph. Cross-rank
/// edges are dropped (METIS is a serial partitioner); the owner of each
/// local cell is the computed part, ghosting follows the same neighbor-owner
/// rule as the round-robin stub.
#[cfg(feature = "metis-support")]
#[derive(Clone, Copy, Debug, Default)]
pub struct MetisPartitioner;

#[cfg(feature = "metis-support")]
impl Partitioner for MetisPartitioner {
    fn partition<C: Communicator>(
        &self,
        comm: &C,
        num_parts: usize,
        dual_graph: &AdjacencyList<u64>,
        _num_ghost_nodes: usize,
        ghosting: bool,
    ) -> Result<AdjacencyList<usize>, MeshHaloError> {
        use metis::Graph;

        if num_parts == 0 {
            return Err(MeshHaloError::Unsupported(
                "cannot partition into zero parts".into(),
            ));
        }
        let n_local = dual_graph.num_nodes();
        let (offset, _) = exclusive_scan_u64(comm, n_local as u64, CommTag::PARTITION_OFFSETS)?;
        let local_range = offset..offset + n_local as u64;

        // CSR restricted to local-local edges.
        let mut xadj: Vec<i32> = Vec::with_capacity(n_local + 1);
        let mut adjncy: Vec<i32> = Vec::new();
        xadj.push(0);
        for c in 0..n_local {
            for &nbr in dual_graph.links(c) {
                if local_range.contains(&nbr) {
                    adjncy.push((nbr - offset) as i32);
                }
            }
            xadj.push(adjncy.len() as i32);
        }

        let mut part = vec![0i32; n_local];
        if n_local > 0 {
            Graph::new(1, num_parts as i32, &mut xadj, &mut adjncy)
                .map_err(|e| MeshHaloError::PartitionFailed(format!("{e:?}")))?
                .part_kway(&mut part)
                .map_err(|e| MeshHaloError::PartitionFailed(format!("{e:?}")))?;
        }

        let mut dests = Vec::with_capacity(n_local);
        for c in 0..n_local {
            let own = part[c] as usize;
            let mut list = vec![own];
            if ghosting {
                let mut extra: Vec<usize> = dual_graph
                    .links(c)
                    .iter()
                    .filter(|&&nbr| local_range.contains(&nbr))
                    .map(|&nbr| part[(nbr - offset) as usize] as usize)
                    .filter(|&p| p != own)
                    .collect();
                extra.sort_unstable();
                extra.dedup();
                list.extend(extra);
            }
            dests.push(list);
        }
        Ok(AdjacencyList::from_nested(dests))
    }
}

/// Partition the raw cell chunk: build the dual graph, then delegate to the
/// supplied [`Partitioner`]. Any ghost mode other than [`GhostMode::None`]
/// enables partitioner-native ghosting.
pub fn partition_cells<C: Communicator, P: Partitioner>(
    comm: &C,
    num_parts: usize,
    cell_type: CellType,
    cells: &AdjacencyList<u64>,
    ghost_mode: GhostMode,
    partitioner: &P,
) -> Result<AdjacencyList<usize>, MeshHaloError> {
    log::info!(
        "partitioning {} local cells into {num_parts} parts (ghost mode {ghost_mode:?})",
        cells.num_nodes()
    );
    let (dual_graph, info) = build_dual_graph(comm, cell_type, cells)?;
    let ghosting = ghost_mode != GhostMode::None;
    partitioner.partition(comm, num_parts, &dual_graph, info.num_ghost_nodes, ghosting)
}
