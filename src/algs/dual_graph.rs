//! Build the distributed *dual graph* of a mesh.
//!
//! Each local cell is a graph node; an undirected edge links two cells iff
//! they share a facet (a codimension-1 entity with the full vertex count of
//! the cell type's facet). Links are **global** cell indices, so edges may
//! point at cells on other ranks.
//!
//! Local edges are found by hashing canonicalized (sorted) facet vertex
//! keys. A facet seen by exactly one local cell is a candidate cross-rank
//! facet; candidates are routed to the *postmaster* rank of their minimal
//! global vertex (block distribution over the global vertex extent), which
//! pairs keys arriving from two different ranks and reports the opposite
//! cell back to each side. A candidate nobody else claims is a true global
//! boundary facet and contributes no edge.

use hashbrown::HashMap;
use itertools::Itertools;

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::{all_gather_u64, all_to_allv_u64, exclusive_scan_u64};
use crate::mesh_error::MeshHaloError;
use crate::topology::adjacency::AdjacencyList;
use crate::topology::cell_type::CellType;

/// Auxiliary counts required by graph partitioners.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct GraphInfo {
    /// Distinct remote cells referenced by cross-rank edges.
    pub num_ghost_nodes: usize,
    /// Undirected edge count between local cells.
    pub num_local_edges: usize,
}

// Postmaster of a global vertex under a block distribution.
fn postmaster(vertex: u64, num_global_vertices: u64, nranks: usize) -> usize {
    debug_assert!(vertex < num_global_vertices);
    let block = num_global_vertices.div_ceil(nranks as u64).max(1);
    ((vertex / block) as usize).min(nranks - 1)
}

/// Build the dual graph of the local cell chunk.
///
/// `cells` maps each local cell to its global vertex indices (fixed width
/// for the given `cell_type`). Returns the graph (links = global cell
/// indices) and the auxiliary counts. Meshes with fewer than two cells
/// yield an empty edge set without error; ranks with no cross-rank
/// candidates still participate in the exchanges with empty payloads.
pub fn build_dual_graph<C: Communicator>(
    comm: &C,
    cell_type: CellType,
    cells: &AdjacencyList<u64>,
) -> Result<(AdjacencyList<u64>, GraphInfo), MeshHaloError> {
    let nv = cell_type.num_vertices();
    let facet_nv = cell_type.facet_type()?.num_vertices();
    for c in 0..cells.num_nodes() {
        if cells.num_links(c) != nv {
            return Err(MeshHaloError::ShapeMismatch {
                what: "vertices per cell",
                expected: nv,
                found: cells.num_links(c),
            });
        }
    }

    let n_local = cells.num_nodes();
    let (cell_offset, _total_cells) =
        exclusive_scan_u64(comm, n_local as u64, CommTag::CELL_OFFSETS)?;

    // Local facet matching on canonical keys.
    let mut facets: HashMap<Vec<u64>, Vec<u32>> = HashMap::with_capacity(n_local * cell_type.num_facets());
    for c in 0..n_local {
        let verts = cells.links(c);
        for f in 0..cell_type.num_facets() {
            let key: Vec<u64> = cell_type
                .facet_vertices(f)
                .iter()
                .map(|&i| verts[i])
                .sorted_unstable()
                .collect();
            facets.entry(key).or_default().push(c as u32);
        }
    }

    let mut adj: Vec<Vec<u64>> = vec![Vec::new(); n_local];
    let mut num_local_edges = 0usize;
    let mut candidates: HashMap<Vec<u64>, u32> = HashMap::new();
    for (key, incident) in facets {
        match incident.as_slice() {
            [_] => {
                candidates.insert(key, incident[0]);
            }
            [a, b] => {
                adj[*a as usize].push(cell_offset + *b as u64);
                adj[*b as usize].push(cell_offset + *a as u64);
                num_local_edges += 1;
            }
            _ => {
                return Err(MeshHaloError::Unsupported(
                    "non-manifold mesh: facet shared by more than two cells".into(),
                ));
            }
        }
    }

    // Route candidates to the postmaster of their minimal vertex.
    let nranks = comm.size();
    let max_vertex = cells.data().iter().copied().max().map_or(0, |m| m + 1);
    let num_global_vertices = all_gather_u64(comm, max_vertex, CommTag::VERTEX_EXTENT)?
        .into_iter()
        .max()
        .unwrap_or(0);

    let mut outbound: Vec<Vec<u64>> = vec![Vec::new(); nranks];
    // Lookup for replies: key → local cell.
    let mut by_key: HashMap<Vec<u64>, u32> = HashMap::with_capacity(candidates.len());
    for (key, cell) in candidates {
        let pm = postmaster(key[0], num_global_vertices, nranks);
        outbound[pm].extend_from_slice(&key);
        outbound[pm].push(cell_offset + cell as u64);
        by_key.insert(key, cell);
    }
    log::debug!(
        "dual graph rank {}: {} local edges, {} cross-rank candidates",
        comm.rank(),
        num_local_edges,
        by_key.len()
    );
    let rec = facet_nv + 1; // key vertices + global cell index
    let inbound = all_to_allv_u64(comm, outbound, CommTag::FACET_CANDIDATES)?;

    // Postmaster role: pair keys from different ranks.
    let mut posted: HashMap<&[u64], Vec<(u64, usize)>> = HashMap::new();
    for (src, data) in inbound.iter().enumerate() {
        if data.len() % rec != 0 {
            return Err(MeshHaloError::comm(
                src,
                format!("candidate record stream not a multiple of {rec}"),
            ));
        }
        for chunk in data.chunks_exact(rec) {
            posted
                .entry(&chunk[..facet_nv])
                .or_default()
                .push((chunk[facet_nv], src));
        }
    }

    let mut replies: Vec<Vec<u64>> = vec![Vec::new(); nranks];
    for (key, owners) in posted {
        match owners.as_slice() {
            [_] => {} // unmatched: true global boundary facet
            [(cell_a, rank_a), (cell_b, rank_b)] => {
                replies[*rank_a].extend_from_slice(key);
                replies[*rank_a].push(*cell_b);
                replies[*rank_b].extend_from_slice(key);
                replies[*rank_b].push(*cell_a);
            }
            _ => {
                return Err(MeshHaloError::ConsistencyViolation(
                    "facet key claimed by more than two ranks".into(),
                ));
            }
        }
    }
    let matches = all_to_allv_u64(comm, replies, CommTag::FACET_MATCHES)?;

    // Close remote edges.
    let mut remote_cells: Vec<u64> = Vec::new();
    for (src, data) in matches.iter().enumerate() {
        if data.len() % rec != 0 {
            return Err(MeshHaloError::comm(
                src,
                format!("match record stream not a multiple of {rec}"),
            ));
        }
        for chunk in data.chunks_exact(rec) {
            let cell = *by_key.get(&chunk[..facet_nv]).ok_or_else(|| {
                MeshHaloError::ConsistencyViolation(
                    "postmaster reported a match for an unknown facet key".into(),
                )
            })?;
            adj[cell as usize].push(chunk[facet_nv]);
            remote_cells.push(chunk[facet_nv]);
        }
    }
    remote_cells.sort_unstable();
    remote_cells.dedup();

    for links in &mut adj {
        links.sort_unstable();
    }
    let graph = AdjacencyList::from_nested(adj);
    Ok((
        graph,
        GraphInfo {
            num_ghost_nodes: remote_cells.len(),
            num_local_edges,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn two_triangles_one_edge() {
        let cells = AdjacencyList::from_flat(vec![0u64, 1, 2, 1, 2, 3], 3).unwrap();
        let (graph, info) = build_dual_graph(&NoComm, CellType::Triangle, &cells).unwrap();
        assert_eq!(graph.links(0), &[1]);
        assert_eq!(graph.links(1), &[0]);
        assert_eq!(info, GraphInfo { num_ghost_nodes: 0, num_local_edges: 1 });
    }

    #[test]
    fn single_cell_has_no_edges() {
        let cells = AdjacencyList::from_flat(vec![0u64, 1, 2], 3).unwrap();
        let (graph, info) = build_dual_graph(&NoComm, CellType::Triangle, &cells).unwrap();
        assert_eq!(graph.num_links(0), 0);
        assert_eq!(info.num_local_edges, 0);
    }

    #[test]
    fn empty_chunk_is_fine() {
        let cells = AdjacencyList::<u64>::empty();
        let (graph, info) = build_dual_graph(&NoComm, CellType::Triangle, &cells).unwrap();
        assert_eq!(graph.num_nodes(), 0);
        assert_eq!(info, GraphInfo::default());
    }

    #[test]
    fn vertex_only_contact_is_not_an_edge() {
        // two triangles meeting at vertex 2 only
        let cells = AdjacencyList::from_flat(vec![0u64, 1, 2, 2, 3, 4], 3).unwrap();
        let (graph, info) = build_dual_graph(&NoComm, CellType::Triangle, &cells).unwrap();
        assert_eq!(graph.num_links(0), 0);
        assert_eq!(graph.num_links(1), 0);
        assert_eq!(info.num_local_edges, 0);
    }

    #[test]
    fn quad_grid_local_edges() {
        // 2x2 tensor-ordered quads on one rank:
        // vertices 0..9 laid out row-major 3x3
        let q = |a: u64, b: u64, c: u64, d: u64| [a, b, c, d];
        let mut data = Vec::new();
        for [a, b, c, d] in [q(0, 1, 3, 4), q(1, 2, 4, 5), q(3, 4, 6, 7), q(4, 5, 7, 8)] {
            data.extend([a, b, c, d]);
        }
        let cells = AdjacencyList::from_flat(data, 4).unwrap();
        let (graph, info) = build_dual_graph(&NoComm, CellType::Quadrilateral, &cells).unwrap();
        // each quad touches exactly its two edge-neighbors, not the diagonal
        assert_eq!(info.num_local_edges, 4);
        assert_eq!(graph.links(0), &[1, 2]);
        assert_eq!(graph.links(3), &[1, 2]);
    }

    #[test]
    fn ragged_cells_rejected() {
        let cells = AdjacencyList::from_nested(vec![vec![0u64, 1, 2], vec![1, 2]]);
        assert!(matches!(
            build_dual_graph(&NoComm, CellType::Triangle, &cells),
            Err(MeshHaloError::ShapeMismatch { .. })
        ));
    }
}
