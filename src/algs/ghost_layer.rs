//! Ghost (halo) layer augmentation over neighbor-only collectives.
//!
//! Given an already-partitioned mesh, compute for every owned cell the full
//! set of remote ranks that must also hold it as a ghost, so that every
//! vertex on the partition interface ends up with its complete star of
//! incident cells on every rank touching it. The information any rank
//! needs is at most two communication hops away (interface-vertex owner,
//! then the owner's complete interested set), so the computation completes
//! in exactly three rounds of neighbor-only communication:
//!
//! 1. **Report**: each rank finds its interface facets, collects the ghost
//!    vertices they touch and reports each vertex's global index to its
//!    owner over the *reverse* group.
//! 2. **Broadcast**: each vertex owner aggregates the reporting ranks
//!    (plus itself), then sends `[vertex, count, owner, ranks...]` records
//!    back over the *forward* group. Both sides fold the result into a
//!    per-vertex interested set and accumulate, per owned cell incident to
//!    an interface vertex, the union across its vertices. Destinations are
//!    a set, never a multiset; the owner rank comes first.
//! 3. **Redistribute**: hand the owned cell connectivity (in global vertex
//!    indices), the owned coordinate block and the destination list to the
//!    [`MeshRebuilder`] collaborator with shared-facet ghosting.
//!
//! Ranks with no interface participate in every collective with empty
//! payloads. Rerunning the computation on an already-augmented topology
//! reproduces the same destination list (fixed point).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::neighbor_all_to_all;
use crate::algs::rebuild::MeshRebuilder;
use crate::mesh_error::MeshHaloError;
use crate::topology::adjacency::AdjacencyList;
use crate::topology::index_map::Direction;
use crate::topology::{GhostMode, Topology};

/// Phases 1 and 2: compute the destination rank list for every owned cell.
///
/// Link 0 of each entry is the owning rank (this rank); any further links
/// are the ranks that must hold the cell as a ghost, sorted and
/// duplicate-free.
pub fn compute_ghost_destinations<C: Communicator>(
    comm: &C,
    topology: &Topology,
) -> Result<AdjacencyList<usize>, MeshHaloError> {
    let tdim = topology.dim();
    let my_rank = comm.rank();

    topology.ensure_entities(tdim - 1)?;
    topology.ensure_connectivity(tdim - 1, tdim)?;
    topology.ensure_connectivity(tdim - 1, 0)?;
    topology.ensure_connectivity(0, tdim)?;
    let f_to_c = topology.connectivity(tdim - 1, tdim)?;
    let f_to_v = topology.connectivity(tdim - 1, 0)?;
    let v_to_c = topology.connectivity(0, tdim)?;
    let map_v = topology.index_map(0)?;
    let map_c = topology.index_map(tdim)?;

    // Phase 1: interface discovery, report to vertex owners.
    let vertex_size_local = map_v.size_local() as u32;
    let mut int_vertices: Vec<u32> = Vec::new();
    for f in 0..f_to_c.num_nodes() {
        // facets with a single incident cell are candidates for being
        // shared across ranks (or true boundary, which resolves to an
        // empty interested set)
        if f_to_c.num_links(f) == 1 {
            for &v in f_to_v.links(f) {
                if v >= vertex_size_local {
                    int_vertices.push(v);
                }
            }
        }
    }
    int_vertices.sort_unstable();
    int_vertices.dedup();

    let int_vertices_global = map_v.local_to_global(&int_vertices)?;
    let reverse = map_v.comm(Direction::Reverse);
    let mut report: HashMap<usize, Vec<u64>> = HashMap::new();
    for (&v, &g) in int_vertices.iter().zip(&int_vertices_global) {
        let owner = map_v.ghost_owner((v - vertex_size_local) as usize);
        report.entry(owner).or_default().push(g);
    }
    log::debug!(
        "ghost layer rank {my_rank}: reporting {} interface vertices to {} owners",
        int_vertices.len(),
        report.len()
    );
    let received = neighbor_all_to_all(comm, reverse, CommTag::INTERFACE_REPORT, &report)?;

    // Phase 2: owner aggregation, broadcast to the interested set.
    let local_range = map_v.local_range();
    let mut vertex_ranks: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (&src, vertices) in &received {
        for &g in vertices {
            if g < local_range.0 || g >= local_range.1 {
                return Err(MeshHaloError::ConsistencyViolation(format!(
                    "rank {src} reported interface vertex {g}, which rank {my_rank} does not own"
                )));
            }
            vertex_ranks.entry(g).or_default().push(src);
        }
    }
    for ranks in vertex_ranks.values_mut() {
        ranks.sort_unstable();
        ranks.dedup();
    }

    // [vertex, count, owner, reporters...] per interested rank
    let forward = map_v.comm(Direction::Forward);
    let mut broadcast: HashMap<usize, Vec<u64>> = HashMap::new();
    for (&vertex, ranks) in &vertex_ranks {
        for &p in ranks {
            let buf = broadcast.entry(p).or_default();
            buf.push(vertex);
            buf.push(ranks.len() as u64 + 1);
            buf.push(my_rank as u64);
            buf.extend(ranks.iter().map(|&r| r as u64));
        }
    }
    let incoming = neighbor_all_to_all(comm, forward, CommTag::STAR_BROADCAST, &broadcast)?;

    // The owner also touches each of its reported vertices.
    for ranks in vertex_ranks.values_mut() {
        ranks.push(my_rank);
    }
    for (&src, data) in &incoming {
        let mut it = data.iter();
        while let Some(&vertex) = it.next() {
            let count = *it.next().ok_or_else(|| {
                MeshHaloError::comm(src, "truncated interested-rank record".to_string())
            })? as usize;
            let entry = vertex_ranks.entry(vertex).or_default();
            for _ in 0..count {
                let r = *it.next().ok_or_else(|| {
                    MeshHaloError::comm(src, "truncated interested-rank record".to_string())
                })?;
                entry.push(r as usize);
            }
        }
    }

    // Union interested ranks over each owned cell's interface vertices.
    let num_local_cells = map_c.size_local();
    let globals: Vec<u64> = vertex_ranks.keys().copied().collect();
    let locals = map_v.global_to_local(&globals)?;
    let mut cell_dests: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); num_local_cells];
    for (local, ranks) in locals.iter().zip(vertex_ranks.values()) {
        for &cell in v_to_c.links(*local as usize) {
            if (cell as usize) < num_local_cells {
                cell_dests[cell as usize].extend(ranks.iter().copied());
            }
        }
    }

    let mut dests = Vec::with_capacity(num_local_cells);
    for mut set in cell_dests {
        set.remove(&my_rank);
        let mut list = Vec::with_capacity(set.len() + 1);
        list.push(my_rank);
        list.extend(set);
        dests.push(list);
    }
    Ok(AdjacencyList::from_nested(dests))
}

/// Full three-phase augmentation: compute destinations, then rebuild the
/// mesh through the [`MeshRebuilder`] collaborator with shared-facet
/// ghosting. Returns the rebuilt mesh and the destination list actually
/// used, as an observable artifact.
///
/// `coords` holds `gdim` interleaved coordinates per local vertex (owned
/// block first, then ghosts); only the owned block is forwarded. Shape and
/// configuration errors are raised before any collective call.
pub fn add_ghost_layer<C: Communicator, R: MeshRebuilder<C>>(
    comm: &C,
    topology: &Topology,
    gdim: usize,
    coords: &[f64],
    rebuilder: &R,
) -> Result<(R::Mesh, AdjacencyList<usize>), MeshHaloError> {
    let tdim = topology.dim();
    let map_v = topology.index_map(0)?;
    let map_c = topology.index_map(tdim)?;
    if gdim == 0 || gdim < tdim {
        return Err(MeshHaloError::Unsupported(format!(
            "geometric dimension {gdim} below topological dimension {tdim}"
        )));
    }
    let num_vertices = map_v.size_local() + map_v.num_ghosts();
    if coords.len() != num_vertices * gdim {
        return Err(MeshHaloError::ShapeMismatch {
            what: "vertex coordinates",
            expected: num_vertices * gdim,
            found: coords.len(),
        });
    }

    log::info!(
        "adding ghost layer: {} owned cells, {} owned vertices on rank {}",
        map_c.size_local(),
        map_v.size_local(),
        comm.rank()
    );
    let dest = compute_ghost_destinations(comm, topology)?;

    // Phase 3: owned cell connectivity in global vertex indices, owned
    // coordinate block, fixed destination list.
    let cv = topology.connectivity(tdim, 0)?;
    let num_local_cells = map_c.size_local();
    let mut cell_vertices = Vec::with_capacity(num_local_cells);
    for c in 0..num_local_cells {
        cell_vertices.push(map_v.local_to_global(cv.links(c))?);
    }
    let cell_vertices = AdjacencyList::from_nested(cell_vertices);
    let x_owned = coords[..map_v.size_local() * gdim].to_vec();

    let mesh = rebuilder.create_mesh(
        comm,
        cell_vertices,
        gdim,
        x_owned,
        GhostMode::SharedFacet,
        &dest,
    )?;
    Ok((mesh, dest))
}
