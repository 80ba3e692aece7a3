//! Multi-rank ghost layer augmentation: interface discovery, owner
//! aggregation and the rebuild hand-off.

mod common;

use std::sync::Arc;

use common::run_ranks;
use mesh_halo::prelude::*;
use serial_test::serial;

/// Unit square split along the diagonal, one triangle per rank. Rank 0
/// owns vertices 0..3, rank 1 owns vertex 3.
fn split_square(comm: &RayonComm) -> Topology {
    let (vmap, cells) = match comm.rank() {
        0 => (
            IndexMap::new(comm, 3, vec![], vec![]).unwrap(),
            AdjacencyList::from_flat(vec![0u32, 1, 2], 3).unwrap(),
        ),
        _ => (
            IndexMap::new(comm, 1, vec![1, 2], vec![0, 0]).unwrap(),
            // globals (1, 2, 3) in local numbering
            AdjacencyList::from_flat(vec![1u32, 2, 0], 3).unwrap(),
        ),
    };
    let cmap = IndexMap::new(comm, 1, vec![], vec![]).unwrap();
    Topology::new(CellType::Triangle, cells, Arc::new(vmap), Arc::new(cmap)).unwrap()
}

#[test]
#[serial]
fn split_square_each_rank_ghosts_the_other() {
    let dests = run_ranks(2, |comm| {
        let topo = split_square(&comm);
        compute_ghost_destinations(&comm, &topo).unwrap()
    });

    assert_eq!(dests[0].num_nodes(), 1);
    assert_eq!(dests[0].links(0), &[0, 1]);
    assert_eq!(dests[1].links(0), &[1, 0]);
}

#[test]
#[serial]
fn split_square_rebuild_receives_global_connectivity() {
    let out = run_ranks(2, |comm| {
        let topo = split_square(&comm);
        let coords = match comm.rank() {
            0 => vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            // owned (1, 1) then ghosts (1, 0) and (0, 1)
            _ => vec![1.0, 1.0, 1.0, 0.0, 0.0, 1.0],
        };
        let (chunk, dest) =
            add_ghost_layer(&comm, &topo, 2, &coords, &RawChunkRebuilder).unwrap();
        (chunk, dest)
    });

    let (chunk0, dest0) = &out[0];
    assert_eq!(chunk0.cells.links(0), &[0, 1, 2]);
    assert_eq!(chunk0.coords, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    assert_eq!(chunk0.ghost_mode, GhostMode::SharedFacet);
    assert_eq!(&chunk0.destinations, dest0);
    assert_eq!(dest0.links(0), &[0, 1]);

    // only the owned coordinate block travels, in global vertex indices
    let (chunk1, dest1) = &out[1];
    assert_eq!(chunk1.cells.links(0), &[1, 2, 3]);
    assert_eq!(chunk1.coords, vec![1.0, 1.0]);
    assert_eq!(dest1.links(0), &[1, 0]);
}

/// 2x2 quad grid, one quad per rank, all four meeting at the center
/// vertex. Global vertex numbering is by owner: rank 0 owns 0..4 (its
/// quad's corners, center is 3), rank 1 owns {4, 5}, rank 2 owns {6, 7},
/// rank 3 owns {8}.
fn quad_corner(comm: &RayonComm) -> Topology {
    let (vmap, cells) = match comm.rank() {
        0 => (
            IndexMap::new(comm, 4, vec![], vec![]).unwrap(),
            AdjacencyList::from_flat(vec![0u32, 1, 2, 3], 4).unwrap(),
        ),
        1 => (
            IndexMap::new(comm, 2, vec![1, 3], vec![0, 0]).unwrap(),
            // globals (1, 4, 3, 5)
            AdjacencyList::from_flat(vec![2u32, 0, 3, 1], 4).unwrap(),
        ),
        2 => (
            IndexMap::new(comm, 2, vec![2, 3], vec![0, 0]).unwrap(),
            // globals (2, 3, 6, 7)
            AdjacencyList::from_flat(vec![2u32, 3, 0, 1], 4).unwrap(),
        ),
        _ => (
            IndexMap::new(comm, 1, vec![3, 5, 7], vec![0, 1, 2]).unwrap(),
            // globals (3, 5, 7, 8)
            AdjacencyList::from_flat(vec![1u32, 2, 3, 0], 4).unwrap(),
        ),
    };
    let cmap = IndexMap::new(comm, 1, vec![], vec![]).unwrap();
    Topology::new(
        CellType::Quadrilateral,
        cells,
        Arc::new(vmap),
        Arc::new(cmap),
    )
    .unwrap()
}

#[test]
#[serial]
fn corner_vertex_completes_the_star_on_every_rank() {
    let dests = run_ranks(4, |comm| {
        let topo = quad_corner(&comm);
        compute_ghost_destinations(&comm, &topo).unwrap()
    });

    // every quad touches the center vertex, so every rank must ship its
    // cell to the three others: interested set of size 4, owner first
    assert_eq!(dests[0].links(0), &[0, 1, 2, 3]);
    assert_eq!(dests[1].links(0), &[1, 0, 2, 3]);
    assert_eq!(dests[2].links(0), &[2, 0, 1, 3]);
    assert_eq!(dests[3].links(0), &[3, 0, 1, 2]);

    // after redistribution each rank gains one ghost cell per other rank
    for (rank, dest) in dests.iter().enumerate() {
        let incoming: usize = dests
            .iter()
            .enumerate()
            .filter(|(other, d)| *other != rank && d.links(0).contains(&rank))
            .count();
        assert_eq!(incoming, 3, "rank {rank}");
        assert_eq!(dest.num_links(0), 4);
    }
}

#[test]
#[serial]
fn disconnected_ranks_exchange_empty_payloads() {
    // two triangles with no shared vertices: every collective runs with
    // empty payloads and the destination lists stay owner-only
    let dests = run_ranks(2, |comm| {
        let vmap = IndexMap::new(&comm, 3, vec![], vec![]).unwrap();
        let cmap = IndexMap::new(&comm, 1, vec![], vec![]).unwrap();
        let cells = AdjacencyList::from_flat(vec![0u32, 1, 2], 3).unwrap();
        let topo =
            Topology::new(CellType::Triangle, cells, Arc::new(vmap), Arc::new(cmap)).unwrap();
        compute_ghost_destinations(&comm, &topo).unwrap()
    });

    assert_eq!(dests[0].links(0), &[0]);
    assert_eq!(dests[1].links(0), &[1]);
}

#[test]
#[serial]
fn rerun_on_augmented_topology_is_a_fixed_point() {
    // the split square after augmentation: each rank now also holds the
    // other rank's triangle as a ghost cell (plus its vertices)
    let dests = run_ranks(2, |comm| {
        let (vmap, cmap, cells) = match comm.rank() {
            0 => (
                IndexMap::new(&comm, 3, vec![3], vec![1]).unwrap(),
                IndexMap::new(&comm, 1, vec![1], vec![1]).unwrap(),
                // owned (0, 1, 2), ghost (1, 2, 3)
                AdjacencyList::from_flat(vec![0u32, 1, 2, 1, 2, 3], 3).unwrap(),
            ),
            _ => (
                IndexMap::new(&comm, 1, vec![1, 2, 0], vec![0, 0, 0]).unwrap(),
                IndexMap::new(&comm, 1, vec![0], vec![0]).unwrap(),
                // owned (1, 2, 3), ghost (0, 1, 2) in local numbering
                AdjacencyList::from_flat(vec![1u32, 2, 0, 3, 1, 2], 3).unwrap(),
            ),
        };
        let topo =
            Topology::new(CellType::Triangle, cells, Arc::new(vmap), Arc::new(cmap)).unwrap();
        compute_ghost_destinations(&comm, &topo).unwrap()
    });

    // identical to the pre-augmentation destinations: owned cells only,
    // same interested sets
    assert_eq!(dests[0].num_nodes(), 1);
    assert_eq!(dests[0].links(0), &[0, 1]);
    assert_eq!(dests[1].num_nodes(), 1);
    assert_eq!(dests[1].links(0), &[1, 0]);
}
