//! Distributed partitioning through the pluggable partitioner boundary.

mod common;

use common::run_ranks;
use mesh_halo::prelude::*;
use serial_test::serial;

#[test]
#[serial]
fn round_robin_owner_only_across_ranks() {
    // unit square diagonal split, one triangle per rank
    let dests = run_ranks(2, |comm| {
        let cells = match comm.rank() {
            0 => AdjacencyList::from_flat(vec![0u64, 1, 2], 3).unwrap(),
            _ => AdjacencyList::from_flat(vec![1u64, 2, 3], 3).unwrap(),
        };
        partition_cells(
            &comm,
            2,
            CellType::Triangle,
            &cells,
            GhostMode::None,
            &RoundRobinPartitioner,
        )
        .unwrap()
    });

    // owner = global cell index mod 2; no ghosting requested
    assert_eq!(dests[0].links(0), &[0]);
    assert_eq!(dests[1].links(0), &[1]);
}

#[test]
#[serial]
fn shared_facet_ghosting_adds_remote_owners() {
    // strip of four triangles, two per rank; global cells 0..4, owners
    // alternate under the round-robin rule
    let dests = run_ranks(2, |comm| {
        let cells = match comm.rank() {
            0 => AdjacencyList::from_flat(vec![0u64, 1, 2, 1, 2, 3], 3).unwrap(),
            _ => AdjacencyList::from_flat(vec![1u64, 3, 4, 3, 4, 5], 3).unwrap(),
        };
        partition_cells(
            &comm,
            2,
            CellType::Triangle,
            &cells,
            GhostMode::SharedFacet,
            &RoundRobinPartitioner,
        )
        .unwrap()
    });

    // each cell additionally goes to the owners of its dual-graph
    // neighbors, cross-rank edges included
    assert_eq!(dests[0].links(0), &[0, 1]); // cell 0: neighbor 1 -> rank 1
    assert_eq!(dests[0].links(1), &[1, 0]); // cell 1: neighbors 0, 2 -> rank 0
    assert_eq!(dests[1].links(0), &[0, 1]); // cell 2: neighbors 1, 3 -> rank 1
    assert_eq!(dests[1].links(1), &[1, 0]); // cell 3: neighbor 2 -> rank 0
}

#[test]
#[serial]
fn empty_rank_gets_empty_destination_list() {
    let dests = run_ranks(2, |comm| {
        let cells = match comm.rank() {
            0 => AdjacencyList::from_flat(vec![0u64, 1, 2, 1, 2, 3], 3).unwrap(),
            _ => AdjacencyList::<u64>::empty(),
        };
        partition_cells(
            &comm,
            2,
            CellType::Triangle,
            &cells,
            GhostMode::None,
            &RoundRobinPartitioner,
        )
        .unwrap()
    });

    assert_eq!(dests[0].num_nodes(), 2);
    assert_eq!(dests[1].num_nodes(), 0);
}
