//! Per-rank bookkeeping of owned vs. ghosted global indices.
//!
//! An [`IndexMap`] owns the bidirectional mapping between 64-bit global
//! indices and 32-bit local indices for one entity dimension. Local indices
//! are a contiguous owned block `[0, size_local)` followed by the ghost
//! block `[size_local, size_local + num_ghosts)`; owned global indices are
//! the contiguous range `local_range`, assigned by an exclusive scan of
//! per-rank owned counts. The map is immutable after construction: a new
//! mesh generation builds a new map.
//!
//! Construction performs the ghost→claimed-owner consistency exchange. The
//! owner side verifies every claim against its own range (a mismatch is a
//! fatal [`MeshHaloError::ConsistencyViolation`]) and records which ranks
//! ghost each of its owned indices (`shared_indices`). The two derived
//! communication relations are exposed as first-class [`NeighborGroup`]s:
//! *forward* (owner → ghost holder) and *reverse* (holder → owner). The
//! two directions have different participant sets and must not be
//! conflated.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use itertools::Itertools;

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::{all_to_allv_u64, exclusive_scan_u64};
use crate::mesh_error::MeshHaloError;

/// Orientation of a neighbor-only collective.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    /// Owner → every rank holding the index as a ghost.
    Forward,
    /// Ghost holder → owner.
    Reverse,
}

/// An explicit graph of participating ranks for one exchange direction.
///
/// `sources` are the ranks this rank receives from, `destinations` the
/// ranks it sends to. Both lists are sorted and duplicate-free. Groups are
/// computed fresh from ghost/shared state whenever an index map is built;
/// they are never a hardcoded topology.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NeighborGroup {
    sources: Vec<usize>,
    destinations: Vec<usize>,
}

impl NeighborGroup {
    pub fn new(sources: Vec<usize>, destinations: Vec<usize>) -> Self {
        debug_assert!(sources.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(destinations.windows(2).all(|w| w[0] < w[1]));
        Self {
            sources,
            destinations,
        }
    }

    /// Ranks this rank receives from in this direction.
    pub fn sources(&self) -> &[usize] {
        &self.sources
    }

    /// Ranks this rank sends to in this direction.
    pub fn destinations(&self) -> &[usize] {
        &self.destinations
    }

    /// True when this rank neither sends nor receives in this direction.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.destinations.is_empty()
    }
}

/// Bidirectional global↔local index mapping for one entity dimension.
#[derive(Clone, Debug)]
pub struct IndexMap {
    rank: usize,
    size_local: usize,
    local_range: (u64, u64),
    size_global: u64,
    ghosts: Vec<u64>,
    ghost_owners: Vec<usize>,
    ghost_pos: HashMap<u64, u32>,
    shared: BTreeMap<u32, Vec<usize>>,
    forward: NeighborGroup,
    reverse: NeighborGroup,
}

impl IndexMap {
    /// Build the map and run the all-to-all consistency exchange.
    ///
    /// `ghosts[i]` is the global index at local position `size_local + i`,
    /// `ghost_owners[i]` its claimed owning rank. Local usage errors are
    /// raised before any collective call; ownership claims a remote rank
    /// cannot confirm surface as `ConsistencyViolation` *on the owner*.
    pub fn new<C: Communicator>(
        comm: &C,
        size_local: usize,
        ghosts: Vec<u64>,
        ghost_owners: Vec<usize>,
    ) -> Result<Self, MeshHaloError> {
        let (rank, nranks) = (comm.rank(), comm.size());
        if ghosts.len() != ghost_owners.len() {
            return Err(MeshHaloError::ShapeMismatch {
                what: "ghost owner ranks",
                expected: ghosts.len(),
                found: ghost_owners.len(),
            });
        }
        for (&g, &owner) in ghosts.iter().zip(&ghost_owners) {
            if owner == rank {
                return Err(MeshHaloError::ConsistencyViolation(format!(
                    "ghost {g} claims this rank ({rank}) as owner"
                )));
            }
            if owner >= nranks {
                return Err(MeshHaloError::InvalidNeighbor(owner));
            }
        }
        if !ghosts.iter().all_unique() {
            return Err(MeshHaloError::ConsistencyViolation(
                "duplicate global index in ghost list".into(),
            ));
        }

        let (offset, size_global) =
            exclusive_scan_u64(comm, size_local as u64, CommTag::OWNERSHIP_SIZES)?;
        let local_range = (offset, offset + size_local as u64);

        // Report each ghost to its claimed owner.
        let mut claims: Vec<Vec<u64>> = vec![Vec::new(); nranks];
        for (&g, &owner) in ghosts.iter().zip(&ghost_owners) {
            claims[owner].push(g);
        }
        let confirmed = all_to_allv_u64(comm, claims, CommTag::OWNERSHIP_CLAIMS)?;

        // Owner side: verify every claim and record the sharing ranks.
        let mut shared: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (src, indices) in confirmed.iter().enumerate() {
            for &g in indices {
                if g < local_range.0 || g >= local_range.1 {
                    return Err(MeshHaloError::ConsistencyViolation(format!(
                        "rank {src} claims this rank ({rank}) owns {g}, \
                         which is outside its range {local_range:?}"
                    )));
                }
                shared.entry((g - local_range.0) as u32).or_default().push(src);
            }
        }
        for ranks in shared.values_mut() {
            ranks.sort_unstable();
            ranks.dedup();
        }

        let ghost_pos: HashMap<u64, u32> = ghosts
            .iter()
            .enumerate()
            .map(|(i, &g)| (g, (size_local + i) as u32))
            .collect();

        let holders: Vec<usize> = shared
            .values()
            .flatten()
            .copied()
            .sorted_unstable()
            .dedup()
            .collect();
        let owners: Vec<usize> = ghost_owners
            .iter()
            .copied()
            .sorted_unstable()
            .dedup()
            .collect();
        // Forward data flows owner → holder: we receive from the owners of
        // our ghosts and send to the holders of our owned indices.
        let forward = NeighborGroup::new(owners.clone(), holders.clone());
        let reverse = NeighborGroup::new(holders, owners);

        log::debug!(
            "IndexMap rank {rank}: {size_local} owned, {} ghosts, {} forward dests, {} reverse dests",
            ghosts.len(),
            forward.destinations().len(),
            reverse.destinations().len()
        );

        Ok(Self {
            rank,
            size_local,
            local_range,
            size_global,
            ghosts,
            ghost_owners,
            ghost_pos,
            shared,
            forward,
            reverse,
        })
    }

    /// Number of locally owned indices.
    pub fn size_local(&self) -> usize {
        self.size_local
    }

    /// Number of ghost indices.
    pub fn num_ghosts(&self) -> usize {
        self.ghosts.len()
    }

    /// Owned global range `[start, end)`.
    pub fn local_range(&self) -> (u64, u64) {
        self.local_range
    }

    /// Total number of indices across all ranks.
    pub fn size_global(&self) -> u64 {
        self.size_global
    }

    /// Ghost global indices, aligned with the ghost local block.
    pub fn ghosts(&self) -> &[u64] {
        &self.ghosts
    }

    /// Owning rank per ghost, parallel to [`Self::ghosts`].
    pub fn ghost_owners(&self) -> &[usize] {
        &self.ghost_owners
    }

    /// Owned local indices ghosted elsewhere, with the ranks holding them.
    pub fn shared_indices(&self) -> &BTreeMap<u32, Vec<usize>> {
        &self.shared
    }

    /// The neighbor group of the given orientation.
    pub fn comm(&self, dir: Direction) -> &NeighborGroup {
        match dir {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }

    /// Translate local indices (owned or ghost) to global indices.
    pub fn local_to_global(&self, local: &[u32]) -> Result<Vec<u64>, MeshHaloError> {
        local
            .iter()
            .map(|&l| {
                let l_us = l as usize;
                if l_us < self.size_local {
                    Ok(self.local_range.0 + l as u64)
                } else if l_us < self.size_local + self.ghosts.len() {
                    Ok(self.ghosts[l_us - self.size_local])
                } else {
                    Err(MeshHaloError::InvalidLocalIndex(
                        l,
                        self.size_local,
                        self.ghosts.len(),
                    ))
                }
            })
            .collect()
    }

    /// Translate global indices to local. Fails with
    /// [`MeshHaloError::GlobalIndexNotFound`] for indices neither owned nor
    /// ghosted here.
    pub fn global_to_local(&self, global: &[u64]) -> Result<Vec<u32>, MeshHaloError> {
        global
            .iter()
            .map(|&g| {
                if g >= self.local_range.0 && g < self.local_range.1 {
                    Ok((g - self.local_range.0) as u32)
                } else {
                    self.ghost_pos
                        .get(&g)
                        .copied()
                        .ok_or(MeshHaloError::GlobalIndexNotFound(g))
                }
            })
            .collect()
    }

    /// Owning rank of the ghost at ghost-block position `pos`.
    pub fn ghost_owner(&self, pos: usize) -> usize {
        self.ghost_owners[pos]
    }

    /// Rank this map was built on.
    pub fn rank(&self) -> usize {
        self.rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn serial_map_has_no_neighbors() {
        let map = IndexMap::new(&NoComm, 5, vec![], vec![]).unwrap();
        assert_eq!(map.size_local(), 5);
        assert_eq!(map.local_range(), (0, 5));
        assert_eq!(map.size_global(), 5);
        assert!(map.comm(Direction::Forward).is_empty());
        assert!(map.comm(Direction::Reverse).is_empty());
        assert_eq!(map.local_to_global(&[0, 4]).unwrap(), vec![0, 4]);
        assert_eq!(map.global_to_local(&[3]).unwrap(), vec![3]);
        assert!(matches!(
            map.global_to_local(&[7]),
            Err(MeshHaloError::GlobalIndexNotFound(7))
        ));
    }

    #[test]
    fn self_owned_ghost_is_rejected_before_comm() {
        let err = IndexMap::new(&NoComm, 2, vec![9], vec![0]).unwrap_err();
        assert!(matches!(err, MeshHaloError::ConsistencyViolation(_)));
    }

    #[test]
    fn mismatched_owner_list_is_shape_error() {
        let err = IndexMap::new(&NoComm, 2, vec![9], vec![]).unwrap_err();
        assert!(matches!(err, MeshHaloError::ShapeMismatch { .. }));
    }

    #[test]
    fn out_of_range_local_index() {
        let map = IndexMap::new(&NoComm, 2, vec![], vec![]).unwrap();
        assert!(matches!(
            map.local_to_global(&[2]),
            Err(MeshHaloError::InvalidLocalIndex(2, 2, 0))
        ));
    }
}
