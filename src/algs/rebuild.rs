//! Mesh rebuilding boundary.
//!
//! Actual mesh construction (redistribution of cells and coordinates,
//! building the new index maps) is an external collaborator; this crate
//! only computes the destination list driving it. [`MeshRebuilder`] is that
//! boundary: the already-computed destinations take the role the original
//! pipeline gives a partitioner callback, wrapped as a fixed list that
//! ignores any recomputation arguments.
//!
//! [`RawChunkRebuilder`] is the provided implementation: it bundles the
//! would-be inputs into a [`RawMeshChunk`] so callers (and tests) can
//! inspect exactly what a real mesh builder would receive.

use crate::algs::communicator::Communicator;
use crate::mesh_error::MeshHaloError;
use crate::topology::GhostMode;
use crate::topology::adjacency::AdjacencyList;

/// External mesh-construction capability.
pub trait MeshRebuilder<C: Communicator> {
    /// Opaque mesh type produced by the collaborator.
    type Mesh;

    /// Build the redistributed mesh from owned-cell connectivity (global
    /// vertex indices), the owned coordinate block (`gdim` interleaved
    /// values per vertex) and the fixed per-cell destination list.
    fn create_mesh(
        &self,
        comm: &C,
        cells: AdjacencyList<u64>,
        gdim: usize,
        coords: Vec<f64>,
        ghost_mode: GhostMode,
        destinations: &AdjacencyList<usize>,
    ) -> Result<Self::Mesh, MeshHaloError>;
}

/// The raw inputs a mesh builder receives, bundled for inspection.
#[derive(Clone, Debug, PartialEq)]
pub struct RawMeshChunk {
    pub cells: AdjacencyList<u64>,
    pub gdim: usize,
    pub coords: Vec<f64>,
    pub ghost_mode: GhostMode,
    pub destinations: AdjacencyList<usize>,
}

/// Rebuilder that captures its inputs instead of building a mesh.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawChunkRebuilder;

impl<C: Communicator> MeshRebuilder<C> for RawChunkRebuilder {
    type Mesh = RawMeshChunk;

    fn create_mesh(
        &self,
        _comm: &C,
        cells: AdjacencyList<u64>,
        gdim: usize,
        coords: Vec<f64>,
        ghost_mode: GhostMode,
        destinations: &AdjacencyList<usize>,
    ) -> Result<RawMeshChunk, MeshHaloError> {
        if coords.len() % gdim != 0 {
            return Err(MeshHaloError::ShapeMismatch {
                what: "coordinate block",
                expected: gdim,
                found: coords.len(),
            });
        }
        Ok(RawMeshChunk {
            cells,
            gdim,
            coords,
            ghost_mode,
            destinations: destinations.clone(),
        })
    }
}
