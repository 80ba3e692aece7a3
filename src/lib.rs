//! # mesh-halo
//!
//! mesh-halo is the distributed mesh-topology engine of a finite-element
//! stack: it assigns global ownership of mesh entities across ranks,
//! builds the cell dual graph feeding a pluggable partitioner, and
//! augments a partitioned mesh with a consistent ghost (halo) layer
//! through a three-phase neighbor-only exchange protocol.
//!
//! ## Features
//! - [`topology::IndexMap`]: per-rank owned/ghost bookkeeping with O(1)
//!   global↔local translation and first-class forward/reverse neighbor
//!   groups
//! - [`algs::build_dual_graph`]: distributed cell-adjacency graph via
//!   canonical facet-key matching with postmaster routing
//! - [`algs::partition::Partitioner`]: opaque partitioning capability
//!   (round-robin stub built in, METIS behind `metis-support`)
//! - [`algs::add_ghost_layer`]: three-phase interface-vertex protocol
//!   producing a shared-facet-complete destination list
//! - Pluggable communication backends: serial, thread-per-rank, MPI
//!   behind `mpi-support`
//!
//! ## Execution model
//!
//! SPMD: every rank runs the identical protocol code path and blocks at
//! the boundary of each neighbor-exchange collective. Within one phase,
//! size exchange strictly precedes payload exchange; phases never
//! pipeline. Intra-process structural errors are raised *before* any
//! collective is issued; once a collective has started, failure is
//! process-group-wide and fatal.
//!
//! Everything downstream of the destination list — basis tabulation,
//! assembly, geometry queries, mesh storage — is an external collaborator
//! reached through the [`algs::rebuild::MeshRebuilder`] boundary.

pub mod algs;
pub mod mesh_error;
pub mod topology;

/// A convenient prelude to import the most-used traits & types.
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, RayonComm, Wait};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::dual_graph::{GraphInfo, build_dual_graph};
    pub use crate::algs::ghost_layer::{add_ghost_layer, compute_ghost_destinations};
    #[cfg(feature = "metis-support")]
    pub use crate::algs::partition::MetisPartitioner;
    pub use crate::algs::partition::{Partitioner, RoundRobinPartitioner, partition_cells};
    pub use crate::algs::rebuild::{MeshRebuilder, RawChunkRebuilder, RawMeshChunk};
    pub use crate::mesh_error::MeshHaloError;
    pub use crate::topology::adjacency::AdjacencyList;
    pub use crate::topology::cell_type::CellType;
    pub use crate::topology::index_map::{Direction, IndexMap, NeighborGroup};
    pub use crate::topology::{GhostMode, Topology};
}
