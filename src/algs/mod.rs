//! Re-export public algorithms.

pub mod communicator;
pub mod dual_graph;
pub mod exchange;
pub mod ghost_layer;
pub mod partition;
pub mod rebuild;
pub mod wire;

pub use dual_graph::build_dual_graph;
pub use ghost_layer::{add_ghost_layer, compute_ghost_destinations};
pub use partition::partition_cells;
