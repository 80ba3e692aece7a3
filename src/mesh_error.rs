//! MeshHaloError: unified error type for mesh-halo public APIs.
//!
//! Every fallible operation in this crate returns `Result<_, MeshHaloError>`.
//! Errors split into three families:
//!
//! - **Consistency violations** (`ConsistencyViolation`): the distributed
//!   state disagrees across ranks (a ghost whose claimed owner does not own
//!   it, a reported interface vertex outside the receiver's owned range).
//!   These are fatal for the whole process group; there is no partial
//!   recovery once a collective has started.
//! - **Usage errors** (`ShapeMismatch`, `InvalidLocalIndex`,
//!   `GlobalIndexNotFound`, `MissingConnectivity`, `MissingIndexMap`,
//!   `InvalidNeighbor`): local programming errors, detected and raised
//!   *before* any collective call so peer ranks are never left waiting.
//! - **Configuration errors** (`Unsupported`): a cell type, dimension or
//!   ghost mode this engine does not handle, reported before communication
//!   starts.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for mesh-halo operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshHaloError {
    /// Distributed state is inconsistent across ranks. Fatal for the group.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),
    /// An array length disagrees with the expected entity count.
    #[error("shape mismatch in {what}: expected {expected}, got {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A local index is outside `[0, size_local + num_ghosts)`.
    #[error("local index {0} out of range (size_local={1}, num_ghosts={2})")]
    InvalidLocalIndex(u32, usize, usize),
    /// A global index is neither owned nor ghosted on this rank.
    #[error("global index {0} not found on this rank")]
    GlobalIndexNotFound(u64),
    /// Requested connectivity has not been built; call `ensure_connectivity`.
    #[error("connectivity ({0},{1}) not available; call ensure_connectivity first")]
    MissingConnectivity(usize, usize),
    /// No index map is attached for the requested dimension.
    #[error("no index map for dimension {0}")]
    MissingIndexMap(usize),
    /// A send targets a rank outside the neighbor group.
    #[error("rank {0} is not a member of the neighbor group")]
    InvalidNeighbor(usize),
    /// Unsupported cell type, dimension or ghost mode. Raised before any
    /// communication starts.
    #[error("unsupported configuration: {0}")]
    Unsupported(String),
    /// Transport-level failure talking to a neighbor rank.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<CommErrorDetail>,
    },
    /// Graph partitioner backend failure.
    #[error("partitioner failed: {0}")]
    PartitionFailed(String),
}

/// Payload of [`MeshHaloError::CommError`]; boxed to keep the enum small.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CommErrorDetail(pub String);

impl MeshHaloError {
    /// Shorthand for a [`MeshHaloError::CommError`] from a message.
    pub fn comm(neighbor: usize, msg: impl Into<String>) -> Self {
        MeshHaloError::CommError {
            neighbor,
            source: Box::new(CommErrorDetail(msg.into())),
        }
    }
}
