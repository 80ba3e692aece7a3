//! Cell type metadata and canonical facet layouts.
//!
//! Tensor-product vertex ordering is used for quadrilaterals and hexahedra
//! (vertex `i` has coordinates given by the binary digits of `i`). Facet
//! tables list, for facet `f`, the cell-local vertex indices that span it.
//! Dual-graph facet keys are *sorted* vertex tuples, so only the vertex
//! subsets matter here, not their orientation.

use crate::mesh_error::MeshHaloError;

/// Cell types supported by the topology engine.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CellType {
    /// 0D vertex.
    Vertex,
    /// 1D segment/edge.
    Segment,
    /// 2D simplex.
    Triangle,
    /// 2D tensor-product cell.
    Quadrilateral,
    /// 3D simplex.
    Tetrahedron,
    /// 3D tensor-product cell.
    Hexahedron,
}

const SEGMENT_FACETS: [&[usize]; 2] = [&[0], &[1]];
const TRIANGLE_FACETS: [&[usize]; 3] = [&[1, 2], &[0, 2], &[0, 1]];
const QUAD_FACETS: [&[usize]; 4] = [&[0, 1], &[2, 3], &[0, 2], &[1, 3]];
const TET_FACETS: [&[usize]; 4] = [&[1, 2, 3], &[0, 2, 3], &[0, 1, 3], &[0, 1, 2]];
const HEX_FACETS: [&[usize]; 6] = [
    &[0, 1, 2, 3],
    &[4, 5, 6, 7],
    &[0, 1, 4, 5],
    &[2, 3, 6, 7],
    &[0, 2, 4, 6],
    &[1, 3, 5, 7],
];

impl CellType {
    /// Topological dimension of the cell.
    pub fn dimension(self) -> usize {
        match self {
            CellType::Vertex => 0,
            CellType::Segment => 1,
            CellType::Triangle | CellType::Quadrilateral => 2,
            CellType::Tetrahedron | CellType::Hexahedron => 3,
        }
    }

    /// Number of vertices spanning the cell.
    pub fn num_vertices(self) -> usize {
        match self {
            CellType::Vertex => 1,
            CellType::Segment => 2,
            CellType::Triangle => 3,
            CellType::Quadrilateral | CellType::Tetrahedron => 4,
            CellType::Hexahedron => 8,
        }
    }

    /// Number of facets (codimension-1 entities).
    pub fn num_facets(self) -> usize {
        match self {
            CellType::Vertex => 0,
            CellType::Segment => 2,
            CellType::Triangle => 3,
            CellType::Quadrilateral => 4,
            CellType::Tetrahedron => 4,
            CellType::Hexahedron => 6,
        }
    }

    /// Cell-local vertex indices of facet `f`.
    ///
    /// # Panics
    /// Panics if `f >= self.num_facets()`.
    pub fn facet_vertices(self, f: usize) -> &'static [usize] {
        match self {
            CellType::Vertex => panic!("vertices have no facets"),
            CellType::Segment => SEGMENT_FACETS[f],
            CellType::Triangle => TRIANGLE_FACETS[f],
            CellType::Quadrilateral => QUAD_FACETS[f],
            CellType::Tetrahedron => TET_FACETS[f],
            CellType::Hexahedron => HEX_FACETS[f],
        }
    }

    /// Type of the cell's facets.
    pub fn facet_type(self) -> Result<CellType, MeshHaloError> {
        match self {
            CellType::Vertex => Err(MeshHaloError::Unsupported(
                "vertices have no facets".into(),
            )),
            CellType::Segment => Ok(CellType::Vertex),
            CellType::Triangle | CellType::Quadrilateral => Ok(CellType::Segment),
            CellType::Tetrahedron => Ok(CellType::Triangle),
            CellType::Hexahedron => Ok(CellType::Quadrilateral),
        }
    }

    /// Infer the cell type from a topological dimension and vertex count.
    pub fn from_dimension(tdim: usize, num_vertices: usize) -> Result<Self, MeshHaloError> {
        match (tdim, num_vertices) {
            (0, 1) => Ok(CellType::Vertex),
            (1, 2) => Ok(CellType::Segment),
            (2, 3) => Ok(CellType::Triangle),
            (2, 4) => Ok(CellType::Quadrilateral),
            (3, 4) => Ok(CellType::Tetrahedron),
            (3, 8) => Ok(CellType::Hexahedron),
            _ => Err(MeshHaloError::Unsupported(format!(
                "no cell type with dimension {tdim} and {num_vertices} vertices"
            ))),
        }
    }
}
