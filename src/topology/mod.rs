//! Mesh topology abstractions: index maps, adjacency storage, cell types
//! and the local [`Topology`] collaborator.
//!
//! [`Topology`] holds one rank's view of a distributed mesh: the
//! cell→vertex connectivity (owned cells first, then ghost cells), an
//! [`index_map::IndexMap`] per entity dimension, and derived connectivities
//! built on request through the explicit `ensure_entities` /
//! `ensure_connectivity` contract — nothing is created behind the caller's
//! back, and a read of a connectivity that was never ensured is a
//! [`MeshHaloError::MissingConnectivity`].

pub mod adjacency;
pub mod cell_type;
pub mod index_map;

pub use adjacency::AdjacencyList;
pub use cell_type::CellType;
pub use index_map::{Direction, IndexMap, NeighborGroup};

use std::sync::Arc;

use hashbrown::HashMap as FastMap;
use parking_lot::RwLock;

use crate::mesh_error::MeshHaloError;

/// Ghosting requested from the partitioning pipeline.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum GhostMode {
    /// Owner-only distribution, no ghost cells.
    None,
    /// Every rank additionally receives the neighbor cells sharing a facet
    /// with one of its own.
    SharedFacet,
}

/// One rank's local mesh topology.
pub struct Topology {
    cell_type: CellType,
    tdim: usize,
    vertex_map: Arc<IndexMap>,
    cell_map: Arc<IndexMap>,
    // (d0, d1) → connectivity; interior-mutable so ensure_* takes &self and
    // completed entries can be read concurrently without locking discipline
    // leaking to callers.
    connectivity: RwLock<FastMap<(usize, usize), Arc<AdjacencyList<u32>>>>,
}

impl Topology {
    /// Build a topology from local cell→vertex connectivity (local vertex
    /// indices; owned cells first, ghost cells after) and the index maps of
    /// the vertex and cell dimensions.
    pub fn new(
        cell_type: CellType,
        cell_vertex: AdjacencyList<u32>,
        vertex_map: Arc<IndexMap>,
        cell_map: Arc<IndexMap>,
    ) -> Result<Self, MeshHaloError> {
        let tdim = cell_type.dimension();
        if tdim == 0 {
            return Err(MeshHaloError::Unsupported(
                "topology requires cells of dimension >= 1".into(),
            ));
        }
        let num_cells = cell_map.size_local() + cell_map.num_ghosts();
        if cell_vertex.num_nodes() != num_cells {
            return Err(MeshHaloError::ShapeMismatch {
                what: "cell-vertex connectivity rows",
                expected: num_cells,
                found: cell_vertex.num_nodes(),
            });
        }
        let nv = cell_type.num_vertices();
        let num_vertices = (vertex_map.size_local() + vertex_map.num_ghosts()) as u32;
        for c in 0..cell_vertex.num_nodes() {
            if cell_vertex.num_links(c) != nv {
                return Err(MeshHaloError::ShapeMismatch {
                    what: "vertices per cell",
                    expected: nv,
                    found: cell_vertex.num_links(c),
                });
            }
            if let Some(&v) = cell_vertex.links(c).iter().find(|&&v| v >= num_vertices) {
                return Err(MeshHaloError::InvalidLocalIndex(
                    v,
                    vertex_map.size_local(),
                    vertex_map.num_ghosts(),
                ));
            }
        }

        let mut connectivity = FastMap::new();
        connectivity.insert((tdim, 0), Arc::new(cell_vertex));
        Ok(Self {
            cell_type,
            tdim,
            vertex_map,
            cell_map,
            connectivity: RwLock::new(connectivity),
        })
    }

    /// Topological dimension of the cells.
    pub fn dim(&self) -> usize {
        self.tdim
    }

    /// Cell type of the (homogeneous) mesh.
    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Index map of dimension `dim` (0 = vertices, `dim()` = cells).
    pub fn index_map(&self, dim: usize) -> Result<&Arc<IndexMap>, MeshHaloError> {
        if dim == 0 {
            Ok(&self.vertex_map)
        } else if dim == self.tdim {
            Ok(&self.cell_map)
        } else {
            Err(MeshHaloError::MissingIndexMap(dim))
        }
    }

    /// Fetch connectivity `(d0, d1)`; it must have been ensured.
    pub fn connectivity(&self, d0: usize, d1: usize) -> Result<Arc<AdjacencyList<u32>>, MeshHaloError> {
        self.connectivity
            .read()
            .get(&(d0, d1))
            .cloned()
            .ok_or(MeshHaloError::MissingConnectivity(d0, d1))
    }

    /// Make sure entities of dimension `dim` exist. Facets (`dim() - 1`)
    /// are enumerated from the cell→vertex table over all local cells,
    /// owned and ghost; vertices and cells always exist.
    pub fn ensure_entities(&self, dim: usize) -> Result<(), MeshHaloError> {
        if dim == 0 || dim == self.tdim {
            return Ok(());
        }
        if dim == self.tdim - 1 {
            return self.ensure_facets();
        }
        Err(MeshHaloError::Unsupported(format!(
            "entity creation for dimension {dim} of a {}-dimensional mesh",
            self.tdim
        )))
    }

    /// Make sure connectivity `(d0, d1)` is built. Supported:
    /// `(dim(), 0)` (given), `(0, dim())` (transpose), and
    /// `(dim()-1, 0)` / `(dim()-1, dim())` (facet enumeration).
    pub fn ensure_connectivity(&self, d0: usize, d1: usize) -> Result<(), MeshHaloError> {
        if self.connectivity.read().contains_key(&(d0, d1)) {
            return Ok(());
        }
        match (d0, d1) {
            (0, d) if d == self.tdim => {
                let cv = self.connectivity(self.tdim, 0)?;
                let num_vertices = self.vertex_map.size_local() + self.vertex_map.num_ghosts();
                let vc = cv.transpose_by(num_vertices, |&v| v as usize);
                let vc = AdjacencyList::new(
                    vc.data().iter().map(|&c| c as u32).collect(),
                    vc.offsets().to_vec(),
                )?;
                self.connectivity.write().insert((0, self.tdim), Arc::new(vc));
                Ok(())
            }
            (f, d) if f == self.tdim - 1 && (d == 0 || d == self.tdim) => self.ensure_facets(),
            _ => Err(MeshHaloError::Unsupported(format!(
                "connectivity ({d0},{d1}) of a {}-dimensional mesh",
                self.tdim
            ))),
        }
    }

    // Enumerate facets once; fills both (tdim-1, 0) and (tdim-1, tdim).
    fn ensure_facets(&self) -> Result<(), MeshHaloError> {
        {
            let conn = self.connectivity.read();
            if conn.contains_key(&(self.tdim - 1, 0)) && conn.contains_key(&(self.tdim - 1, self.tdim)) {
                return Ok(());
            }
        }
        let cv = self.connectivity(self.tdim, 0)?;
        let ct = self.cell_type;

        // In 1D the facets are the vertices themselves; keep facet id ==
        // vertex id so the (0, tdim) table stays valid for both readings.
        if self.tdim == 1 {
            let num_vertices = self.vertex_map.size_local() + self.vertex_map.num_ghosts();
            let fv = AdjacencyList::from_nested((0..num_vertices as u32).map(|v| vec![v]).collect());
            let vc = cv.transpose_by(num_vertices, |&v| v as usize);
            let fc = AdjacencyList::new(
                vc.data().iter().map(|&c| c as u32).collect(),
                vc.offsets().to_vec(),
            )?;
            let mut conn = self.connectivity.write();
            conn.insert((0, 0), Arc::new(fv));
            conn.insert((0, 1), Arc::new(fc));
            return Ok(());
        }

        // facet key (sorted local vertices) → facet id
        let mut facet_ids: FastMap<Vec<u32>, usize> = FastMap::new();
        let mut facet_vertices: Vec<Vec<u32>> = Vec::new();
        let mut facet_cells: Vec<Vec<u32>> = Vec::new();
        for c in 0..cv.num_nodes() {
            let verts = cv.links(c);
            for f in 0..ct.num_facets() {
                let mut key: Vec<u32> =
                    ct.facet_vertices(f).iter().map(|&i| verts[i]).collect();
                let unsorted = key.clone();
                key.sort_unstable();
                let id = *facet_ids.entry(key).or_insert_with(|| {
                    facet_vertices.push(unsorted);
                    facet_cells.push(Vec::new());
                    facet_vertices.len() - 1
                });
                if facet_cells[id].len() == 2 {
                    return Err(MeshHaloError::Unsupported(
                        "non-manifold mesh: facet incident to more than two cells".into(),
                    ));
                }
                facet_cells[id].push(c as u32);
            }
        }

        let fv = AdjacencyList::from_nested(facet_vertices);
        let fc = AdjacencyList::from_nested(facet_cells);
        let mut conn = self.connectivity.write();
        conn.insert((self.tdim - 1, 0), Arc::new(fv));
        conn.insert((self.tdim - 1, self.tdim), Arc::new(fc));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    fn two_triangles() -> Topology {
        // vertices 0..4, cells (0,1,2) and (1,2,3) sharing edge (1,2)
        let cells = AdjacencyList::from_flat(vec![0u32, 1, 2, 1, 2, 3], 3).unwrap();
        let vmap = Arc::new(IndexMap::new(&NoComm, 4, vec![], vec![]).unwrap());
        let cmap = Arc::new(IndexMap::new(&NoComm, 2, vec![], vec![]).unwrap());
        Topology::new(CellType::Triangle, cells, vmap, cmap).unwrap()
    }

    #[test]
    fn facet_enumeration_counts() {
        let topo = two_triangles();
        topo.ensure_entities(1).unwrap();
        let fc = topo.connectivity(1, 2).unwrap();
        // 5 distinct edges; the diagonal has two incident cells
        assert_eq!(fc.num_nodes(), 5);
        let two_cell_facets = (0..fc.num_nodes()).filter(|&f| fc.num_links(f) == 2).count();
        assert_eq!(two_cell_facets, 1);
    }

    #[test]
    fn vertex_cell_transpose() {
        let topo = two_triangles();
        topo.ensure_connectivity(0, 2).unwrap();
        let vc = topo.connectivity(0, 2).unwrap();
        assert_eq!(vc.links(0), &[0]);
        assert_eq!(vc.links(1), &[0, 1]);
        assert_eq!(vc.links(3), &[1]);
    }

    #[test]
    fn interval_facets_are_the_vertices() {
        // two segments sharing vertex 1
        let cells = AdjacencyList::from_flat(vec![0u32, 1, 1, 2], 2).unwrap();
        let vmap = Arc::new(IndexMap::new(&NoComm, 3, vec![], vec![]).unwrap());
        let cmap = Arc::new(IndexMap::new(&NoComm, 2, vec![], vec![]).unwrap());
        let topo = Topology::new(CellType::Segment, cells, vmap, cmap).unwrap();

        topo.ensure_connectivity(0, 0).unwrap();
        let fv = topo.connectivity(0, 0).unwrap();
        let fc = topo.connectivity(0, 1).unwrap();
        for v in 0..3 {
            assert_eq!(fv.links(v), &[v as u32]);
        }
        assert_eq!(fc.links(0), &[0]);
        assert_eq!(fc.links(1), &[0, 1]);
        assert_eq!(fc.links(2), &[1]);
    }

    #[test]
    fn unensured_connectivity_is_an_error() {
        let topo = two_triangles();
        assert!(matches!(
            topo.connectivity(1, 2),
            Err(MeshHaloError::MissingConnectivity(1, 2))
        ));
    }

    #[test]
    fn shape_validation_runs_before_anything_else() {
        let cells = AdjacencyList::from_flat(vec![0u32, 1, 2, 3], 4).unwrap();
        let vmap = Arc::new(IndexMap::new(&NoComm, 4, vec![], vec![]).unwrap());
        let cmap = Arc::new(IndexMap::new(&NoComm, 1, vec![], vec![]).unwrap());
        // 4 vertices per cell but triangles expected
        assert!(matches!(
            Topology::new(CellType::Triangle, cells, vmap, cmap),
            Err(MeshHaloError::ShapeMismatch { .. })
        ));
    }
}
