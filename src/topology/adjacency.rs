//! `AdjacencyList<T>`: compressed (CSR-style) node → links mapping.
//!
//! Backing storage is a flat array of links plus an offsets array with
//! `offsets.len() == num_nodes + 1`, so `num_links(i) = offsets[i+1] -
//! offsets[i]`. Used for cell→vertex topology, dual graphs and per-cell
//! destination-rank lists alike.

use crate::mesh_error::MeshHaloError;

/// Compressed mapping from a contiguous node id to an ordered link sequence.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdjacencyList<T> {
    data: Vec<T>,
    offsets: Vec<usize>,
}

impl<T> AdjacencyList<T> {
    /// Build from raw CSR arrays, validating the offset structure.
    pub fn new(data: Vec<T>, offsets: Vec<usize>) -> Result<Self, MeshHaloError> {
        if offsets.is_empty() || offsets[0] != 0 {
            return Err(MeshHaloError::ShapeMismatch {
                what: "adjacency offsets (must start at 0)",
                expected: 0,
                found: offsets.first().copied().unwrap_or(usize::MAX),
            });
        }
        if offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(MeshHaloError::ShapeMismatch {
                what: "adjacency offsets (must be non-decreasing)",
                expected: 0,
                found: 0,
            });
        }
        let last = *offsets.last().unwrap_or(&0);
        if last != data.len() {
            return Err(MeshHaloError::ShapeMismatch {
                what: "adjacency data length",
                expected: last,
                found: data.len(),
            });
        }
        Ok(Self { data, offsets })
    }

    /// Build a fixed-width list: every node has exactly `width` links.
    pub fn from_flat(data: Vec<T>, width: usize) -> Result<Self, MeshHaloError> {
        if width == 0 || data.len() % width != 0 {
            return Err(MeshHaloError::ShapeMismatch {
                what: "flat adjacency data (not a multiple of width)",
                expected: width,
                found: data.len(),
            });
        }
        let n = data.len() / width;
        let offsets = (0..=n).map(|i| i * width).collect();
        Ok(Self { data, offsets })
    }

    /// Build from nested vectors.
    pub fn from_nested(nested: Vec<Vec<T>>) -> Self {
        let mut offsets = Vec::with_capacity(nested.len() + 1);
        offsets.push(0);
        let mut data = Vec::new();
        for links in nested {
            data.extend(links);
            offsets.push(data.len());
        }
        Self { data, offsets }
    }

    /// An empty list with zero nodes.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of links of node `i`.
    pub fn num_links(&self, i: usize) -> usize {
        self.offsets[i + 1] - self.offsets[i]
    }

    /// Links of node `i`.
    pub fn links(&self, i: usize) -> &[T] {
        &self.data[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Flat link storage.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Offset array (`num_nodes + 1` entries).
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Iterate over per-node link slices.
    pub fn iter(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.num_nodes()).map(move |i| self.links(i))
    }
}

impl<T> AdjacencyList<T> {
    /// Transpose: map each link value in `0..num_targets` back to the nodes
    /// that reference it. Per-target lists come out in ascending node order.
    pub fn transpose_by(&self, num_targets: usize, to_index: impl Fn(&T) -> usize) -> AdjacencyList<usize> {
        let mut counts = vec![0usize; num_targets];
        for t in &self.data {
            counts[to_index(t)] += 1;
        }
        let mut offsets = vec![0usize; num_targets + 1];
        for (i, c) in counts.iter().enumerate() {
            offsets[i + 1] = offsets[i] + c;
        }
        let mut data = vec![0usize; offsets[num_targets]];
        let mut insert = offsets.clone();
        for node in 0..self.num_nodes() {
            for t in self.links(node) {
                let ti = to_index(t);
                data[insert[ti]] = node;
                insert[ti] += 1;
            }
        }
        AdjacencyList { data, offsets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn basic_csr_access() {
        let adj = AdjacencyList::new(vec![1u32, 2, 3, 4, 5], vec![0, 2, 2, 5]).unwrap();
        assert_eq!(adj.num_nodes(), 3);
        assert_eq!(adj.links(0), &[1, 2]);
        assert_eq!(adj.num_links(1), 0);
        assert_eq!(adj.links(2), &[3, 4, 5]);
    }

    #[test]
    fn invalid_offsets_rejected() {
        assert!(AdjacencyList::new(vec![1u32], vec![0, 2]).is_err());
        assert!(AdjacencyList::new(vec![1u32, 2], vec![0, 2, 1]).is_err());
        assert!(AdjacencyList::new(vec![1u32], vec![1, 1]).is_err());
        assert!(AdjacencyList::<u32>::new(vec![], vec![]).is_err());
    }

    #[test]
    fn from_flat_fixed_width() {
        let adj = AdjacencyList::from_flat(vec![0u64, 1, 2, 1, 2, 3], 3).unwrap();
        assert_eq!(adj.num_nodes(), 2);
        assert_eq!(adj.links(1), &[1, 2, 3]);
        assert!(AdjacencyList::from_flat(vec![0u64; 5], 3).is_err());
    }

    #[test]
    fn transpose_vertex_to_cell() {
        // two triangles sharing vertices 1,2
        let cells = AdjacencyList::from_flat(vec![0u32, 1, 2, 1, 2, 3], 3).unwrap();
        let v_to_c = cells.transpose_by(4, |&v| v as usize);
        assert_eq!(v_to_c.links(0), &[0]);
        assert_eq!(v_to_c.links(1), &[0, 1]);
        assert_eq!(v_to_c.links(2), &[0, 1]);
        assert_eq!(v_to_c.links(3), &[1]);
    }

    #[test]
    fn json_round_trip() {
        let adj = AdjacencyList::from_flat(vec![0u32, 1, 2, 1, 2, 3], 3).unwrap();
        let json = serde_json::to_string(&adj).unwrap();
        let back: AdjacencyList<u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, adj);
    }

    proptest! {
        #[test]
        fn from_nested_roundtrip(nested in proptest::collection::vec(
            proptest::collection::vec(0u32..100, 0..6), 0..20)) {
            let adj = AdjacencyList::from_nested(nested.clone());
            prop_assert_eq!(adj.num_nodes(), nested.len());
            for (i, links) in nested.iter().enumerate() {
                prop_assert_eq!(adj.links(i), links.as_slice());
            }
        }
    }
}
