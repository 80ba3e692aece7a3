//! Fixed little-endian wire types for the exchange paths.
//!
//! All multi-byte integers are **little-endian** on the wire: values are
//! stored pre-LE with `.to_le()` and decoded with `from_le()`. Payload
//! records are plain `u64` streams (global indices, counts and rank ids
//! widened to `u64`), so a single Pod cast covers every protocol message.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Size header exchanged before every payload stage.
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    n_le: u64,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }

    pub fn get(self) -> usize {
        u64::from_le(self.n_le) as usize
    }
}

/// A `u64` value in wire byte order (global index, count or widened rank).
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireIndex {
    v_le: u64,
}

impl WireIndex {
    pub fn new(v: u64) -> Self {
        Self { v_le: v.to_le() }
    }

    pub fn get(self) -> u64 {
        u64::from_le(self.v_le)
    }
}

const_assert_eq!(std::mem::size_of::<WireCount>(), 8);
const_assert_eq!(std::mem::size_of::<WireIndex>(), 8);
