//! Attribute and index packing utilities
//!
//! Converts merged attribute arrays into the tightly packed byte buffers the
//! bulk encoder binding consumes, and back:
//! - `[f32; N]` / `[u16; 4]` elements → native-endian bytes (no interleaving)
//! - `u32` indices → unsigned integers of 1, 2 or 4 bytes
//!
//! Used by both `drc-export` (bulk sink) and the bundled container encoder.

use bytemuck::{Pod, cast_slice, pod_read_unaligned};

// ============================================================================
// Index Width
// ============================================================================

/// Byte width of a packed face index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum IndexWidth {
    /// One byte per index (up to 256 vertices)
    U8 = 1,
    /// Two bytes per index (up to 65,536 vertices)
    U16 = 2,
    /// Four bytes per index
    U32 = 4,
}

impl IndexWidth {
    /// Width in bytes
    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Parse a byte width (1, 2 or 4)
    pub const fn from_bytes(width: u8) -> Option<Self> {
        match width {
            1 => Some(Self::U8),
            2 => Some(Self::U16),
            4 => Some(Self::U32),
            _ => None,
        }
    }

    /// Largest index value this width can store
    #[inline]
    pub const fn max_index(self) -> u32 {
        match self {
            Self::U8 => u8::MAX as u32,
            Self::U16 => u16::MAX as u32,
            Self::U32 => u32::MAX,
        }
    }

    /// Whether every index into `vertex_count` vertices fits this width
    #[inline]
    pub const fn can_address(self, vertex_count: u32) -> bool {
        vertex_count == 0 || vertex_count - 1 <= self.max_index()
    }

    /// Narrowest width able to address `vertex_count` vertices
    pub const fn narrowest_for(vertex_count: u32) -> Self {
        if Self::U8.can_address(vertex_count) {
            Self::U8
        } else if Self::U16.can_address(vertex_count) {
            Self::U16
        } else {
            Self::U32
        }
    }
}

// ============================================================================
// Index Packing
// ============================================================================

/// Pack indices as native-endian unsigned integers of `width` bytes
///
/// Returns `None` if any index does not fit the requested width.
pub fn pack_indices(indices: &[u32], width: IndexWidth) -> Option<Vec<u8>> {
    let mut data = Vec::with_capacity(indices.len() * width.bytes());
    for &index in indices {
        if index > width.max_index() {
            return None;
        }
        match width {
            IndexWidth::U8 => data.push(index as u8),
            IndexWidth::U16 => data.extend_from_slice(&(index as u16).to_ne_bytes()),
            IndexWidth::U32 => data.extend_from_slice(&index.to_ne_bytes()),
        }
    }
    Some(data)
}

/// Unpack `count` native-endian indices of `width` bytes
///
/// Returns `None` if the buffer length does not match `count * width`.
pub fn unpack_indices(data: &[u8], count: usize, width: IndexWidth) -> Option<Vec<u32>> {
    if data.len() != count.checked_mul(width.bytes())? {
        return None;
    }
    let indices = match width {
        IndexWidth::U8 => data.iter().map(|&b| b as u32).collect(),
        IndexWidth::U16 => data
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]) as u32)
            .collect(),
        IndexWidth::U32 => data
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    };
    Some(indices)
}

// ============================================================================
// Attribute Packing
// ============================================================================

/// Pack fixed-size elements (`[f32; N]`, `[u16; 4]`, ...) into a contiguous
/// native-endian byte buffer
#[inline]
pub fn pack_attribute<T: Pod>(elements: &[T]) -> Vec<u8> {
    cast_slice::<T, u8>(elements).to_vec()
}

/// Unpack `count` native-endian elements
///
/// Works on unaligned input. Returns `None` on a length mismatch.
pub fn unpack_attribute<T: Pod>(data: &[u8], count: usize) -> Option<Vec<T>> {
    let element_size = size_of::<T>();
    if element_size == 0 || data.len() != count.checked_mul(element_size)? {
        return None;
    }
    Some(
        data.chunks_exact(element_size)
            .map(pod_read_unaligned::<T>)
            .collect(),
    )
}
