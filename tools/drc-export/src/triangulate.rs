//! Triangle and quad splitting
//!
//! Only the fixed diagonal split from vertex 0 is performed. Non-planar or
//! concave quads are split the same way; n-gons must be triangulated upstream.

use smallvec::{SmallVec, smallvec};

/// One or two local-index triangles
pub type Triangles = SmallVec<[[u32; 3]; 2]>;

/// Polygon arity outside 3..=4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedArity(pub usize);

/// Split a polygon into triangles
///
/// - 3 vertices: emitted unchanged
/// - 4 vertices: `(v0, v1, v2)` and `(v0, v2, v3)`
/// - anything else: [`UnsupportedArity`]
pub fn triangulate(polygon: &[u32]) -> Result<Triangles, UnsupportedArity> {
    match *polygon {
        [a, b, c] => Ok(smallvec![[a, b, c]]),
        [a, b, c, d] => Ok(smallvec![[a, b, c], [a, c, d]]),
        _ => Err(UnsupportedArity(polygon.len())),
    }
}
