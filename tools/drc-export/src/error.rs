//! Export pipeline errors
//!
//! Every variant is fatal to the export it occurs in: the encoder session is
//! released without being finalized and no output file is written.

use crate::encoder::EncoderError;

/// Error returned by an export or merge
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The scene collector failed to enumerate objects
    #[error("failed to collect scene objects")]
    Scene(#[source] anyhow::Error),

    /// Polygon with fewer than 3 or more than 4 vertices
    #[error(
        "object '{object}': polygon {polygon} has {vertex_count} vertices \
         (only triangles and quads are supported, triangulate the mesh before exporting)"
    )]
    UnsupportedPolygon {
        object: String,
        polygon: usize,
        vertex_count: usize,
    },

    /// Position transform without an inverse, or a normal that collapsed to zero
    #[error("object '{object}': degenerate transform (zero scale or zero-length normal)")]
    DegenerateTransform { object: String },

    /// Polygon referencing a vertex the mesh does not have
    #[error("object '{object}': polygon {polygon} references vertex {index} of {vertex_count}")]
    IndexOutOfRange {
        object: String,
        polygon: usize,
        index: u32,
        vertex_count: usize,
    },

    /// Per-vertex attribute array not aligned with positions
    #[error("object '{object}': {attribute} has {found} entries, expected {expected}")]
    AttributeLengthMismatch {
        object: String,
        attribute: String,
        expected: usize,
        found: usize,
    },

    /// Differing texture coordinate channel counts under the strict policy
    #[error("object '{object}': {found} texcoord channel(s), scene has {expected}")]
    TexcoordChannelMismatch {
        object: String,
        expected: usize,
        found: usize,
    },

    /// Merged vertex count exceeds the configured index width or u32
    #[error("{vertex_count} vertices cannot be addressed with {width}-byte indices")]
    IndexWidthOverflow { vertex_count: u64, width: usize },

    /// The encoder rejected a call
    #[error(transparent)]
    Encoder(#[from] EncoderError),
}
