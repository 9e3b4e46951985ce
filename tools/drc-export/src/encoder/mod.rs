//! Encoder bridge
//!
//! The geometry encoder is an external, stateful service. It is reached
//! through one of two bindings of the same session lifecycle:
//!
//! ```text
//! create_session -> add attributes / faces (any count) -> finalize(path) -> dispose
//! ```
//!
//! - [`BulkEncoder`]: one call per attribute channel, carrying an element
//!   count and a tightly packed native-endian byte buffer.
//!   Joints and weights are optional generic channels of four components.
//! - [`ScalarEncoder`]: one call per vertex attribute value and per face.
//!
//! Sessions are handles owned by the caller. They are never shared between
//! exports, and `dispose` must be called exactly once for every session that
//! was created (the sinks in [`crate::sink`] guarantee this on drop).

mod container;

use drc_common::IndexWidth;
use std::path::Path;

pub use container::{ContainerEncoder, ContainerSession};

/// Error reported by an encoder call
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    /// Call not valid in the session's current state
    #[error("invalid encoder call: {0}")]
    Protocol(&'static str),

    /// Session was already finalized
    #[error("encoder session already finalized")]
    Finalized,

    /// Byte buffer length disagrees with the element count
    #[error("{attribute} buffer is {found} bytes, expected {expected}")]
    BufferSize {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },

    /// Attribute element count disagrees with the point count
    #[error("{attribute} count {found} does not match {expected} points")]
    CountMismatch {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },

    /// Face referencing a point that was never submitted
    #[error("face index {index} out of range for {point_count} points")]
    FaceOutOfRange { index: u32, point_count: usize },

    /// Encoded container could not be produced
    #[error("failed to encode mesh: {0:#}")]
    Encode(anyhow::Error),

    /// Output file could not be written
    #[error("failed to write {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bulk binding: whole attribute channels as packed byte buffers
pub trait BulkEncoder {
    /// Opaque per-export session handle
    type Session;

    fn create_session(&self) -> Result<Self::Session, EncoderError>;

    /// `count` positions, 3 native-endian `f32` each
    fn add_positions(
        &self,
        session: &mut Self::Session,
        count: u32,
        data: &[u8],
    ) -> Result<(), EncoderError>;

    /// `count` normals, 3 native-endian `f32` each
    fn add_normals(
        &self,
        session: &mut Self::Session,
        count: u32,
        data: &[u8],
    ) -> Result<(), EncoderError>;

    /// One texcoord channel of `count` entries, 2 native-endian `f32` each
    fn add_texcoords(
        &self,
        session: &mut Self::Session,
        count: u32,
        data: &[u8],
    ) -> Result<(), EncoderError>;

    /// `count` joint index sets, 4 native-endian `u16` each
    fn add_joints(
        &self,
        session: &mut Self::Session,
        count: u32,
        data: &[u8],
    ) -> Result<(), EncoderError>;

    /// `count` joint weight sets, 4 native-endian `f32` each
    fn add_weights(
        &self,
        session: &mut Self::Session,
        count: u32,
        data: &[u8],
    ) -> Result<(), EncoderError>;

    /// `index_count` face indices (3 per face) of `width` bytes each
    fn set_faces(
        &self,
        session: &mut Self::Session,
        index_count: u32,
        width: IndexWidth,
        data: &[u8],
    ) -> Result<(), EncoderError>;

    /// Encode and write the output file
    fn finalize(&self, session: &mut Self::Session, path: &Path) -> Result<(), EncoderError>;

    /// Release the session's resources
    fn dispose(&self, session: Self::Session);
}

/// Scalar binding: one call per value
pub trait ScalarEncoder {
    /// Opaque per-export session handle
    type Session;

    /// Open a session sized for `vertex_count` points
    fn create_session(&self, vertex_count: u32) -> Result<Self::Session, EncoderError>;

    fn add_position(
        &self,
        session: &mut Self::Session,
        x: f32,
        y: f32,
        z: f32,
    ) -> Result<(), EncoderError>;

    fn add_normal(
        &self,
        session: &mut Self::Session,
        x: f32,
        y: f32,
        z: f32,
    ) -> Result<(), EncoderError>;

    /// Append to texcoord `channel`; channels are opened in order
    fn add_texcoord(
        &self,
        session: &mut Self::Session,
        channel: u32,
        u: f32,
        v: f32,
    ) -> Result<(), EncoderError>;

    fn add_joint(&self, session: &mut Self::Session, joints: [u16; 4]) -> Result<(), EncoderError>;

    fn add_weight(&self, session: &mut Self::Session, weights: [f32; 4])
    -> Result<(), EncoderError>;

    fn add_face(
        &self,
        session: &mut Self::Session,
        a: u32,
        b: u32,
        c: u32,
    ) -> Result<(), EncoderError>;

    /// Encode and write the output file
    fn finalize(&self, session: &mut Self::Session, path: &Path) -> Result<(), EncoderError>;

    /// Release the session's resources
    fn dispose(&self, session: Self::Session);
}
