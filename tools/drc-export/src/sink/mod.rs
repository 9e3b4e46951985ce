//! Attribute stream builders
//!
//! An [`AttributeSink`] owns one open encoder session and receives the merged
//! stream in order: positions, normals, zero or more texcoord channels, the
//! optional joint and weight channels, faces, then `finalize`. Dropping a sink disposes its session, whether or not it
//! was finalized, so every exit path of an export releases the encoder.
//!
//! [`BulkSink`] and [`ScalarSink`] drive the two encoder bindings; the merge
//! pipeline does not know which one is active.

mod bulk;
mod scalar;

use std::path::Path;

use crate::encoder::EncoderError;
use crate::merge::GlobalFace;

pub use bulk::BulkSink;
pub use scalar::ScalarSink;

/// Ordered receiver of one merged attribute stream
pub trait AttributeSink {
    /// All merged positions
    fn positions(&mut self, positions: &[[f32; 3]]) -> Result<(), EncoderError>;

    /// All merged normals, aligned to positions
    fn normals(&mut self, normals: &[[f32; 3]]) -> Result<(), EncoderError>;

    /// One complete texcoord channel, aligned to positions
    fn texcoords(&mut self, channel: &[[f32; 2]]) -> Result<(), EncoderError>;

    /// Four joint indices per position
    fn joints(&mut self, joints: &[[u16; 4]]) -> Result<(), EncoderError>;

    /// Four joint weights per position
    fn weights(&mut self, weights: &[[f32; 4]]) -> Result<(), EncoderError>;

    /// All merged faces
    fn faces(&mut self, faces: &[GlobalFace]) -> Result<(), EncoderError>;

    /// Write the output file; the session is released when the sink drops
    fn finalize(self, path: &Path) -> Result<(), EncoderError>
    where
        Self: Sized;
}
