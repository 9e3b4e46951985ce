//! Bulk binding: one call per channel with a packed byte buffer

use drc_common::{IndexWidth, pack_attribute, pack_indices};
use std::path::Path;

use super::AttributeSink;
use crate::encoder::{BulkEncoder, EncoderError};
use crate::merge::GlobalFace;

/// Sink over a [`BulkEncoder`] session
pub struct BulkSink<'e, E: BulkEncoder> {
    encoder: &'e E,
    session: Option<E::Session>,
    index_width: IndexWidth,
}

impl<'e, E: BulkEncoder> BulkSink<'e, E> {
    /// Open a session; faces will be packed with `index_width` bytes per index
    pub fn open(encoder: &'e E, index_width: IndexWidth) -> Result<Self, EncoderError> {
        let session = encoder.create_session()?;
        Ok(Self {
            encoder,
            session: Some(session),
            index_width,
        })
    }

    fn session(&mut self) -> Result<&mut E::Session, EncoderError> {
        self.session
            .as_mut()
            .ok_or(EncoderError::Protocol("session already released"))
    }
}

fn element_count(len: usize) -> Result<u32, EncoderError> {
    u32::try_from(len).map_err(|_| EncoderError::Protocol("element count exceeds u32"))
}

impl<E: BulkEncoder> AttributeSink for BulkSink<'_, E> {
    fn positions(&mut self, positions: &[[f32; 3]]) -> Result<(), EncoderError> {
        let count = element_count(positions.len())?;
        let data = pack_attribute(positions);
        let encoder = self.encoder;
        encoder.add_positions(self.session()?, count, &data)
    }

    fn normals(&mut self, normals: &[[f32; 3]]) -> Result<(), EncoderError> {
        let count = element_count(normals.len())?;
        let data = pack_attribute(normals);
        let encoder = self.encoder;
        encoder.add_normals(self.session()?, count, &data)
    }

    fn texcoords(&mut self, channel: &[[f32; 2]]) -> Result<(), EncoderError> {
        let count = element_count(channel.len())?;
        let data = pack_attribute(channel);
        let encoder = self.encoder;
        encoder.add_texcoords(self.session()?, count, &data)
    }

    fn joints(&mut self, joints: &[[u16; 4]]) -> Result<(), EncoderError> {
        let count = element_count(joints.len())?;
        let data = pack_attribute(joints);
        let encoder = self.encoder;
        encoder.add_joints(self.session()?, count, &data)
    }

    fn weights(&mut self, weights: &[[f32; 4]]) -> Result<(), EncoderError> {
        let count = element_count(weights.len())?;
        let data = pack_attribute(weights);
        let encoder = self.encoder;
        encoder.add_weights(self.session()?, count, &data)
    }

    fn faces(&mut self, faces: &[GlobalFace]) -> Result<(), EncoderError> {
        let indices = GlobalFace::flatten(faces);
        let count = element_count(indices.len())?;
        let data = pack_indices(indices, self.index_width)
            .ok_or(EncoderError::Protocol("face index exceeds the index width"))?;
        let (encoder, width) = (self.encoder, self.index_width);
        encoder.set_faces(self.session()?, count, width, &data)
    }

    fn finalize(mut self, path: &Path) -> Result<(), EncoderError> {
        let encoder = self.encoder;
        encoder.finalize(self.session()?, path)
    }
}

impl<E: BulkEncoder> Drop for BulkSink<'_, E> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.encoder.dispose(session);
        }
    }
}
