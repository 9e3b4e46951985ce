//! Scalar binding: one call per attribute value and per face

use std::path::Path;

use super::AttributeSink;
use crate::encoder::{EncoderError, ScalarEncoder};
use crate::merge::GlobalFace;

/// Sink over a [`ScalarEncoder`] session
pub struct ScalarSink<'e, E: ScalarEncoder> {
    encoder: &'e E,
    session: Option<E::Session>,
    next_channel: u32,
}

impl<'e, E: ScalarEncoder> ScalarSink<'e, E> {
    /// Open a session announced for `vertex_count` points
    pub fn open(encoder: &'e E, vertex_count: u32) -> Result<Self, EncoderError> {
        let session = encoder.create_session(vertex_count)?;
        Ok(Self {
            encoder,
            session: Some(session),
            next_channel: 0,
        })
    }

    /// Encoder and session, split so calls can borrow both
    fn parts(&mut self) -> Result<(&'e E, &mut E::Session), EncoderError> {
        let session = self
            .session
            .as_mut()
            .ok_or(EncoderError::Protocol("session already released"))?;
        Ok((self.encoder, session))
    }
}

impl<E: ScalarEncoder> AttributeSink for ScalarSink<'_, E> {
    fn positions(&mut self, positions: &[[f32; 3]]) -> Result<(), EncoderError> {
        let (encoder, session) = self.parts()?;
        for &[x, y, z] in positions {
            encoder.add_position(session, x, y, z)?;
        }
        Ok(())
    }

    fn normals(&mut self, normals: &[[f32; 3]]) -> Result<(), EncoderError> {
        let (encoder, session) = self.parts()?;
        for &[x, y, z] in normals {
            encoder.add_normal(session, x, y, z)?;
        }
        Ok(())
    }

    fn texcoords(&mut self, channel: &[[f32; 2]]) -> Result<(), EncoderError> {
        let index = self.next_channel;
        let (encoder, session) = self.parts()?;
        for &[u, v] in channel {
            encoder.add_texcoord(session, index, u, v)?;
        }
        self.next_channel += 1;
        Ok(())
    }

    fn joints(&mut self, joints: &[[u16; 4]]) -> Result<(), EncoderError> {
        let (encoder, session) = self.parts()?;
        for &set in joints {
            encoder.add_joint(session, set)?;
        }
        Ok(())
    }

    fn weights(&mut self, weights: &[[f32; 4]]) -> Result<(), EncoderError> {
        let (encoder, session) = self.parts()?;
        for &set in weights {
            encoder.add_weight(session, set)?;
        }
        Ok(())
    }

    fn faces(&mut self, faces: &[GlobalFace]) -> Result<(), EncoderError> {
        let (encoder, session) = self.parts()?;
        for face in faces {
            let [a, b, c] = face.indices();
            encoder.add_face(session, a, b, c)?;
        }
        Ok(())
    }

    fn finalize(mut self, path: &Path) -> Result<(), EncoderError> {
        let (encoder, session) = self.parts()?;
        encoder.finalize(session, path)
    }
}

impl<E: ScalarEncoder> Drop for ScalarSink<'_, E> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.encoder.dispose(session);
        }
    }
}
