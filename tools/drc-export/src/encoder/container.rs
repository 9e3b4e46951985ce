//! Reference encoder writing uncompressed `.drc` containers
//!
//! Implements both bindings on top of one accumulating [`DrcMesh`], so the
//! bulk and scalar paths produce byte-identical files for the same geometry.
//! The recorded compression level and quantization are not applied; a native
//! compressor plugs in behind the same traits.

use bytemuck::Pod;
use drc_common::{DrcMesh, EncodingSettings, IndexWidth, unpack_attribute, unpack_indices};
use std::io::Write;
use std::path::Path;

use super::{BulkEncoder, EncoderError, ScalarEncoder};

/// Stateless factory for container sessions
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerEncoder {
    settings: EncodingSettings,
}

impl ContainerEncoder {
    pub fn new(settings: EncodingSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> EncodingSettings {
        self.settings
    }
}

/// Accumulated state of one container export
#[derive(Debug)]
pub struct ContainerSession {
    mesh: DrcMesh,
    /// Point count announced at creation (scalar binding)
    expected_points: Option<u32>,
    positions_set: bool,
    faces_set: bool,
    finalized: bool,
}

impl ContainerSession {
    fn new(settings: EncodingSettings, expected_points: Option<u32>) -> Self {
        let mesh = DrcMesh {
            settings,
            ..DrcMesh::default()
        };
        Self {
            mesh,
            expected_points,
            positions_set: false,
            faces_set: false,
            finalized: false,
        }
    }

    /// Geometry accumulated so far
    pub fn mesh(&self) -> &DrcMesh {
        &self.mesh
    }

    fn ensure_open(&self) -> Result<(), EncoderError> {
        if self.finalized {
            return Err(EncoderError::Finalized);
        }
        Ok(())
    }

    fn point_count(&self) -> usize {
        self.mesh.positions.len()
    }

    /// Preconditions of a bulk generic channel
    fn check_generic(
        &self,
        attribute: &'static str,
        vacant: bool,
        count: u32,
    ) -> Result<(), EncoderError> {
        self.ensure_open()?;
        if !self.positions_set {
            return Err(EncoderError::Protocol("generic attribute submitted before positions"));
        }
        if !vacant {
            return Err(EncoderError::Protocol("generic attribute already submitted"));
        }
        if count as usize != self.point_count() {
            return Err(EncoderError::CountMismatch {
                attribute,
                expected: self.point_count(),
                found: count as usize,
            });
        }
        Ok(())
    }

    /// Checks shared by both bindings before the container is written
    fn validate(&self) -> Result<(), EncoderError> {
        let points = self.point_count();
        if let Some(expected) = self.expected_points {
            if points != expected as usize {
                return Err(EncoderError::CountMismatch {
                    attribute: "position",
                    expected: expected as usize,
                    found: points,
                });
            }
        }
        if !self.mesh.normals.is_empty() && self.mesh.normals.len() != points {
            return Err(EncoderError::CountMismatch {
                attribute: "normal",
                expected: points,
                found: self.mesh.normals.len(),
            });
        }
        if let Some(uvs) = self.mesh.texcoords.iter().find(|uvs| uvs.len() != points) {
            return Err(EncoderError::CountMismatch {
                attribute: "texcoord",
                expected: points,
                found: uvs.len(),
            });
        }
        for (attribute, len) in [
            ("joint", self.mesh.joints.len()),
            ("weight", self.mesh.weights.len()),
        ] {
            if len != 0 && len != points {
                return Err(EncoderError::CountMismatch {
                    attribute,
                    expected: points,
                    found: len,
                });
            }
        }
        if let Some(&index) = self.mesh.indices.iter().find(|&&i| i as usize >= points) {
            return Err(EncoderError::FaceOutOfRange {
                index,
                point_count: points,
            });
        }
        Ok(())
    }

    fn finalize(&mut self, path: &Path) -> Result<(), EncoderError> {
        self.ensure_open()?;
        self.validate()?;

        let width = IndexWidth::narrowest_for(self.point_count() as u32);
        let bytes = self.mesh.to_bytes(width).map_err(EncoderError::Encode)?;
        write_atomically(path, &bytes).map_err(|source| EncoderError::Write {
            path: path.display().to_string(),
            source,
        })?;
        self.finalized = true;

        tracing::info!(
            "Encoded {} vertices, {} indices ({} bytes)",
            self.point_count(),
            self.mesh.indices.len(),
            bytes.len()
        );
        Ok(())
    }
}

/// Write through a temporary file in the destination directory
///
/// The destination only appears once the write has fully succeeded.
fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Check a bulk buffer length and decode it
fn unpack_channel<T: Pod>(
    attribute: &'static str,
    count: u32,
    data: &[u8],
) -> Result<Vec<T>, EncoderError> {
    let expected = count as usize * size_of::<T>();
    unpack_attribute::<T>(data, count as usize).ok_or(EncoderError::BufferSize {
        attribute,
        expected,
        found: data.len(),
    })
}

impl BulkEncoder for ContainerEncoder {
    type Session = ContainerSession;

    fn create_session(&self) -> Result<ContainerSession, EncoderError> {
        Ok(ContainerSession::new(self.settings, None))
    }

    fn add_positions(
        &self,
        session: &mut ContainerSession,
        count: u32,
        data: &[u8],
    ) -> Result<(), EncoderError> {
        session.ensure_open()?;
        if session.positions_set {
            return Err(EncoderError::Protocol("positions already submitted"));
        }
        session.mesh.positions = unpack_channel::<[f32; 3]>("position", count, data)?;
        session.positions_set = true;
        Ok(())
    }

    fn add_normals(
        &self,
        session: &mut ContainerSession,
        count: u32,
        data: &[u8],
    ) -> Result<(), EncoderError> {
        session.ensure_open()?;
        if !session.positions_set {
            return Err(EncoderError::Protocol("normals submitted before positions"));
        }
        if !session.mesh.normals.is_empty() {
            return Err(EncoderError::Protocol("normals already submitted"));
        }
        if count as usize != session.point_count() {
            return Err(EncoderError::CountMismatch {
                attribute: "normal",
                expected: session.point_count(),
                found: count as usize,
            });
        }
        session.mesh.normals = unpack_channel::<[f32; 3]>("normal", count, data)?;
        Ok(())
    }

    fn add_texcoords(
        &self,
        session: &mut ContainerSession,
        count: u32,
        data: &[u8],
    ) -> Result<(), EncoderError> {
        session.ensure_open()?;
        if !session.positions_set {
            return Err(EncoderError::Protocol("texcoords submitted before positions"));
        }
        if count as usize != session.point_count() {
            return Err(EncoderError::CountMismatch {
                attribute: "texcoord",
                expected: session.point_count(),
                found: count as usize,
            });
        }
        let uvs = unpack_channel::<[f32; 2]>("texcoord", count, data)?;
        session.mesh.texcoords.push(uvs);
        Ok(())
    }

    fn add_joints(
        &self,
        session: &mut ContainerSession,
        count: u32,
        data: &[u8],
    ) -> Result<(), EncoderError> {
        session.check_generic("joint", session.mesh.joints.is_empty(), count)?;
        session.mesh.joints = unpack_channel::<[u16; 4]>("joint", count, data)?;
        Ok(())
    }

    fn add_weights(
        &self,
        session: &mut ContainerSession,
        count: u32,
        data: &[u8],
    ) -> Result<(), EncoderError> {
        session.check_generic("weight", session.mesh.weights.is_empty(), count)?;
        session.mesh.weights = unpack_channel::<[f32; 4]>("weight", count, data)?;
        Ok(())
    }

    fn set_faces(
        &self,
        session: &mut ContainerSession,
        index_count: u32,
        width: IndexWidth,
        data: &[u8],
    ) -> Result<(), EncoderError> {
        session.ensure_open()?;
        if session.faces_set {
            return Err(EncoderError::Protocol("faces already submitted"));
        }
        if index_count % 3 != 0 {
            return Err(EncoderError::Protocol("index count is not a multiple of 3"));
        }
        let indices = unpack_indices(data, index_count as usize, width).ok_or(
            EncoderError::BufferSize {
                attribute: "index",
                expected: index_count as usize * width.bytes(),
                found: data.len(),
            },
        )?;
        session.mesh.indices = indices;
        session.faces_set = true;
        Ok(())
    }

    fn finalize(&self, session: &mut ContainerSession, path: &Path) -> Result<(), EncoderError> {
        session.finalize(path)
    }

    fn dispose(&self, session: ContainerSession) {
        tracing::trace!(
            "Disposing container session ({} points, finalized: {})",
            session.point_count(),
            session.finalized
        );
    }
}

impl ScalarEncoder for ContainerEncoder {
    type Session = ContainerSession;

    fn create_session(&self, vertex_count: u32) -> Result<ContainerSession, EncoderError> {
        let mut session = ContainerSession::new(self.settings, Some(vertex_count));
        session.mesh.positions.reserve(vertex_count as usize);
        session.mesh.normals.reserve(vertex_count as usize);
        Ok(session)
    }

    fn add_position(
        &self,
        session: &mut ContainerSession,
        x: f32,
        y: f32,
        z: f32,
    ) -> Result<(), EncoderError> {
        session.ensure_open()?;
        if let Some(expected) = session.expected_points {
            if session.point_count() >= expected as usize {
                return Err(EncoderError::Protocol("more positions than announced"));
            }
        }
        session.mesh.positions.push([x, y, z]);
        Ok(())
    }

    fn add_normal(
        &self,
        session: &mut ContainerSession,
        x: f32,
        y: f32,
        z: f32,
    ) -> Result<(), EncoderError> {
        session.ensure_open()?;
        session.mesh.normals.push([x, y, z]);
        Ok(())
    }

    fn add_texcoord(
        &self,
        session: &mut ContainerSession,
        channel: u32,
        u: f32,
        v: f32,
    ) -> Result<(), EncoderError> {
        session.ensure_open()?;
        let channels = &mut session.mesh.texcoords;
        let channel = channel as usize;
        if channel == channels.len() {
            channels.push(Vec::new());
        } else if channel > channels.len() {
            return Err(EncoderError::Protocol("texcoord channels must be opened in order"));
        }
        channels[channel].push([u, v]);
        Ok(())
    }

    fn add_joint(&self, session: &mut ContainerSession, joints: [u16; 4]) -> Result<(), EncoderError> {
        session.ensure_open()?;
        session.mesh.joints.push(joints);
        Ok(())
    }

    fn add_weight(
        &self,
        session: &mut ContainerSession,
        weights: [f32; 4],
    ) -> Result<(), EncoderError> {
        session.ensure_open()?;
        session.mesh.weights.push(weights);
        Ok(())
    }

    fn add_face(
        &self,
        session: &mut ContainerSession,
        a: u32,
        b: u32,
        c: u32,
    ) -> Result<(), EncoderError> {
        session.ensure_open()?;
        session.mesh.indices.extend_from_slice(&[a, b, c]);
        Ok(())
    }

    fn finalize(&self, session: &mut ContainerSession, path: &Path) -> Result<(), EncoderError> {
        session.finalize(path)
    }

    fn dispose(&self, session: ContainerSession) {
        tracing::trace!(
            "Disposing container session ({} points, finalized: {})",
            session.point_count(),
            session.finalized
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drc_common::{pack_attribute, pack_indices};
    use tempfile::tempdir;

    const POSITIONS: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

    fn bulk_session(encoder: &ContainerEncoder) -> ContainerSession {
        let mut session = BulkEncoder::create_session(encoder).unwrap();
        encoder
            .add_positions(&mut session, 3, &pack_attribute(&POSITIONS))
            .unwrap();
        session
    }

    #[test]
    fn test_bulk_finalize_writes_container() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tri.drc");
        let encoder = ContainerEncoder::default();

        let mut session = bulk_session(&encoder);
        let indices = pack_indices(&[0, 1, 2], IndexWidth::U16).unwrap();
        encoder
            .set_faces(&mut session, 3, IndexWidth::U16, &indices)
            .unwrap();
        BulkEncoder::finalize(&encoder, &mut session, &path).unwrap();
        BulkEncoder::dispose(&encoder, session);

        let (header, mesh) = DrcMesh::from_bytes(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(header.vertex_count, 3);
        assert_eq!(header.index_width, IndexWidth::U8);
        assert_eq!(mesh.positions, POSITIONS.to_vec());
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_bulk_buffer_size_checked() {
        let encoder = ContainerEncoder::default();
        let mut session = BulkEncoder::create_session(&encoder).unwrap();
        let err = encoder
            .add_positions(&mut session, 4, &pack_attribute(&POSITIONS))
            .unwrap_err();
        assert!(matches!(err, EncoderError::BufferSize { expected: 48, found: 36, .. }));
    }

    #[test]
    fn test_bulk_normals_require_positions() {
        let encoder = ContainerEncoder::default();
        let mut session = BulkEncoder::create_session(&encoder).unwrap();
        let err = encoder
            .add_normals(&mut session, 3, &pack_attribute(&POSITIONS))
            .unwrap_err();
        assert!(matches!(err, EncoderError::Protocol(_)));
    }

    #[test]
    fn test_face_out_of_range_rejected_at_finalize() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.drc");
        let encoder = ContainerEncoder::default();

        let mut session = bulk_session(&encoder);
        encoder
            .set_faces(&mut session, 3, IndexWidth::U8, &[0, 1, 3])
            .unwrap();
        let err = BulkEncoder::finalize(&encoder, &mut session, &path).unwrap_err();
        assert!(matches!(err, EncoderError::FaceOutOfRange { index: 3, point_count: 3 }));
        assert!(!path.exists());
    }

    #[test]
    fn test_no_calls_after_finalize() {
        let dir = tempdir().unwrap();
        let encoder = ContainerEncoder::default();
        let mut session = bulk_session(&encoder);
        BulkEncoder::finalize(&encoder, &mut session, &dir.path().join("a.drc")).unwrap();

        let err = BulkEncoder::finalize(&encoder, &mut session, &dir.path().join("b.drc"))
            .unwrap_err();
        assert!(matches!(err, EncoderError::Finalized));
        assert!(matches!(
            encoder.add_texcoords(&mut session, 3, &[0; 24]),
            Err(EncoderError::Finalized)
        ));
        assert!(!dir.path().join("b.drc").exists());
    }

    #[test]
    fn test_scalar_point_count_must_match_announcement() {
        let dir = tempdir().unwrap();
        let encoder = ContainerEncoder::default();
        let mut session = ScalarEncoder::create_session(&encoder, 2).unwrap();
        encoder.add_position(&mut session, 0.0, 0.0, 0.0).unwrap();

        let err = ScalarEncoder::finalize(&encoder, &mut session, &dir.path().join("x.drc"))
            .unwrap_err();
        assert!(matches!(err, EncoderError::CountMismatch { expected: 2, found: 1, .. }));

        encoder.add_position(&mut session, 1.0, 0.0, 0.0).unwrap();
        assert!(encoder.add_position(&mut session, 2.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_scalar_texcoord_channels_in_order() {
        let encoder = ContainerEncoder::default();
        let mut session = ScalarEncoder::create_session(&encoder, 1).unwrap();
        assert!(encoder.add_texcoord(&mut session, 1, 0.0, 0.0).is_err());
        encoder.add_texcoord(&mut session, 0, 0.5, 0.5).unwrap();
        encoder.add_texcoord(&mut session, 1, 0.5, 0.5).unwrap();
        assert_eq!(session.mesh().texcoords.len(), 2);
    }

    #[test]
    fn test_bindings_write_identical_bytes() {
        let dir = tempdir().unwrap();
        let bulk_path = dir.path().join("bulk.drc");
        let scalar_path = dir.path().join("scalar.drc");
        let encoder = ContainerEncoder::default();
        let normals = [[0.0f32, 0.0, 1.0]; 3];

        let mut bulk = bulk_session(&encoder);
        encoder.add_normals(&mut bulk, 3, &pack_attribute(&normals)).unwrap();
        encoder
            .set_faces(&mut bulk, 3, IndexWidth::U32, &pack_indices(&[0, 1, 2], IndexWidth::U32).unwrap())
            .unwrap();
        BulkEncoder::finalize(&encoder, &mut bulk, &bulk_path).unwrap();

        let mut scalar = ScalarEncoder::create_session(&encoder, 3).unwrap();
        for (p, n) in POSITIONS.iter().zip(&normals) {
            encoder.add_position(&mut scalar, p[0], p[1], p[2]).unwrap();
            encoder.add_normal(&mut scalar, n[0], n[1], n[2]).unwrap();
        }
        encoder.add_face(&mut scalar, 0, 1, 2).unwrap();
        ScalarEncoder::finalize(&encoder, &mut scalar, &scalar_path).unwrap();

        assert_eq!(
            std::fs::read(&bulk_path).unwrap(),
            std::fs::read(&scalar_path).unwrap()
        );
    }

    #[test]
    fn test_bulk_skin_channels_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("skinned.drc");
        let encoder = ContainerEncoder::default();
        let joints: [[u16; 4]; 3] = [[0, 1, 0, 0], [1, 0, 0, 0], [2, 3, 4, 5]];
        let weights = [[0.5f32, 0.5, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0], [0.25; 4]];

        let mut session = bulk_session(&encoder);
        encoder.add_joints(&mut session, 3, &pack_attribute(&joints)).unwrap();
        encoder.add_weights(&mut session, 3, &pack_attribute(&weights)).unwrap();
        BulkEncoder::finalize(&encoder, &mut session, &path).unwrap();

        let (header, mesh) = DrcMesh::from_bytes(&std::fs::read(&path).unwrap()).unwrap();
        assert!(header.has_joints());
        assert!(header.has_weights());
        assert_eq!(mesh.joints, joints.to_vec());
        assert_eq!(mesh.weights, weights.to_vec());
    }

    #[test]
    fn test_bulk_joints_checked() {
        let encoder = ContainerEncoder::default();
        let mut session = BulkEncoder::create_session(&encoder).unwrap();
        let joints = [[0u16; 4]; 3];
        assert!(matches!(
            encoder.add_joints(&mut session, 3, &pack_attribute(&joints)),
            Err(EncoderError::Protocol(_))
        ));

        let mut session = bulk_session(&encoder);
        let err = encoder
            .add_joints(&mut session, 2, &pack_attribute(&joints[..2]))
            .unwrap_err();
        assert!(matches!(err, EncoderError::CountMismatch { expected: 3, found: 2, .. }));

        // 3 joints of 8 bytes each, one byte short
        let err = encoder
            .add_joints(&mut session, 3, &pack_attribute(&joints)[..23])
            .unwrap_err();
        assert!(matches!(err, EncoderError::BufferSize { expected: 24, found: 23, .. }));
    }

    #[test]
    fn test_scalar_short_weights_rejected_at_finalize() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.drc");
        let encoder = ContainerEncoder::default();
        let mut session = ScalarEncoder::create_session(&encoder, 2).unwrap();
        for p in &POSITIONS[..2] {
            encoder.add_position(&mut session, p[0], p[1], p[2]).unwrap();
        }
        encoder.add_weight(&mut session, [1.0, 0.0, 0.0, 0.0]).unwrap();

        let err = ScalarEncoder::finalize(&encoder, &mut session, &path).unwrap_err();
        assert!(matches!(
            err,
            EncoderError::CountMismatch { attribute: "weight", expected: 2, found: 1 }
        ));
        assert!(!path.exists());
    }
}
