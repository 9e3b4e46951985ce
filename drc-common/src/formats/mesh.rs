//! DrcMesh container format (.drc)
//!
//! Uncompressed, little-endian mesh container written by the bundled
//! reference encoder. Carries the encoder settings it was produced with so a
//! native compressor can be swapped in without changing the pipeline.
//!
//! # Layout
//! ```text
//! 0x00: magic "DRCX"
//! 0x04: version u8
//! 0x05: index_width u8 (1, 2 or 4)
//! 0x06: texcoord_channels u8
//! 0x07: compression_level u8
//! 0x08: vertex_count u32
//! 0x0C: face_count u32
//! 0x10: quantization bits u8 x4 (position, normal, texcoord, generic)
//! 0x14: flags u8 (bit 0: normals, bit 1: joints, bit 2: weights)
//! 0x15: padding (3 bytes)
//! 0x18: positions (vertex_count * 3 * f32)
//! var:  normals (vertex_count * 3 * f32), if FLAG_NORMALS
//! var:  texcoords (texcoord_channels * vertex_count * 2 * f32)
//! var:  joints (vertex_count * 4 * u16), if FLAG_JOINTS
//! var:  weights (vertex_count * 4 * f32), if FLAG_WEIGHTS
//! var:  indices (face_count * 3 * index_width)
//! ```

use anyhow::{Context, Result, bail, ensure};

use crate::packing::IndexWidth;

/// Container magic bytes
pub const DRC_MAGIC: [u8; 4] = *b"DRCX";
/// Current container version
pub const DRC_VERSION: u8 = 1;
/// Header flag: normal attribute present
pub const FLAG_NORMALS: u8 = 1;
/// Header flag: skinning joint indices present
pub const FLAG_JOINTS: u8 = 2;
/// Header flag: skinning weights present
pub const FLAG_WEIGHTS: u8 = 4;

/// Quantization bits per attribute kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantization {
    pub position: u8,
    pub normal: u8,
    pub texcoord: u8,
    pub generic: u8,
}

impl Default for Quantization {
    fn default() -> Self {
        Self {
            position: 14,
            normal: 10,
            texcoord: 12,
            generic: 12,
        }
    }
}

/// Encoder settings recorded in the container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingSettings {
    /// 0 (fastest) to 10 (smallest)
    pub compression_level: u8,
    pub quantization: Quantization,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            compression_level: 7,
            quantization: Quantization::default(),
        }
    }
}

/// DrcMesh header (24 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrcMeshHeader {
    pub version: u8,
    pub index_width: IndexWidth,
    pub texcoord_channels: u8,
    pub vertex_count: u32,
    pub face_count: u32,
    pub settings: EncodingSettings,
    pub flags: u8,
}

impl DrcMeshHeader {
    pub const SIZE: usize = 24;

    pub fn new(
        vertex_count: u32,
        face_count: u32,
        index_width: IndexWidth,
        texcoord_channels: u8,
        flags: u8,
        settings: EncodingSettings,
    ) -> Self {
        Self {
            version: DRC_VERSION,
            index_width,
            texcoord_channels,
            vertex_count,
            face_count,
            settings,
            flags,
        }
    }

    #[inline]
    pub fn has_normals(&self) -> bool {
        self.flags & FLAG_NORMALS != 0
    }

    #[inline]
    pub fn has_joints(&self) -> bool {
        self.flags & FLAG_JOINTS != 0
    }

    #[inline]
    pub fn has_weights(&self) -> bool {
        self.flags & FLAG_WEIGHTS != 0
    }

    /// Size of the body following the header
    pub fn body_size(&self) -> usize {
        let vertices = self.vertex_count as usize;
        let mut size = vertices * 12;
        if self.has_normals() {
            size += vertices * 12;
        }
        size += self.texcoord_channels as usize * vertices * 8;
        if self.has_joints() {
            size += vertices * 8;
        }
        if self.has_weights() {
            size += vertices * 16;
        }
        size += self.face_count as usize * 3 * self.index_width.bytes();
        size
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let q = self.settings.quantization;
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&DRC_MAGIC);
        bytes[4] = self.version;
        bytes[5] = self.index_width as u8;
        bytes[6] = self.texcoord_channels;
        bytes[7] = self.settings.compression_level;
        bytes[8..12].copy_from_slice(&self.vertex_count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.face_count.to_le_bytes());
        bytes[16..20].copy_from_slice(&[q.position, q.normal, q.texcoord, q.generic]);
        bytes[20] = self.flags;
        // padding bytes stay 0
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE || bytes[0..4] != DRC_MAGIC {
            return None;
        }
        Some(Self {
            version: bytes[4],
            index_width: IndexWidth::from_bytes(bytes[5])?,
            texcoord_channels: bytes[6],
            vertex_count: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            face_count: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            settings: EncodingSettings {
                compression_level: bytes[7],
                quantization: Quantization {
                    position: bytes[16],
                    normal: bytes[17],
                    texcoord: bytes[18],
                    generic: bytes[19],
                },
            },
            flags: bytes[20],
        })
    }
}

/// Complete in-memory mesh of one container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrcMesh {
    pub positions: Vec<[f32; 3]>,
    /// Empty, or one normal per position
    pub normals: Vec<[f32; 3]>,
    /// One array per channel, each aligned to `positions`
    pub texcoords: Vec<Vec<[f32; 2]>>,
    /// Empty, or four skinning joint indices per position
    pub joints: Vec<[u16; 4]>,
    /// Empty, or four skinning weights per position
    pub weights: Vec<[f32; 4]>,
    /// Flat triangle list (3 indices per face)
    pub indices: Vec<u32>,
    pub settings: EncodingSettings,
}

impl DrcMesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Header flags for the attributes present
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if !self.normals.is_empty() {
            flags |= FLAG_NORMALS;
        }
        if !self.joints.is_empty() {
            flags |= FLAG_JOINTS;
        }
        if !self.weights.is_empty() {
            flags |= FLAG_WEIGHTS;
        }
        flags
    }

    /// Serialize with the given index width
    pub fn to_bytes(&self, index_width: IndexWidth) -> Result<Vec<u8>> {
        let vertex_count = self.vertex_count();
        ensure!(
            self.normals.is_empty() || self.normals.len() == vertex_count,
            "normal count {} does not match vertex count {}",
            self.normals.len(),
            vertex_count
        );
        ensure!(
            self.joints.is_empty() || self.joints.len() == vertex_count,
            "joint count {} does not match vertex count {}",
            self.joints.len(),
            vertex_count
        );
        ensure!(
            self.weights.is_empty() || self.weights.len() == vertex_count,
            "weight count {} does not match vertex count {}",
            self.weights.len(),
            vertex_count
        );
        ensure!(
            self.indices.len() % 3 == 0,
            "index count {} is not a multiple of 3",
            self.indices.len()
        );
        let channels = u8::try_from(self.texcoords.len())
            .with_context(|| format!("too many texcoord channels: {}", self.texcoords.len()))?;

        let header = DrcMeshHeader::new(
            u32::try_from(vertex_count).context("vertex count exceeds u32")?,
            u32::try_from(self.face_count()).context("face count exceeds u32")?,
            index_width,
            channels,
            self.flags(),
            self.settings,
        );

        let mut out = Vec::with_capacity(DrcMeshHeader::SIZE + header.body_size());
        out.extend_from_slice(&header.to_bytes());
        write_floats(&mut out, self.positions.iter().flatten());
        write_floats(&mut out, self.normals.iter().flatten());
        for (channel, uvs) in self.texcoords.iter().enumerate() {
            ensure!(
                uvs.len() == vertex_count,
                "texcoord channel {} has {} entries, expected {}",
                channel,
                uvs.len(),
                vertex_count
            );
            write_floats(&mut out, uvs.iter().flatten());
        }
        for &joint in self.joints.iter().flatten() {
            out.extend_from_slice(&joint.to_le_bytes());
        }
        write_floats(&mut out, self.weights.iter().flatten());
        for &index in &self.indices {
            ensure!(
                index <= index_width.max_index(),
                "index {} does not fit in {} byte(s)",
                index,
                index_width.bytes()
            );
            match index_width {
                IndexWidth::U8 => out.push(index as u8),
                IndexWidth::U16 => out.extend_from_slice(&(index as u16).to_le_bytes()),
                IndexWidth::U32 => out.extend_from_slice(&index.to_le_bytes()),
            }
        }
        Ok(out)
    }

    /// Parse a complete container
    pub fn from_bytes(data: &[u8]) -> Result<(DrcMeshHeader, Self)> {
        let header = DrcMeshHeader::from_bytes(data).context("invalid DrcMesh header")?;
        if header.version != DRC_VERSION {
            bail!("unsupported DrcMesh version {}", header.version);
        }
        let body = &data[DrcMeshHeader::SIZE..];
        ensure!(
            body.len() == header.body_size(),
            "DrcMesh body is {} bytes, header describes {}",
            body.len(),
            header.body_size()
        );

        let vertices = header.vertex_count as usize;
        let mut cursor = body;
        let positions = read_elements::<3>(&mut cursor, vertices);
        let normals = if header.has_normals() {
            read_elements::<3>(&mut cursor, vertices)
        } else {
            Vec::new()
        };
        let texcoords = (0..header.texcoord_channels)
            .map(|_| read_elements::<2>(&mut cursor, vertices))
            .collect();
        let joints = if header.has_joints() {
            let (head, tail) = cursor.split_at(vertices * 8);
            cursor = tail;
            head.chunks_exact(8)
                .map(|c| {
                    let mut joint = [0u16; 4];
                    for (value, b) in joint.iter_mut().zip(c.chunks_exact(2)) {
                        *value = u16::from_le_bytes([b[0], b[1]]);
                    }
                    joint
                })
                .collect()
        } else {
            Vec::new()
        };
        let weights = if header.has_weights() {
            read_elements::<4>(&mut cursor, vertices)
        } else {
            Vec::new()
        };

        let width = header.index_width.bytes();
        let indices = cursor
            .chunks_exact(width)
            .map(|c| match header.index_width {
                IndexWidth::U8 => c[0] as u32,
                IndexWidth::U16 => u16::from_le_bytes([c[0], c[1]]) as u32,
                IndexWidth::U32 => u32::from_le_bytes([c[0], c[1], c[2], c[3]]),
            })
            .collect();

        let mesh = Self {
            positions,
            normals,
            texcoords,
            joints,
            weights,
            indices,
            settings: header.settings,
        };
        Ok((header, mesh))
    }
}

fn write_floats<'a>(out: &mut Vec<u8>, values: impl Iterator<Item = &'a f32>) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Read `count` elements and advance the cursor (length already validated)
fn read_elements<const N: usize>(cursor: &mut &[u8], count: usize) -> Vec<[f32; N]> {
    let (head, tail) = cursor.split_at(count * N * 4);
    *cursor = tail;
    head.chunks_exact(N * 4)
        .map(|chunk| {
            let mut element = [0.0f32; N];
            for (value, b) in element.iter_mut().zip(chunk.chunks_exact(4)) {
                *value = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            }
            element
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> DrcMesh {
        DrcMesh {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            texcoords: vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]],
            indices: vec![0, 1, 2, 0, 2, 3],
            ..DrcMesh::default()
        }
    }

    #[test]
    fn test_header_layout() {
        let header = DrcMeshHeader::new(4, 2, IndexWidth::U16, 1, FLAG_NORMALS, EncodingSettings::default());
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"DRCX");
        assert_eq!(bytes[5], 2);
        assert_eq!(bytes[7], 7);
        assert_eq!(&bytes[16..20], &[14, 10, 12, 12]);
        assert_eq!(DrcMeshHeader::from_bytes(&bytes), Some(header));
    }

    #[test]
    fn test_header_rejects_bad_magic_and_width() {
        let mut bytes = DrcMeshHeader::new(0, 0, IndexWidth::U8, 0, 0, EncodingSettings::default())
            .to_bytes();
        bytes[5] = 3;
        assert!(DrcMeshHeader::from_bytes(&bytes).is_none());
        bytes[5] = 1;
        bytes[0] = b'X';
        assert!(DrcMeshHeader::from_bytes(&bytes).is_none());
    }

    #[test]
    fn test_container_size_matches_header() {
        let mesh = quad_mesh();
        let bytes = mesh.to_bytes(IndexWidth::U8).unwrap();
        // header + positions + normals + 1 uv channel + 6 one-byte indices
        assert_eq!(bytes.len(), 24 + 48 + 48 + 32 + 6);

        let (header, decoded) = DrcMesh::from_bytes(&bytes).unwrap();
        assert_eq!(header.vertex_count, 4);
        assert_eq!(header.face_count, 2);
        assert_eq!(decoded, mesh);
    }

    #[test]
    fn test_skinned_container_layout() {
        let mut mesh = quad_mesh();
        mesh.joints = vec![[0, 1, 2, 3], [4, 5, 6, 7], [8, 9, 10, 11], [300, 0, 0, 0]];
        mesh.weights = vec![[0.25; 4]; 4];
        let bytes = mesh.to_bytes(IndexWidth::U8).unwrap();
        // plain quad + 4 * (4 u16 joints + 4 f32 weights)
        assert_eq!(bytes.len(), 24 + 48 + 48 + 32 + 6 + 32 + 64);
        // first joint index directly follows the uv channel
        assert_eq!(&bytes[152..154], &0u16.to_le_bytes());
        assert_eq!(&bytes[176..178], &300u16.to_le_bytes());

        let (header, decoded) = DrcMesh::from_bytes(&bytes).unwrap();
        assert!(header.has_joints());
        assert!(header.has_weights());
        assert_eq!(decoded, mesh);
    }

    #[test]
    fn test_misaligned_joints_rejected() {
        let mut mesh = quad_mesh();
        mesh.joints = vec![[0; 4]; 3];
        assert!(mesh.to_bytes(IndexWidth::U8).is_err());
    }

    #[test]
    fn test_truncated_container_is_rejected() {
        let bytes = quad_mesh().to_bytes(IndexWidth::U32).unwrap();
        let err = DrcMesh::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.to_string().contains("body"));
    }

    #[test]
    fn test_index_too_wide_for_width() {
        let mut mesh = quad_mesh();
        mesh.indices[0] = 300;
        assert!(mesh.to_bytes(IndexWidth::U8).is_err());
    }
}
