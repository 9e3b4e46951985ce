//! Mesh merging and index remapping
//!
//! Objects are merged one at a time, in scene order. Each object's vertices
//! are transformed to world space and appended; each polygon is triangulated
//! and its local indices are shifted by the running vertex offset:
//!
//! ```text
//! local:  [ 0 1 2 3 ] [ 0 1 2 ]
//! global: [ 0 1 2 3     4 5 6 ]
//! ```

use bytemuck::{Pod, Zeroable};

use crate::config::TexcoordPolicy;
use crate::error::ExportError;
use crate::scene::SceneObject;
use crate::transform::ObjectTransform;
use crate::triangulate::{UnsupportedArity, triangulate};

/// Triangle of global vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct GlobalFace(pub [u32; 3]);

impl GlobalFace {
    #[inline]
    pub fn indices(&self) -> [u32; 3] {
        self.0
    }

    /// View a face list as a flat index list
    #[inline]
    pub fn flatten(faces: &[GlobalFace]) -> &[u32] {
        bytemuck::cast_slice(faces)
    }
}

/// World-space attributes and faces of every merged object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedBuffer {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// One array per channel, each aligned to `positions`
    pub texcoords: Vec<Vec<[f32; 2]>>,
    /// Empty unless some object carries joints
    pub joints: Vec<[u16; 4]>,
    /// Empty unless some object carries weights
    pub weights: Vec<[f32; 4]>,
    pub faces: Vec<GlobalFace>,
    /// Objects that contributed vertices
    pub object_count: usize,
}

impl MergedBuffer {
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Incremental merger holding the running vertex offset
#[derive(Debug)]
pub struct Merger {
    buffer: MergedBuffer,
    vertex_offset: u32,
    texcoord_policy: TexcoordPolicy,
}

impl Merger {
    pub fn new(texcoord_policy: TexcoordPolicy) -> Self {
        Self {
            buffer: MergedBuffer::default(),
            vertex_offset: 0,
            texcoord_policy,
        }
    }

    /// Sum of the vertex counts of all objects merged so far
    #[inline]
    pub fn vertex_offset(&self) -> u32 {
        self.vertex_offset
    }

    /// Transform, triangulate and append one object
    ///
    /// On error the merger is left unchanged.
    pub fn push_object(&mut self, object: &SceneObject) -> Result<(), ExportError> {
        let mesh = &object.mesh;
        let vertex_count = mesh.vertex_count();

        if mesh.normals.len() != vertex_count {
            return Err(attribute_mismatch(object, "normals", mesh.normals.len()));
        }
        for (channel, uvs) in mesh.texcoords.iter().enumerate() {
            if uvs.len() != vertex_count {
                let attribute = format!("texcoord channel {}", channel);
                return Err(attribute_mismatch(object, &attribute, uvs.len()));
            }
        }
        if !mesh.joints.is_empty() && mesh.joints.len() != vertex_count {
            return Err(attribute_mismatch(object, "joints", mesh.joints.len()));
        }
        if !mesh.weights.is_empty() && mesh.weights.len() != vertex_count {
            return Err(attribute_mismatch(object, "weights", mesh.weights.len()));
        }

        if vertex_count == 0 {
            if let Some(polygon) = mesh.polygons.first() {
                return Err(ExportError::IndexOutOfRange {
                    object: object.name.clone(),
                    polygon: 0,
                    index: polygon.first().copied().unwrap_or(0),
                    vertex_count: 0,
                });
            }
            tracing::debug!("Skipping object '{}': no vertices", object.name);
            return Ok(());
        }

        let scene_channels = self.buffer.texcoords.len();
        if self.texcoord_policy == TexcoordPolicy::Strict
            && self.buffer.object_count > 0
            && mesh.texcoords.len() != scene_channels
        {
            return Err(ExportError::TexcoordChannelMismatch {
                object: object.name.clone(),
                expected: scene_channels,
                found: mesh.texcoords.len(),
            });
        }

        let offset = self.vertex_offset;
        let total = offset as u64 + vertex_count as u64;
        if total > u32::MAX as u64 {
            return Err(ExportError::IndexWidthOverflow {
                vertex_count: total,
                width: 4,
            });
        }

        let transform = match object.normal_matrix {
            Some(normal) => ObjectTransform::with_normal_matrix(object.world, normal),
            None => ObjectTransform::new(object.world),
        }
        .map_err(|_| degenerate(object))?;

        // Faces first: nothing is committed unless the whole object is valid
        let mut faces = Vec::with_capacity(mesh.polygons.len() * 2);
        for (polygon_index, polygon) in mesh.polygons.iter().enumerate() {
            let triangles = triangulate(polygon).map_err(|UnsupportedArity(arity)| {
                ExportError::UnsupportedPolygon {
                    object: object.name.clone(),
                    polygon: polygon_index,
                    vertex_count: arity,
                }
            })?;
            if let Some(&index) = polygon.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(ExportError::IndexOutOfRange {
                    object: object.name.clone(),
                    polygon: polygon_index,
                    index,
                    vertex_count,
                });
            }
            faces.extend(
                triangles
                    .iter()
                    .map(|&[a, b, c]| GlobalFace([a + offset, b + offset, c + offset])),
            );
        }

        let positions: Vec<[f32; 3]> = mesh
            .positions
            .iter()
            .map(|&p| transform.apply_position(p))
            .collect();
        let normals = mesh
            .normals
            .iter()
            .map(|&n| transform.apply_normal(n))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| degenerate(object))?;

        // Late channels are backfilled for the vertices already merged
        let merged_vertices = offset as usize;
        while self.buffer.texcoords.len() < mesh.texcoords.len() {
            if self.buffer.object_count > 0 {
                tracing::warn!(
                    "Object '{}' adds texcoord channel {}, padding {} earlier vertices",
                    object.name,
                    self.buffer.texcoords.len(),
                    merged_vertices
                );
            }
            self.buffer.texcoords.push(vec![[0.0, 0.0]; merged_vertices]);
        }
        for (channel, merged) in self.buffer.texcoords.iter_mut().enumerate() {
            match mesh.texcoords.get(channel) {
                Some(uvs) => merged.extend_from_slice(uvs),
                None => merged.resize(merged_vertices + vertex_count, [0.0, 0.0]),
            }
        }
        if mesh.texcoords.len() < self.buffer.texcoords.len() {
            tracing::debug!(
                "Object '{}' has {} of {} texcoord channels, padding with zeros",
                object.name,
                mesh.texcoords.len(),
                self.buffer.texcoords.len()
            );
        }
        merge_skin_channel(&mut self.buffer.joints, &mesh.joints, merged_vertices, vertex_count);
        merge_skin_channel(&mut self.buffer.weights, &mesh.weights, merged_vertices, vertex_count);

        tracing::debug!(
            "Merged object '{}': {} vertices, {} faces at offset {}",
            object.name,
            vertex_count,
            faces.len(),
            offset
        );

        self.buffer.positions.extend(positions);
        self.buffer.normals.extend(normals);
        self.buffer.faces.extend(faces);
        self.buffer.object_count += 1;
        self.vertex_offset = total as u32;
        Ok(())
    }

    pub fn finish(self) -> MergedBuffer {
        self.buffer
    }
}

/// Merge every object in order, stopping at the first error
pub fn merge_objects(
    objects: &[SceneObject],
    texcoord_policy: TexcoordPolicy,
) -> Result<MergedBuffer, ExportError> {
    let mut merger = Merger::new(texcoord_policy);
    for object in objects {
        merger.push_object(object)?;
    }
    Ok(merger.finish())
}

/// Append an optional skinning channel, zero-filling vertices of objects
/// without it once any object has it
fn merge_skin_channel<T: Copy + Default>(
    merged: &mut Vec<T>,
    source: &[T],
    merged_vertices: usize,
    vertex_count: usize,
) {
    if source.is_empty() {
        if !merged.is_empty() {
            merged.resize(merged_vertices + vertex_count, T::default());
        }
    } else {
        merged.resize(merged_vertices, T::default());
        merged.extend_from_slice(source);
    }
}

fn attribute_mismatch(object: &SceneObject, attribute: &str, found: usize) -> ExportError {
    ExportError::AttributeLengthMismatch {
        object: object.name.clone(),
        attribute: attribute.to_string(),
        expected: object.mesh.vertex_count(),
        found,
    }
}

fn degenerate(object: &SceneObject) -> ExportError {
    ExportError::DegenerateTransform {
        object: object.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SourceMesh;
    use glam::{Mat4, Vec3};

    /// Unit quad in the XY plane, one quad polygon
    fn quad() -> SourceMesh {
        let mut mesh = SourceMesh::new();
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]] {
            mesh.push_vertex(p, [0.0, 0.0, 1.0]);
        }
        mesh.push_polygon(&[0, 1, 2, 3]);
        mesh
    }

    fn triangle() -> SourceMesh {
        let mut mesh = SourceMesh::new();
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            mesh.push_vertex(p, [0.0, 0.0, 1.0]);
        }
        mesh.push_polygon(&[0, 1, 2]);
        mesh
    }

    fn object(name: &str, mesh: SourceMesh) -> SceneObject {
        SceneObject::new(name, mesh, Mat4::IDENTITY)
    }

    #[test]
    fn test_merge_empty() {
        let merged = merge_objects(&[], TexcoordPolicy::Pad).unwrap();
        assert_eq!(merged.vertex_count(), 0);
        assert!(merged.faces.is_empty());
    }

    #[test]
    fn test_merge_offsets_second_mesh() {
        let merged = merge_objects(
            &[object("a", quad()), object("b", triangle())],
            TexcoordPolicy::Pad,
        )
        .unwrap();

        assert_eq!(merged.vertex_count(), 7);
        assert_eq!(
            merged.faces,
            vec![
                GlobalFace([0, 1, 2]),
                GlobalFace([0, 2, 3]),
                GlobalFace([4, 5, 6]),
            ]
        );
    }

    #[test]
    fn test_vertex_offset_is_running_sum() {
        let mut merger = Merger::new(TexcoordPolicy::Pad);
        let counts = [4usize, 3, 4, 3];
        let mut expected = 0;
        for (i, &count) in counts.iter().enumerate() {
            let mesh = if count == 4 { quad() } else { triangle() };
            merger.push_object(&object(&format!("o{}", i), mesh)).unwrap();
            expected += count as u32;
            assert_eq!(merger.vertex_offset(), expected);
        }

        let merged = merger.finish();
        assert_eq!(merged.vertex_count(), 14);
        for &index in GlobalFace::flatten(&merged.faces) {
            assert!(index < merged.vertex_count());
        }
    }

    #[test]
    fn test_merge_applies_world_transform() {
        let shifted = SceneObject::new(
            "shifted",
            triangle(),
            Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)),
        );
        let merged = merge_objects(&[shifted], TexcoordPolicy::Pad).unwrap();
        assert_eq!(merged.positions[1], [11.0, 0.0, 0.0]);
        assert_eq!(merged.normals[1], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_ngon_fails_whole_merge() {
        let mut pentagon = SourceMesh::new();
        for i in 0..5 {
            let angle = i as f32 * std::f32::consts::TAU / 5.0;
            pentagon.push_vertex([angle.cos(), angle.sin(), 0.0], [0.0, 0.0, 1.0]);
        }
        pentagon.push_polygon(&[0, 1, 2, 3, 4]);

        let err = merge_objects(
            &[object("ok", quad()), object("pentagon", pentagon)],
            TexcoordPolicy::Pad,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ExportError::UnsupportedPolygon { ref object, polygon: 0, vertex_count: 5 } if object == "pentagon"
        ));
    }

    #[test]
    fn test_failed_object_leaves_merger_unchanged() {
        let mut merger = Merger::new(TexcoordPolicy::Pad);
        merger.push_object(&object("a", quad())).unwrap();

        let mut broken = triangle();
        broken.push_polygon(&[0, 1]);
        assert!(merger.push_object(&object("broken", broken)).is_err());

        assert_eq!(merger.vertex_offset(), 4);
        assert_eq!(merger.finish().faces.len(), 2);
    }

    #[test]
    fn test_index_out_of_range() {
        let mut mesh = triangle();
        mesh.push_polygon(&[0, 1, 3]);
        let err = merge_objects(&[object("t", mesh)], TexcoordPolicy::Pad).unwrap_err();
        assert!(matches!(err, ExportError::IndexOutOfRange { index: 3, vertex_count: 3, .. }));
    }

    #[test]
    fn test_zero_vertex_mesh_skipped() {
        let merged = merge_objects(
            &[object("empty", SourceMesh::new()), object("t", triangle())],
            TexcoordPolicy::Strict,
        )
        .unwrap();
        assert_eq!(merged.object_count, 1);
        assert_eq!(merged.faces, vec![GlobalFace([0, 1, 2])]);
    }

    #[test]
    fn test_zero_vertex_mesh_with_polygons_fails() {
        let mut mesh = SourceMesh::new();
        mesh.push_polygon(&[0, 1, 2]);
        let err = merge_objects(&[object("hollow", mesh)], TexcoordPolicy::Pad).unwrap_err();
        assert!(matches!(err, ExportError::IndexOutOfRange { vertex_count: 0, .. }));
    }

    #[test]
    fn test_degenerate_transform() {
        let flat = SceneObject::new("flat", triangle(), Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0)));
        let err = merge_objects(&[flat], TexcoordPolicy::Pad).unwrap_err();
        assert!(matches!(err, ExportError::DegenerateTransform { .. }));
    }

    #[test]
    fn test_missing_normals_rejected() {
        let mut mesh = triangle();
        mesh.normals.pop();
        let err = merge_objects(&[object("t", mesh)], TexcoordPolicy::Pad).unwrap_err();
        assert!(matches!(
            err,
            ExportError::AttributeLengthMismatch { expected: 3, found: 2, .. }
        ));
    }

    #[test]
    fn test_texcoords_padded_both_ways() {
        let plain = quad();
        let mut uv = triangle();
        uv.texcoords.push(vec![[0.1, 0.1], [0.2, 0.2], [0.3, 0.3]]);

        let merged = merge_objects(
            &[object("plain", plain.clone()), object("uv", uv), object("plain2", plain)],
            TexcoordPolicy::Pad,
        )
        .unwrap();

        assert_eq!(merged.texcoords.len(), 1);
        let channel = &merged.texcoords[0];
        assert_eq!(channel.len(), merged.positions.len());
        assert_eq!(channel[3], [0.0, 0.0]);
        assert_eq!(channel[4], [0.1, 0.1]);
        assert_eq!(channel[7], [0.0, 0.0]);
    }

    #[test]
    fn test_texcoords_strict_mismatch() {
        let mut uv = triangle();
        uv.texcoords.push(vec![[0.0, 0.0]; 3]);

        let err = merge_objects(&[object("plain", quad()), object("uv", uv)], TexcoordPolicy::Strict)
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::TexcoordChannelMismatch { expected: 0, found: 1, .. }
        ));
    }

    #[test]
    fn test_host_normal_matrix_is_used() {
        // A host matrix that flips normals must win over the derived one
        let flipped = object("t", triangle()).with_normal_matrix(Mat4::from_scale(Vec3::splat(-1.0)));
        let merged = merge_objects(&[flipped], TexcoordPolicy::Pad).unwrap();
        assert_eq!(merged.normals[0], [0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_skin_channels_padded_both_ways() {
        let mut skinned = triangle();
        skinned.joints = vec![[1, 2, 0, 0], [3, 0, 0, 0], [4, 5, 6, 7]];
        skinned.weights = vec![[0.5, 0.5, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0], [0.25; 4]];

        let merged = merge_objects(
            &[object("plain", quad()), object("skinned", skinned), object("plain2", triangle())],
            TexcoordPolicy::Pad,
        )
        .unwrap();

        assert_eq!(merged.joints.len(), 10);
        assert_eq!(merged.weights.len(), 10);
        assert_eq!(merged.joints[..4], [[0; 4]; 4]);
        assert_eq!(merged.joints[4], [1, 2, 0, 0]);
        assert_eq!(merged.weights[6], [0.25; 4]);
        assert_eq!(merged.weights[7..], [[0.0; 4]; 3]);
    }

    #[test]
    fn test_unskinned_scene_has_no_skin_channels() {
        let merged = merge_objects(&[object("a", quad())], TexcoordPolicy::Pad).unwrap();
        assert!(merged.joints.is_empty());
        assert!(merged.weights.is_empty());
    }

    #[test]
    fn test_misaligned_weights_rejected() {
        let mut mesh = triangle();
        mesh.weights = vec![[1.0, 0.0, 0.0, 0.0]; 2];
        let err = merge_objects(&[object("t", mesh)], TexcoordPolicy::Pad).unwrap_err();
        match err {
            ExportError::AttributeLengthMismatch { attribute, expected, found, .. } => {
                assert_eq!(attribute, "weights");
                assert_eq!((expected, found), (3, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_singular_host_normal_matrix_rejected() {
        let flat = object("t", triangle())
            .with_normal_matrix(Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0)));
        let err = merge_objects(&[flat], TexcoordPolicy::Pad).unwrap_err();
        assert!(matches!(err, ExportError::DegenerateTransform { .. }));
    }
}
