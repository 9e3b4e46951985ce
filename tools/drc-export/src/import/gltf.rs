//! glTF/GLB scene collector
//!
//! Walks the node hierarchy of the default scene. Every triangle primitive of
//! every mesh node becomes one scene object carrying the node's accumulated
//! world matrix.

use anyhow::{Context, Result, bail};
use glam::Mat4;
use gltf::mesh::Mode;
use std::path::Path;

use super::smooth_normals;
use crate::scene::{Polygon, SceneCollector, SceneObject, SourceMesh};

/// Scene loaded from a glTF or GLB file
#[derive(Debug, Clone)]
pub struct GltfScene {
    objects: Vec<SceneObject>,
}

impl GltfScene {
    pub fn open(input: &Path) -> Result<Self> {
        let (document, buffers, _images) =
            gltf::import(input).with_context(|| format!("Failed to load glTF: {:?}", input))?;

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .context("No scenes found in glTF")?;

        let mut objects = Vec::new();
        for node in scene.nodes() {
            visit_node(&node, Mat4::IDENTITY, &buffers, &mut objects)?;
        }

        tracing::debug!(
            "Loaded {} mesh primitives from scene {:?}",
            objects.len(),
            scene.name().unwrap_or("<unnamed>")
        );
        Ok(Self { objects })
    }
}

impl SceneCollector for GltfScene {
    fn mesh_objects(&self) -> Result<Vec<SceneObject>> {
        Ok(self.objects.clone())
    }
}

fn visit_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    objects: &mut Vec<SceneObject>,
) -> Result<()> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let base_name = mesh
            .name()
            .or_else(|| node.name())
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh{}", mesh.index()));

        for primitive in mesh.primitives() {
            let name = format!("{}/{}", base_name, primitive.index());
            let source = read_primitive(&primitive, buffers)
                .with_context(|| format!("Failed to read primitive {:?}", name))?;
            objects.push(SceneObject::new(name, source, world));
        }
    }

    for child in node.children() {
        visit_node(&child, world, buffers, objects)?;
    }
    Ok(())
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> Result<SourceMesh> {
    if primitive.mode() != Mode::Triangles {
        bail!(
            "Unsupported primitive mode {:?} (only triangle lists are exported)",
            primitive.mode()
        );
    }

    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .context("No positions in primitive")?
        .collect();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(iter) => iter.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    if indices.len() % 3 != 0 {
        bail!("Index count {} is not a multiple of 3", indices.len());
    }
    let polygons: Vec<Polygon> = indices.chunks_exact(3).map(Polygon::from_slice).collect();

    let normals = match reader.read_normals() {
        Some(iter) => iter.collect(),
        None => smooth_normals(&positions, &polygons),
    };

    let mut texcoords = Vec::new();
    while let Some(iter) = reader.read_tex_coords(texcoords.len() as u32) {
        texcoords.push(iter.into_f32().collect());
    }

    // Skinning data (optional) - JOINTS_0 and WEIGHTS_0
    let joints: Vec<[u16; 4]> = reader
        .read_joints(0)
        .map(|iter| iter.into_u16().collect())
        .unwrap_or_default();
    let weights: Vec<[f32; 4]> = reader
        .read_weights(0)
        .map(|iter| iter.into_f32().collect())
        .unwrap_or_default();

    Ok(SourceMesh {
        positions,
        normals,
        texcoords,
        joints,
        weights,
        polygons,
    })
}
