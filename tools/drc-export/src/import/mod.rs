//! File-backed scene collectors (OBJ, glTF/GLB)

mod gltf;
mod obj;

use anyhow::{Result, bail};
use glam::Vec3;
use std::path::Path;

use crate::scene::{Polygon, SceneCollector};

pub use gltf::GltfScene;
pub use obj::ObjScene;

/// Normal used for vertices no polygon contributes a direction to
const FALLBACK_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];

/// Open a scene file, picking the adapter by extension
pub fn open_scene(input: &Path) -> Result<Box<dyn SceneCollector>> {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "obj" => Ok(Box::new(ObjScene::open(input)?)),
        "gltf" | "glb" => Ok(Box::new(GltfScene::open(input)?)),
        _ => bail!(
            "Unsupported scene format: {:?} (use .obj, .gltf, or .glb)",
            input
        ),
    }
}

/// Area-weighted smooth normals from polygon geometry
///
/// Uses Newell's method so quads and n-gons contribute a stable normal.
/// Polygons with out-of-range indices are skipped here; the merger reports
/// them.
pub(crate) fn smooth_normals(positions: &[[f32; 3]], polygons: &[Polygon]) -> Vec<[f32; 3]> {
    let mut sums = vec![Vec3::ZERO; positions.len()];
    for polygon in polygons {
        if polygon.iter().any(|&i| i as usize >= positions.len()) {
            continue;
        }
        let mut normal = Vec3::ZERO;
        for (k, &i) in polygon.iter().enumerate() {
            let current = Vec3::from(positions[i as usize]);
            let next = Vec3::from(positions[polygon[(k + 1) % polygon.len()] as usize]);
            normal += (current - next).cross(current + next) * 0.5;
        }
        for &i in polygon.iter() {
            sums[i as usize] += normal;
        }
    }
    sums.into_iter()
        .map(|n| n.try_normalize().map_or(FALLBACK_NORMAL, |n| n.to_array()))
        .collect()
}
