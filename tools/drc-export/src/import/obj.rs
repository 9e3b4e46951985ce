//! Wavefront OBJ scene collector
//!
//! Each `o`/`g` section becomes one scene object with an identity world
//! matrix. Unique `v/vt/vn` references are welded into mesh-local vertices,
//! and faces keep their arity so quads and n-gons reach the triangulator.

use anyhow::{Context, Result, bail};
use glam::Mat4;
use hashbrown::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::smooth_normals;
use crate::scene::{Polygon, SceneCollector, SceneObject, SourceMesh};

/// Scene loaded from an OBJ file
#[derive(Debug, Clone)]
pub struct ObjScene {
    objects: Vec<SceneObject>,
}

impl ObjScene {
    /// Parse an OBJ file
    pub fn open(input: &Path) -> Result<Self> {
        let file = File::open(input).with_context(|| format!("Failed to open OBJ: {:?}", input))?;
        let default_name = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("object");
        Self::parse(BufReader::new(file), default_name)
            .with_context(|| format!("Failed to parse OBJ: {:?}", input))
    }

    /// Parse OBJ text from any reader
    pub fn parse<R: BufRead>(reader: R, default_name: &str) -> Result<Self> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut normals_raw: Vec<[f32; 3]> = Vec::new();

        let mut objects = Vec::new();
        let mut current = ObjectBuilder::new(default_name);

        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts[0] {
                "v" if parts.len() >= 4 => positions.push(parse_floats(&parts[1..4], line_number)?),
                "vt" if parts.len() >= 3 => tex_coords.push(parse_floats(&parts[1..3], line_number)?),
                "vn" if parts.len() >= 4 => normals_raw.push(parse_floats(&parts[1..4], line_number)?),
                "o" | "g" => {
                    let name = parts.get(1..).map(|p| p.join(" ")).unwrap_or_default();
                    let name = if name.is_empty() { default_name.to_string() } else { name };
                    if current.is_empty() {
                        current.name = name;
                    } else {
                        let finished = std::mem::replace(&mut current, ObjectBuilder::new(&name));
                        objects.push(finished.build());
                    }
                }
                "f" => {
                    let mut polygon = Polygon::new();
                    for reference in &parts[1..] {
                        let (vi, vti, vni) = parse_obj_vertex(reference).with_context(|| {
                            format!("line {}: invalid face vertex {:?}", line_number + 1, reference)
                        })?;
                        let position = *positions.get(vi).with_context(|| {
                            format!("line {}: vertex {} does not exist", line_number + 1, vi + 1)
                        })?;
                        let uv = match vti {
                            Some(ti) => Some(*tex_coords.get(ti).with_context(|| {
                                format!("line {}: texcoord {} does not exist", line_number + 1, ti + 1)
                            })?),
                            None => None,
                        };
                        let normal = match vni {
                            Some(ni) => Some(*normals_raw.get(ni).with_context(|| {
                                format!("line {}: normal {} does not exist", line_number + 1, ni + 1)
                            })?),
                            None => None,
                        };
                        polygon.push(current.vertex((vi, vti, vni), position, uv, normal));
                    }
                    current.polygons.push(polygon);
                }
                _ => {}
            }
        }

        if !current.is_empty() {
            objects.push(current.build());
        }
        if objects.is_empty() {
            bail!("No faces found in OBJ file");
        }

        Ok(Self { objects })
    }
}

impl SceneCollector for ObjScene {
    fn mesh_objects(&self) -> Result<Vec<SceneObject>> {
        Ok(self.objects.clone())
    }
}

type VertexKey = (usize, Option<usize>, Option<usize>);

/// One `o`/`g` section being accumulated
struct ObjectBuilder {
    name: String,
    welded: HashMap<VertexKey, u32>,
    positions: Vec<[f32; 3]>,
    uvs: Vec<Option<[f32; 2]>>,
    normals: Vec<Option<[f32; 3]>>,
    polygons: Vec<Polygon>,
}

impl ObjectBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            welded: HashMap::new(),
            positions: Vec::new(),
            uvs: Vec::new(),
            normals: Vec::new(),
            polygons: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Local index of a face vertex, welding repeated references
    fn vertex(
        &mut self,
        key: VertexKey,
        position: [f32; 3],
        uv: Option<[f32; 2]>,
        normal: Option<[f32; 3]>,
    ) -> u32 {
        *self.welded.entry(key).or_insert_with(|| {
            let index = self.positions.len() as u32;
            self.positions.push(position);
            self.uvs.push(uv);
            self.normals.push(normal);
            index
        })
    }

    fn build(self) -> SceneObject {
        let mut mesh = SourceMesh {
            positions: self.positions,
            polygons: self.polygons,
            ..SourceMesh::default()
        };

        if self.uvs.iter().any(Option::is_some) {
            if self.uvs.iter().any(Option::is_none) {
                tracing::warn!(
                    "OBJ object '{}' has texcoords on some vertices only, padding with zeros",
                    self.name
                );
            }
            mesh.texcoords
                .push(self.uvs.iter().map(|uv| uv.unwrap_or([0.0, 0.0])).collect());
        }

        mesh.normals = if self.normals.iter().all(Option::is_some) {
            self.normals.into_iter().flatten().collect()
        } else {
            let computed = smooth_normals(&mesh.positions, &mesh.polygons);
            self.normals
                .into_iter()
                .zip(computed)
                .map(|(given, computed)| given.unwrap_or(computed))
                .collect()
        };

        SceneObject::new(self.name, mesh, Mat4::IDENTITY)
    }
}

fn parse_floats<const N: usize>(parts: &[&str], line_number: usize) -> Result<[f32; N]> {
    let mut values = [0.0f32; N];
    for (value, part) in values.iter_mut().zip(parts) {
        *value = part
            .parse()
            .with_context(|| format!("line {}: invalid number {:?}", line_number + 1, part))?;
    }
    Ok(values)
}

/// Parse OBJ vertex reference: "v", "v/vt", "v/vt/vn", or "v//vn"
fn parse_obj_vertex(s: &str) -> Option<VertexKey> {
    let parts: Vec<&str> = s.split('/').collect();

    let vi = parts.first()?.parse::<usize>().ok()?.checked_sub(1)?; // OBJ indices are 1-based

    let vti = match parts.get(1).filter(|s| !s.is_empty()) {
        Some(s) => Some(s.parse::<usize>().ok()?.checked_sub(1)?),
        None => None,
    };

    let vni = match parts.get(2).filter(|s| !s.is_empty()) {
        Some(s) => Some(s.parse::<usize>().ok()?.checked_sub(1)?),
        None => None,
    };

    Some((vi, vti, vni))
}
