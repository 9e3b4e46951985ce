//! Scene model consumed by the exporter
//!
//! A host application (or one of the file adapters in [`crate::import`])
//! exposes its geometry through [`SceneCollector`]: a list of mesh objects,
//! each a [`SourceMesh`] snapshot with its world transform.

use glam::Mat4;
use smallvec::SmallVec;

/// Polygon as an ordered list of mesh-local vertex indices
///
/// Triangles and quads stay inline; longer polygons spill to the heap and are
/// rejected by the triangulator.
pub type Polygon = SmallVec<[u32; 4]>;

/// Render-ready mesh snapshot with modifiers already applied
///
/// Attributes are stored per vertex, in parallel arrays aligned to
/// `positions`. Skinning channels are optional: each is either empty or
/// vertex-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinate channels (`TEXCOORD_0`, `TEXCOORD_1`, ...)
    pub texcoords: Vec<Vec<[f32; 2]>>,
    /// Four bone indices per vertex (`JOINTS_0`)
    pub joints: Vec<[u16; 4]>,
    /// Four bone weights per vertex (`WEIGHTS_0`)
    pub weights: Vec<[f32; 4]>,
    pub polygons: Vec<Polygon>,
}

impl SourceMesh {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Append a vertex without texture coordinates
    pub fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3]) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(normal);
        index
    }

    /// Append a polygon from local indices
    pub fn push_polygon(&mut self, indices: &[u32]) {
        self.polygons.push(Polygon::from_slice(indices));
    }
}

/// One mesh object of the scene
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Object name, used in logs and error messages
    pub name: String,
    pub mesh: SourceMesh,
    /// Model-to-world position matrix
    pub world: Mat4,
    /// Model-to-world normal matrix; derived from `world` when `None`
    pub normal_matrix: Option<Mat4>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, mesh: SourceMesh, world: Mat4) -> Self {
        Self {
            name: name.into(),
            mesh,
            world,
            normal_matrix: None,
        }
    }

    /// Use a host-supplied normal matrix instead of deriving one
    pub fn with_normal_matrix(mut self, normal_matrix: Mat4) -> Self {
        self.normal_matrix = Some(normal_matrix);
        self
    }
}

/// Source of mesh objects for one export
///
/// Implementations enumerate mesh-type objects in a stable order. That order
/// decides which global index range each object occupies.
pub trait SceneCollector {
    fn mesh_objects(&self) -> anyhow::Result<Vec<SceneObject>>;
}

/// In-memory scene, for hosts that already hold their objects
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new(objects: Vec<SceneObject>) -> Self {
        Self { objects }
    }
}

impl SceneCollector for Scene {
    fn mesh_objects(&self) -> anyhow::Result<Vec<SceneObject>> {
        Ok(self.objects.clone())
    }
}

impl<T: SceneCollector + ?Sized> SceneCollector for &T {
    fn mesh_objects(&self) -> anyhow::Result<Vec<SceneObject>> {
        (**self).mesh_objects()
    }
}
