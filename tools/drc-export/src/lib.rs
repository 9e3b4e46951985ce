//! drc-export library
//!
//! Aggregates every mesh object of a scene into one globally indexed,
//! triangulated vertex stream and hands it to a geometry encoder session.

pub mod config;
pub mod encoder;
pub mod error;
pub mod import;
pub mod merge;
pub mod pipeline;
pub mod scene;
pub mod sink;
pub mod transform;
pub mod triangulate;

pub use config::{ExportConfig, Strategy, TexcoordPolicy, load_config};
pub use encoder::{BulkEncoder, ContainerEncoder, EncoderError, ScalarEncoder};
pub use error::ExportError;
pub use import::{GltfScene, ObjScene, open_scene};
pub use merge::{GlobalFace, MergedBuffer, Merger, merge_objects};
pub use pipeline::{ExportOutcome, ExportSummary, Exporter, merge_scene};
pub use scene::{Polygon, Scene, SceneCollector, SceneObject, SourceMesh};
