//! Scene export pipeline
//!
//! One export call runs start to finish on the calling thread:
//!
//! 1. collect scene objects and count their vertices
//! 2. open an encoder session through the configured sink
//! 3. merge (transform, triangulate, remap) every object in scene order
//! 4. submit positions, normals, texcoord channels and faces
//! 5. finalize to the destination path
//!
//! Any error before step 5 drops the sink, which disposes the session without
//! finalizing it, so a failed export never writes a file.

use drc_common::IndexWidth;
use std::path::{Path, PathBuf};

use crate::config::{ExportConfig, IndexWidthSetting, Strategy};
use crate::encoder::{BulkEncoder, ScalarEncoder};
use crate::error::ExportError;
use crate::merge::{MergedBuffer, Merger};
use crate::scene::{SceneCollector, SceneObject};
use crate::sink::{AttributeSink, BulkSink, ScalarSink};

/// Result of a successful export call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// A container was written
    Finished(ExportSummary),
    /// No destination path was given; the encoder was never touched
    Skipped,
}

/// Counts reported after a finished export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub destination: PathBuf,
    pub strategy: Strategy,
    pub object_count: usize,
    pub vertex_count: u32,
    pub face_count: usize,
    pub texcoord_channels: usize,
    /// Joint and weight channels were submitted
    pub skinned: bool,
    /// Face index width on the wire (bulk binding only)
    pub index_width: Option<IndexWidth>,
}

/// Runs exports against an injected encoder
///
/// The encoder is borrowed for the exporter's lifetime; each export call opens
/// and releases its own session.
pub struct Exporter<'a, E> {
    encoder: &'a E,
    config: &'a ExportConfig,
}

/// Objects collected for one export, with their total vertex count
struct Prepared {
    objects: Vec<SceneObject>,
    vertex_count: u32,
}

impl<'a, E> Exporter<'a, E> {
    pub fn new(encoder: &'a E, config: &'a ExportConfig) -> Self {
        Self { encoder, config }
    }

    fn prepare<C: SceneCollector + ?Sized>(
        &self,
        scene: &C,
        destination: &Path,
    ) -> Result<Option<Prepared>, ExportError> {
        if destination.as_os_str().is_empty() {
            tracing::warn!("No destination path was provided, nothing to export");
            return Ok(None);
        }

        let objects = scene.mesh_objects().map_err(ExportError::Scene)?;
        let total: u64 = objects.iter().map(|o| o.mesh.vertex_count() as u64).sum();
        let vertex_count = u32::try_from(total).map_err(|_| ExportError::IndexWidthOverflow {
            vertex_count: total,
            width: IndexWidth::U32.bytes(),
        })?;

        tracing::info!(
            "Exporting {} meshes, {} vertices to {:?}",
            objects.len(),
            vertex_count,
            destination
        );
        Ok(Some(Prepared {
            objects,
            vertex_count,
        }))
    }

    /// Merge into an open sink, submit the stream and finalize
    fn run<S: AttributeSink>(
        &self,
        mut sink: S,
        prepared: Prepared,
        destination: &Path,
    ) -> Result<MergedBuffer, ExportError> {
        let mut merger = Merger::new(self.config.export.texcoords);
        for object in &prepared.objects {
            merger.push_object(object)?;
        }
        let merged = merger.finish();

        if merged.positions.is_empty() {
            tracing::warn!("Scene has no mesh geometry, writing an empty container");
        }

        sink.positions(&merged.positions)?;
        sink.normals(&merged.normals)?;
        for channel in &merged.texcoords {
            sink.texcoords(channel)?;
        }
        if !merged.joints.is_empty() {
            sink.joints(&merged.joints)?;
        }
        if !merged.weights.is_empty() {
            sink.weights(&merged.weights)?;
        }
        sink.faces(&merged.faces)?;
        sink.finalize(destination)?;
        Ok(merged)
    }
}

fn summarize(
    merged: &MergedBuffer,
    destination: &Path,
    strategy: Strategy,
    index_width: Option<IndexWidth>,
) -> ExportSummary {
    ExportSummary {
        destination: destination.to_path_buf(),
        strategy,
        object_count: merged.object_count,
        vertex_count: merged.vertex_count(),
        face_count: merged.faces.len(),
        texcoord_channels: merged.texcoords.len(),
        skinned: !merged.joints.is_empty() || !merged.weights.is_empty(),
        index_width,
    }
}

impl<E: BulkEncoder> Exporter<'_, E> {
    /// Export through the bulk binding
    pub fn export_bulk<C: SceneCollector + ?Sized>(
        &self,
        scene: &C,
        destination: &Path,
    ) -> Result<ExportOutcome, ExportError> {
        let Some(prepared) = self.prepare(scene, destination)? else {
            return Ok(ExportOutcome::Skipped);
        };

        let setting = self.config.export.index_width;
        let width = setting
            .resolve(prepared.vertex_count)
            .ok_or_else(|| ExportError::IndexWidthOverflow {
                vertex_count: prepared.vertex_count as u64,
                width: match setting {
                    IndexWidthSetting::Fixed(width) => width.bytes(),
                    IndexWidthSetting::Auto => IndexWidth::U32.bytes(),
                },
            })?;

        let sink = BulkSink::open(self.encoder, width)?;
        let merged = self.run(sink, prepared, destination)?;
        Ok(ExportOutcome::Finished(summarize(
            &merged,
            destination,
            Strategy::Bulk,
            Some(width),
        )))
    }
}

impl<E: ScalarEncoder> Exporter<'_, E> {
    /// Export through the scalar binding
    pub fn export_scalar<C: SceneCollector + ?Sized>(
        &self,
        scene: &C,
        destination: &Path,
    ) -> Result<ExportOutcome, ExportError> {
        let Some(prepared) = self.prepare(scene, destination)? else {
            return Ok(ExportOutcome::Skipped);
        };

        let sink = ScalarSink::open(self.encoder, prepared.vertex_count)?;
        let merged = self.run(sink, prepared, destination)?;
        Ok(ExportOutcome::Finished(summarize(
            &merged,
            destination,
            Strategy::Scalar,
            None,
        )))
    }
}

impl<E: BulkEncoder + ScalarEncoder> Exporter<'_, E> {
    /// Export through the binding selected in the configuration
    pub fn export<C: SceneCollector + ?Sized>(
        &self,
        scene: &C,
        destination: &Path,
    ) -> Result<ExportOutcome, ExportError> {
        match self.config.export.strategy {
            Strategy::Bulk => self.export_bulk(scene, destination),
            Strategy::Scalar => self.export_scalar(scene, destination),
        }
    }
}

/// Collect and merge a scene without encoding it
pub fn merge_scene<C: SceneCollector + ?Sized>(
    scene: &C,
    config: &ExportConfig,
) -> Result<MergedBuffer, ExportError> {
    let objects = scene.mesh_objects().map_err(ExportError::Scene)?;
    crate::merge::merge_objects(&objects, config.export.texcoords)
}
