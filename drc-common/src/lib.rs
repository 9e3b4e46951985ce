//! Shared types and utilities for the drc mesh exporter
//!
//! This crate provides utilities shared between:
//! - `drc-export` (aggregation pipeline and CLI)
//! - the bundled container encoder and its `inspect` tooling
//!
//! # Modules
//!
//! - [`packing`] - Attribute and index packing (f32 arrays, 1/2/4-byte indices)
//! - [`formats`] - The `.drc` container format

pub mod formats;
pub mod packing;

// Re-export commonly used packing items
pub use packing::{IndexWidth, pack_attribute, pack_indices, unpack_attribute, unpack_indices};

// Re-export commonly used format items
pub use formats::{
    DRC_MAGIC, DRC_VERSION, DrcMesh, DrcMeshHeader, EncodingSettings, Quantization,
};

/// File extension of exported containers
pub const DRC_EXT: &str = "drc";
