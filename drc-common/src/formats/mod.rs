//! Binary container formats shared by the exporter and its tooling

pub mod mesh;

pub use mesh::*;
