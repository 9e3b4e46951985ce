//! drc-export.toml configuration
//!
//! Every section is optional; a missing file behaves like an empty one.
//!
//! ```toml
//! [export]
//! strategy = "bulk"      # or "scalar"
//! index_width = "auto"   # or 1, 2, 4
//! texcoords = "pad"      # or "strict"
//!
//! [encoder]
//! compression_level = 7
//!
//! [encoder.quantization]
//! position = 14
//! normal = 10
//! texcoord = 12
//! generic = 12
//! ```

use anyhow::{Context, Result, bail};
use drc_common::{EncodingSettings, IndexWidth, Quantization};
use serde::Deserialize;
use std::path::Path;

/// Default config file name looked up next to the input
pub const CONFIG_FILE_NAME: &str = "drc-export.toml";

/// Highest quantization bit count the container accepts
const MAX_QUANTIZATION_BITS: u8 = 30;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub encoder: EncoderSection,
}

/// How merged attributes are handed to the encoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One call per attribute channel with a packed byte buffer
    #[default]
    Bulk,
    /// One call per vertex attribute and per face
    Scalar,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bulk => f.write_str("bulk"),
            Self::Scalar => f.write_str("scalar"),
        }
    }
}

/// What to do when objects carry different numbers of texcoord channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TexcoordPolicy {
    /// Fill missing channels with `[0.0, 0.0]`
    #[default]
    Pad,
    /// Fail the export
    Strict,
}

/// Face index byte width for the bulk binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawIndexWidth")]
pub enum IndexWidthSetting {
    /// Narrowest width that addresses every merged vertex
    #[default]
    Auto,
    Fixed(IndexWidth),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIndexWidth {
    Name(String),
    Bytes(u8),
}

impl TryFrom<RawIndexWidth> for IndexWidthSetting {
    type Error = String;

    fn try_from(raw: RawIndexWidth) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawIndexWidth::Name(name) if name == "auto" => Ok(Self::Auto),
            RawIndexWidth::Name(name) => Err(format!("invalid index_width \"{}\"", name)),
            RawIndexWidth::Bytes(bytes) => IndexWidth::from_bytes(bytes)
                .map(Self::Fixed)
                .ok_or_else(|| format!("invalid index_width {} (must be 1, 2 or 4)", bytes)),
        }
    }
}

impl IndexWidthSetting {
    /// Resolve to a concrete width for `vertex_count` merged vertices
    ///
    /// Returns `None` if a fixed width is too narrow.
    pub fn resolve(self, vertex_count: u32) -> Option<IndexWidth> {
        match self {
            Self::Auto => Some(IndexWidth::narrowest_for(vertex_count)),
            Self::Fixed(width) if width.can_address(vertex_count) => Some(width),
            Self::Fixed(_) => None,
        }
    }
}

/// `[export]` section
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExportSection {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub index_width: IndexWidthSetting,
    #[serde(default)]
    pub texcoords: TexcoordPolicy,
}

/// `[encoder]` section
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EncoderSection {
    /// 0 (fastest) to 10 (smallest output)
    #[serde(default = "default_compression_level")]
    pub compression_level: u8,
    #[serde(default)]
    pub quantization: QuantizationSection,
}

fn default_compression_level() -> u8 {
    7
}

impl Default for EncoderSection {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
            quantization: QuantizationSection::default(),
        }
    }
}

/// `[encoder.quantization]` section, in bits per component
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct QuantizationSection {
    pub position: u8,
    pub normal: u8,
    pub texcoord: u8,
    pub generic: u8,
}

impl Default for QuantizationSection {
    fn default() -> Self {
        let q = Quantization::default();
        Self {
            position: q.position,
            normal: q.normal,
            texcoord: q.texcoord,
            generic: q.generic,
        }
    }
}

impl ExportConfig {
    /// Load from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate from a string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse drc-export.toml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.encoder.compression_level > 10 {
            bail!(
                "Invalid compression_level {} (must be 0-10)",
                self.encoder.compression_level
            );
        }
        let q = &self.encoder.quantization;
        for (name, bits) in [
            ("position", q.position),
            ("normal", q.normal),
            ("texcoord", q.texcoord),
            ("generic", q.generic),
        ] {
            if bits == 0 || bits > MAX_QUANTIZATION_BITS {
                bail!(
                    "Invalid {} quantization {} (must be 1-{})",
                    name,
                    bits,
                    MAX_QUANTIZATION_BITS
                );
            }
        }
        Ok(())
    }

    /// Encoder settings recorded in the output container
    pub fn encoding_settings(&self) -> EncodingSettings {
        let q = self.encoder.quantization;
        EncodingSettings {
            compression_level: self.encoder.compression_level,
            quantization: Quantization {
                position: q.position,
                normal: q.normal,
                texcoord: q.texcoord,
                generic: q.generic,
            },
        }
    }
}

/// Load an explicit config, or `drc-export.toml` next to `input`, or defaults
pub fn load_config(explicit: Option<&Path>, input: &Path) -> Result<ExportConfig> {
    if let Some(path) = explicit {
        return ExportConfig::load(path);
    }
    let sibling = input
        .parent()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file());
    match sibling {
        Some(path) => {
            tracing::debug!("Using config {:?}", path);
            ExportConfig::load(&path)
        }
        None => Ok(ExportConfig::default()),
    }
}
