//! Image open options

use crate::geometry::SectorGeometry;
use isoscope_core::DEFAULT_DESCRIPTOR_SCAN_LIMIT;
use isoscope_pipeline::SourceConfig;
use serde::{Deserialize, Serialize};

/// How to map logical sectors onto the image file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeometryMode {
    /// Detect from the sync pattern at the start of the image
    #[default]
    Auto,
    Cooked,
    RawMode1,
    RawMode2Form1,
    Custom(SectorGeometry),
}

/// Name matching policy for path lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaseSensitivity {
    /// ASCII case folding, matching plain ISO 9660 d-characters
    #[default]
    Insensitive,
    Sensitive,
}

impl CaseSensitivity {
    /// Compare two names under this policy
    pub fn matches(&self, a: &str, b: &str) -> bool {
        match self {
            CaseSensitivity::Insensitive => a.eq_ignore_ascii_case(b),
            CaseSensitivity::Sensitive => a == b,
        }
    }

    /// Lookup key for a name or path under this policy
    pub fn key(&self, s: &str) -> String {
        match self {
            CaseSensitivity::Insensitive => s.to_ascii_uppercase(),
            CaseSensitivity::Sensitive => s.to_string(),
        }
    }
}

/// Configuration for opening an ISO image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Use memory mapping for file-backed images
    pub use_mmap: bool,
    pub geometry: GeometryMode,
    pub case_sensitivity: CaseSensitivity,
    /// Drop `;1` version suffixes from names
    pub strip_version: bool,
    /// Consult the path table before walking directories
    pub use_path_table: bool,
    /// Maximum number of volume descriptors to read before giving up
    pub descriptor_scan_limit: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            use_mmap: true,
            geometry: GeometryMode::Auto,
            case_sensitivity: CaseSensitivity::Insensitive,
            strip_version: true,
            use_path_table: false,
            descriptor_scan_limit: DEFAULT_DESCRIPTOR_SCAN_LIMIT,
        }
    }
}

impl ImageConfig {
    /// Source options derived from this configuration
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            use_mmap: self.use_mmap,
        }
    }
}
