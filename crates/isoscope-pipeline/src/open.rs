//! Opening image files as sources

use crate::{FileSource, MmapSource};
use isoscope_core::{ImageSource, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for opening an image file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Use memory mapping (falls back to positioned file reads if mapping fails)
    pub use_mmap: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { use_mmap: true }
    }
}

/// Open an image file as a positioned-read source
///
/// # Errors
///
/// Returns an error if the file cannot be opened
pub fn open_source(path: &Path, config: SourceConfig) -> Result<Box<dyn ImageSource>> {
    if config.use_mmap {
        match MmapSource::open(path) {
            Ok(source) => {
                tracing::debug!("Memory-mapped {} ({} bytes)", path.display(), source.len());
                return Ok(Box::new(source));
            }
            Err(e) => {
                tracing::warn!(
                    "Memory mapping {} failed, using positioned reads: {}",
                    path.display(),
                    e
                );
            }
        }
    }

    let source = FileSource::open(path)?;
    tracing::debug!("Opened {} ({} bytes)", path.display(), source.length());
    Ok(Box::new(source))
}
