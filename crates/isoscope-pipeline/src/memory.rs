//! In-memory image source

use isoscope_core::ImageSource;
use std::io;
use std::sync::Arc;

/// An image source over a shared byte buffer
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    /// Create a source from owned bytes
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// Get the underlying bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl ImageSource for MemorySource {
    fn identify(&self) -> &str {
        "Memory buffer"
    }

    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.length() {
            return Ok(0);
        }

        let start = offset as usize;
        let to_read = buf.len().min(self.data.len() - start);
        buf[..to_read].copy_from_slice(&self.data[start..start + to_read]);

        Ok(to_read)
    }
}
