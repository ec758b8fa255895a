//! Memory-mapped image source

use isoscope_core::{ImageSource, MAX_MMAP_SIZE};
use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::Path;

/// An image source backed by a memory-mapped file.
///
/// Positioned reads are plain slice copies, so any number of threads can read
/// through `&self` without locking.
///
/// # Example
///
/// ```rust,no_run
/// use isoscope_pipeline::MmapSource;
/// use std::path::Path;
///
/// let source = MmapSource::open(Path::new("disc.iso")).unwrap();
/// ```
pub struct MmapSource {
    mmap: Mmap,
}

impl MmapSource {
    /// Open a file with memory mapping
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped
    ///
    /// # Safety
    ///
    /// Uses `unsafe` for memory mapping because:
    /// - The OS guarantees memory safety for valid file descriptors
    /// - We validate the file is a regular file before mapping
    /// - The mapping is read-only
    /// - File must not be truncated during access (caller responsibility)
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_file(&file)
    }

    /// Create a memory-mapped source from an existing file
    ///
    /// # Safety
    ///
    /// See `open()` for safety documentation
    pub fn from_file(file: &File) -> io::Result<Self> {
        let metadata = file.metadata()?;

        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Only regular files can be memory-mapped",
            ));
        }

        if metadata.len() > MAX_MMAP_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "File size {} exceeds memory mapping limit {} (16 GB)",
                    metadata.len(),
                    MAX_MMAP_SIZE
                ),
            ));
        }

        // SAFETY: the file is a regular file of bounded size with a valid
        // descriptor, and the mapping is read-only.
        let mmap = unsafe { Mmap::map(file)? };

        Ok(Self { mmap })
    }

    /// Get the length of the mapped region
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Check if the mapped region is empty
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Get a slice of the entire mapped data
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

impl ImageSource for MmapSource {
    fn identify(&self) -> &str {
        "Memory-mapped file"
    }

    fn length(&self) -> u64 {
        self.len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len() {
            return Ok(0);
        }

        let start = offset as usize;
        let to_read = buf.len().min(self.mmap.len() - start);
        buf[..to_read].copy_from_slice(&self.mmap[start..start + to_read]);

        Ok(to_read)
    }
}
