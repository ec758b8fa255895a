//! # isoscope Pipeline
//!
//! Positioned-read image sources for the isoscope reader.
//!
//! Every source implements [`ImageSource`](isoscope_core::ImageSource), which reads
//! at an explicit offset instead of through a shared cursor:
//! - **MmapSource**: memory-mapped file access, lock-free
//! - **FileSource**: OS positioned reads (`pread`) on an open file
//! - **LockedSource**: any `Read + Seek` stream, seek+read serialized behind a mutex
//! - **MemorySource**: an in-memory byte buffer
//!
//! ## Example
//!
//! ```rust,no_run
//! use isoscope_pipeline::{open_source, SourceConfig};
//! use std::path::Path;
//!
//! let source = open_source(Path::new("disc.iso"), SourceConfig::default()).unwrap();
//!
//! let mut buf = [0u8; 2048];
//! source.read_exact_at(16 * 2048, &mut buf).unwrap();
//! ```

pub mod file;
pub mod locked;
pub mod memory;
pub mod mmap;
pub mod open;

pub use file::FileSource;
pub use locked::LockedSource;
pub use memory::MemorySource;
pub use mmap::MmapSource;
pub use open::{open_source, SourceConfig};
