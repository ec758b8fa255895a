//! Core traits for image reading

use crate::{error::Result, types::FileAttributes};
use std::io::{self, Read, Seek};

/// A byte-addressable image source supporting positioned reads
///
/// Implementations must not share a mutable cursor between calls, so a single
/// source can serve concurrent readers through `&self`.
pub trait ImageSource: Send + Sync {
    /// Get a human-readable identifier for this source type
    fn identify(&self) -> &str;

    /// Get the total size of the source in bytes
    fn length(&self) -> u64;

    /// Read up to `buf.len()` bytes starting at `offset`
    ///
    /// Returns the number of bytes read, which is 0 at or past the end.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Fill `buf` from `offset`, failing with `UnexpectedEof` on a short read
    fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(offset, buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("short read at offset {}", offset),
                    ))
                }
                Ok(n) => {
                    offset += n as u64;
                    buf = &mut buf[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Trait for read-only file systems exposed by an image
pub trait Filesystem: Send + Sync {
    /// Get a human-readable identifier for this file system type
    fn identify(&self) -> &str;

    /// Get the volume name
    fn volume_name(&self) -> &str;

    /// Get the logical block size in bytes
    fn block_size(&self) -> u64;

    /// Get the total size of the volume in bytes
    fn domain_size(&self) -> u64;

    /// Get the attributes of the file or directory at `path`
    fn attributes_of_file(&self, path: &str) -> Result<FileAttributes>;

    /// Read the full contents of the file at `path`
    fn contents_of_file(&self, path: &str) -> Result<Vec<u8>>;

    /// List the immediate children of the directory at `path`
    fn list_directory(&self, path: &str) -> Result<Vec<FileAttributes>>;

    /// Check if a file or directory exists
    fn exists(&self, path: &str) -> Result<bool> {
        match self.attributes_of_file(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Combined trait for Read + Seek
pub trait ReadSeek: Read + Seek + Send {}

/// Blanket implementation for any type that implements Read + Seek
impl<T: Read + Seek + Send> ReadSeek for T {}
