//! File-backed image source using OS positioned reads

use isoscope_core::ImageSource;
use std::fs::File;
use std::io;
use std::path::Path;

/// An image source reading an open file with positioned reads.
///
/// Uses `pread` on Unix and `seek_read` on Windows; neither depends on a
/// shared cursor, so the source can be read from several threads at once.
pub struct FileSource {
    file: File,
    length: u64,
}

impl FileSource {
    /// Open a file for positioned reading
    pub fn open(path: &Path) -> io::Result<Self> {
        Self::from_file(File::open(path)?)
    }

    /// Wrap an already opened file
    pub fn from_file(file: File) -> io::Result<Self> {
        let length = file.metadata()?.len();
        Ok(Self { file, length })
    }
}

impl ImageSource for FileSource {
    fn identify(&self) -> &str {
        "File"
    }

    fn length(&self) -> u64 {
        self.length
    }

    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_read(buf, offset)
    }
}
