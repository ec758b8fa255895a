//! Locked stream source - serializes seek+read pairs on a plain stream

use isoscope_core::{ImageSource, ReadSeek};
use std::io::{self, SeekFrom};
use std::sync::Mutex;

/// An image source over any `Read + Seek` stream.
///
/// A stream has a single cursor, so each positioned read takes the lock for
/// the whole seek-then-read pair. Interleaved seeks from other threads can
/// never land between the two.
///
/// # Example
///
/// ```rust
/// use isoscope_core::ImageSource;
/// use isoscope_pipeline::LockedSource;
/// use std::io::Cursor;
///
/// let source = LockedSource::new(Cursor::new(vec![0u8; 4096])).unwrap();
/// assert_eq!(source.length(), 4096);
/// ```
pub struct LockedSource<R: ReadSeek> {
    inner: Mutex<R>,
    length: u64,
}

impl<R: ReadSeek> LockedSource<R> {
    /// Wrap a stream, measuring its length by seeking to the end
    pub fn new(mut inner: R) -> io::Result<Self> {
        let length = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;

        Ok(Self {
            inner: Mutex::new(inner),
            length,
        })
    }

    /// Unwrap the underlying stream
    pub fn into_inner(self) -> io::Result<R> {
        self.inner
            .into_inner()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "Stream lock poisoned"))
    }
}

impl<R: ReadSeek> ImageSource for LockedSource<R> {
    fn identify(&self) -> &str {
        "Locked stream"
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.length {
            return Ok(0);
        }

        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "Stream lock poisoned"))?;

        inner.seek(SeekFrom::Start(offset))?;
        inner.read(buf)
    }
}
