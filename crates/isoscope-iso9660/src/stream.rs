//! Streaming access to file data spread over one or more extents

use crate::record::{DirectoryRecord, Extent};
use crate::sector::SectorReader;
use isoscope_core::Error;
use std::io::{self, Read, Seek, SeekFrom};

fn to_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}

/// `Read + Seek` view of a file's data
///
/// Reads go straight to the sector reader, so only the bytes asked for are
/// ever loaded.
pub struct ExtentReader<'a> {
    reader: &'a SectorReader,
    extents: Vec<Extent>,
    size: u64,
    position: u64,
}

impl<'a> ExtentReader<'a> {
    pub(crate) fn new(reader: &'a SectorReader, record: &DirectoryRecord) -> Self {
        Self {
            reader,
            extents: record.extents().collect(),
            size: record.size(),
            position: 0,
        }
    }

    /// Total size of the file in bytes
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Extent holding `position`, and the offset within it
    fn locate(&self, position: u64) -> Option<(Extent, u64)> {
        let mut start = 0u64;
        for extent in &self.extents {
            let end = start + extent.length as u64;
            if position < end {
                return Some((*extent, position - start));
            }
            start = end;
        }
        None
    }
}

impl<'a> Read for ExtentReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let (extent, offset) = match self.locate(self.position) {
            Some(found) => found,
            None => return Ok(0),
        };

        let available = extent.length as u64 - offset;
        let n = (buf.len() as u64).min(available) as usize;
        self.reader
            .read_into(extent.location as u64, offset, &mut buf[..n])
            .map_err(to_io)?;

        self.position += n as u64;
        Ok(n)
    }
}

impl<'a> Seek for ExtentReader<'a> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };

        match target {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}
