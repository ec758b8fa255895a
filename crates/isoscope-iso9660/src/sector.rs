//! Sector reader: logical sector addressing over an image source

use crate::geometry::SectorGeometry;
use isoscope_core::{checked_add_u64, checked_multiply_u64, Error, ImageSource, Result};
use std::io;
use std::sync::Arc;

/// Reads logical sectors from an image, honoring its [`SectorGeometry`]
///
/// All reads are positioned reads on the source, so a `SectorReader` can be
/// shared between threads without any cursor state.
#[derive(Clone)]
pub struct SectorReader {
    source: Arc<dyn ImageSource>,
    geometry: SectorGeometry,
    image_size: u64,
}

impl SectorReader {
    /// Create a reader over `source`
    pub fn new(source: Arc<dyn ImageSource>, geometry: SectorGeometry) -> Result<Self> {
        geometry.validate()?;
        let image_size = source.length();

        Ok(Self {
            source,
            geometry,
            image_size,
        })
    }

    /// Get the sector geometry
    pub fn geometry(&self) -> SectorGeometry {
        self.geometry
    }

    /// Get the logical sector size in bytes
    pub fn sector_size(&self) -> u32 {
        self.geometry.logical_sector_size
    }

    /// Get the size of the underlying image in bytes
    pub fn image_size(&self) -> u64 {
        self.image_size
    }

    /// Number of whole logical sectors in the image
    pub fn sector_count(&self) -> u64 {
        self.geometry.sector_count(self.image_size)
    }

    /// Get the underlying source
    pub fn source(&self) -> &dyn ImageSource {
        &*self.source
    }

    /// Read one logical sector
    pub fn read_sector(&self, sector: u64) -> Result<Vec<u8>> {
        self.read_bytes(sector, 0, self.sector_size() as usize)
    }

    /// Read `length` bytes starting `offset` bytes into logical sector `start_sector`
    ///
    /// `offset` may be larger than one sector; reads that cross sector
    /// boundaries skip the per-sector overhead of raw images.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if any part of the range lies past the end of the
    /// image or the source returns a short read.
    pub fn read_bytes(&self, start_sector: u64, offset: u64, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.read_into(start_sector, offset, &mut buf)?;
        Ok(buf)
    }

    /// Fill `buf` starting `offset` bytes into logical sector `start_sector`
    pub fn read_into(&self, start_sector: u64, offset: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let sector_size = self.sector_size() as u64;
        let sector = checked_add_u64(start_sector, offset / sector_size, "sector index")?;
        let within = offset % sector_size;

        self.check_range(sector, within, buf.len() as u64)?;

        if self.geometry.is_contiguous() {
            let physical = self.physical_offset(sector, within)?;
            return self.read_physical(physical, buf, sector);
        }

        let mut sector = sector;
        let mut within = within;
        let mut done = 0usize;
        while done < buf.len() {
            let chunk = ((sector_size - within) as usize).min(buf.len() - done);
            let physical = self.physical_offset(sector, within)?;
            self.read_physical(physical, &mut buf[done..done + chunk], sector)?;

            done += chunk;
            sector += 1;
            within = 0;
        }

        Ok(())
    }

    /// Check that an extent of `length` bytes starting at `sector` lies inside the image
    pub fn check_extent(&self, sector: u64, length: u64) -> Result<()> {
        if length == 0 {
            return Ok(());
        }
        self.check_range(sector, 0, length)
    }

    /// Verify that the last byte of the logical range maps inside the image
    fn check_range(&self, sector: u64, within: u64, length: u64) -> Result<()> {
        let sector_size = self.sector_size() as u64;
        let logical_start = checked_add_u64(
            checked_multiply_u64(sector, sector_size, "logical offset")?,
            within,
            "logical offset",
        )?;
        let logical_last = checked_add_u64(logical_start, length - 1, "logical range")?;

        let last_physical =
            self.physical_offset(logical_last / sector_size, logical_last % sector_size)?;

        if last_physical >= self.image_size {
            return Err(Error::out_of_bounds(format!(
                "Read of {} bytes at sector {} offset {} extends past end of image ({} bytes)",
                length, sector, within, self.image_size
            )));
        }

        Ok(())
    }

    fn physical_offset(&self, sector: u64, within: u64) -> Result<u64> {
        self.geometry
            .physical_offset(sector, within)
            .ok_or_else(|| Error::format(format!("Sector {} offset overflows", sector)))
    }

    fn read_physical(&self, physical: u64, buf: &mut [u8], sector: u64) -> Result<()> {
        self.source.read_exact_at(physical, buf).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("Reading sector {} (byte {}): {}", sector, physical, e),
            ))
        })
    }
}

impl std::fmt::Debug for SectorReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectorReader")
            .field("source", &self.source.identify())
            .field("geometry", &self.geometry)
            .field("image_size", &self.image_size)
            .finish()
    }
}
