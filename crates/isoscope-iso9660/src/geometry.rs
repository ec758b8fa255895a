//! Sector geometry: how logical sectors map onto bytes of the image file
//!
//! ```text
//! cooked (.iso)          raw mode 1 (.bin)                raw mode 2 form 1 (.bin)
//! ┌──────────────┐       ┌──────┬──────┬──────────┬────┐  ┌──────┬──────┬─────┬──────────┬────┐
//! │ 2048 data    │       │ sync │ hdr  │ 2048 data│ECC │  │ sync │ hdr  │ sub │ 2048 data│ECC │
//! └──────────────┘       │ 12   │ 4    │          │288 │  │ 12   │ 4    │ 8   │          │280 │
//!                        └──────┴──────┴──────────┴────┘  └──────┴──────┴─────┴──────────┴────┘
//! ```

use isoscope_core::{Error, ImageSource, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical sector size of ISO 9660 data
pub const LOGICAL_SECTOR_SIZE: u32 = 2048;

/// Size of a raw CD sector including sync, header and error correction
pub const RAW_SECTOR_SIZE: u32 = 2352;

/// Sync pattern at the start of every raw data sector
pub const CD_SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

/// Layout parameters fixed when an image is opened
///
/// `physical_offset = lead_in + sector * raw_sector_size + offset_within_sector`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorGeometry {
    /// Bytes of user data per sector
    pub logical_sector_size: u32,
    /// Bytes each sector occupies in the file
    pub raw_sector_size: u32,
    /// Bytes skipped before the user data of sector 0
    pub lead_in: u64,
}

impl SectorGeometry {
    /// Plain 2048-byte sector image (.iso)
    pub const COOKED: Self = Self {
        logical_sector_size: LOGICAL_SECTOR_SIZE,
        raw_sector_size: LOGICAL_SECTOR_SIZE,
        lead_in: 0,
    };

    /// Raw 2352-byte mode 1 sectors: 12 sync + 4 header bytes before the data
    pub const RAW_MODE1: Self = Self {
        logical_sector_size: LOGICAL_SECTOR_SIZE,
        raw_sector_size: RAW_SECTOR_SIZE,
        lead_in: 16,
    };

    /// Raw 2352-byte mode 2 form 1 sectors: sync, header and 8-byte subheader
    pub const RAW_MODE2_FORM1: Self = Self {
        logical_sector_size: LOGICAL_SECTOR_SIZE,
        raw_sector_size: RAW_SECTOR_SIZE,
        lead_in: 24,
    };

    /// Create a custom geometry, validating it
    pub fn new(logical_sector_size: u32, raw_sector_size: u32, lead_in: u64) -> Result<Self> {
        let geometry = Self {
            logical_sector_size,
            raw_sector_size,
            lead_in,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check that the parameters describe a usable layout
    pub fn validate(&self) -> Result<()> {
        if self.logical_sector_size == 0 {
            return Err(Error::format("Logical sector size must be non-zero"));
        }

        if self.raw_sector_size < self.logical_sector_size {
            return Err(Error::format(format!(
                "Raw sector size {} is smaller than logical sector size {}",
                self.raw_sector_size, self.logical_sector_size
            )));
        }

        Ok(())
    }

    /// True when sectors are stored back to back with no per-sector overhead
    pub fn is_contiguous(&self) -> bool {
        self.raw_sector_size == self.logical_sector_size
    }

    /// Byte position in the file of `offset` bytes into logical `sector`
    ///
    /// Returns `None` on arithmetic overflow.
    pub fn physical_offset(&self, sector: u64, offset: u64) -> Option<u64> {
        sector
            .checked_mul(self.raw_sector_size as u64)?
            .checked_add(self.lead_in)?
            .checked_add(offset)
    }

    /// Number of whole logical sectors present in an image of `image_size` bytes
    pub fn sector_count(&self, image_size: u64) -> u64 {
        let available = match image_size.checked_sub(self.lead_in) {
            Some(available) => available,
            None => return 0,
        };

        let raw = self.raw_sector_size as u64;
        let full = available / raw;
        if available % raw >= self.logical_sector_size as u64 {
            full + 1
        } else {
            full
        }
    }

    /// Guess the geometry from the start of the image
    ///
    /// Raw dumps begin every sector with the CD sync pattern; the mode byte
    /// that follows the 3-byte address tells mode 1 from mode 2. Anything else
    /// is treated as a cooked image.
    pub fn detect(source: &dyn ImageSource) -> Result<Self> {
        let mut header = [0u8; 16];
        let read = source.read_at(0, &mut header)?;

        if read < header.len() || header[..12] != CD_SYNC_PATTERN {
            return Ok(Self::COOKED);
        }

        match header[15] {
            1 => {
                tracing::debug!("Detected raw mode 1 sectors");
                Ok(Self::RAW_MODE1)
            }
            2 => {
                tracing::debug!("Detected raw mode 2 form 1 sectors");
                Ok(Self::RAW_MODE2_FORM1)
            }
            mode => Err(Error::unsupported(format!(
                "Raw sector mode {} is not supported",
                mode
            ))),
        }
    }
}

impl Default for SectorGeometry {
    fn default() -> Self {
        Self::COOKED
    }
}

impl fmt::Display for SectorGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_contiguous() && self.lead_in == 0 {
            write!(f, "cooked {}-byte sectors", self.logical_sector_size)
        } else {
            write!(
                f,
                "{}-byte data in {}-byte sectors, lead-in {}",
                self.logical_sector_size, self.raw_sector_size, self.lead_in
            )
        }
    }
}
