//! ISO 9660 on-disk primitives: both-endian integers and date formats

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use isoscope_core::{Error, Result};

/// First sector of the volume descriptor set
pub const VOLUME_DESCRIPTOR_START_SECTOR: u64 = 16;

/// Standard identifier carried by every volume descriptor
pub const STANDARD_IDENTIFIER: &[u8; 5] = b"CD001";

/// Both-endian integer (ISO stores as both little and big endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BothEndian<T> {
    pub little: T,
    pub big: T,
}

impl<T: Copy + PartialEq + std::fmt::Display> BothEndian<T> {
    /// Get the value, failing if the two copies disagree
    ///
    /// `field` names the field in the error message.
    pub fn value(&self, field: &str) -> Result<T> {
        if self.little != self.big {
            return Err(Error::format(format!(
                "{}: little-endian {} disagrees with big-endian {}",
                field, self.little, self.big
            )));
        }
        Ok(self.little)
    }
}

impl BothEndian<u16> {
    /// Parse from bytes (4 bytes: 2 little-endian + 2 big-endian)
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }
        Some(Self {
            little: u16::from_le_bytes([bytes[0], bytes[1]]),
            big: u16::from_be_bytes([bytes[2], bytes[3]]),
        })
    }
}

impl BothEndian<u32> {
    /// Parse from bytes (8 bytes: 4 little-endian + 4 big-endian)
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 8 {
            return None;
        }
        Some(Self {
            little: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            big: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }
}

/// Decode a both-endian u16 at `bytes[..4]`, verifying the two copies agree
pub fn both_endian_u16(bytes: &[u8], field: &str) -> Result<u16> {
    BothEndian::<u16>::from_bytes(bytes)
        .ok_or_else(|| Error::format(format!("{}: truncated field", field)))?
        .value(field)
}

/// Decode a both-endian u32 at `bytes[..8]`, verifying the two copies agree
pub fn both_endian_u32(bytes: &[u8], field: &str) -> Result<u32> {
    BothEndian::<u32>::from_bytes(bytes)
        .ok_or_else(|| Error::format(format!("{}: truncated field", field)))?
        .value(field)
}

/// Convert a GMT offset in 15-minute units into a chrono offset
fn gmt_offset(quarter_hours: i8) -> Option<FixedOffset> {
    FixedOffset::east_opt(quarter_hours as i32 * 15 * 60)
}

/// ISO-9660 date/time format (7 bytes, used in directory records)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IsoDateTime {
    pub year: u8,       // Years since 1900
    pub month: u8,      // 1-12
    pub day: u8,        // 1-31
    pub hour: u8,       // 0-23
    pub minute: u8,     // 0-59
    pub second: u8,     // 0-59
    pub gmt_offset: i8, // GMT offset in 15-minute intervals
}

impl IsoDateTime {
    /// Parse from 7 bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 7 {
            return None;
        }
        Some(Self {
            year: bytes[0],
            month: bytes[1],
            day: bytes[2],
            hour: bytes[3],
            minute: bytes[4],
            second: bytes[5],
            gmt_offset: bytes[6] as i8,
        })
    }

    /// True when every field is zero ("not specified")
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }

    /// Convert to UTC; `None` if unset or out of range
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        if self.is_unset() {
            return None;
        }

        let naive = NaiveDate::from_ymd_opt(
            1900 + self.year as i32,
            self.month as u32,
            self.day as u32,
        )?
        .and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)?;

        gmt_offset(self.gmt_offset)?
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// ISO-9660 ASCII date/time format (17 bytes, used in volume descriptors)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoAsciiDateTime {
    pub digits: [u8; 16], // YYYYMMDDHHMMSSss
    pub gmt_offset: i8,   // GMT offset in 15-minute intervals
}

impl IsoAsciiDateTime {
    /// Parse from 17 bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 17 {
            return None;
        }
        let mut digits = [0u8; 16];
        digits.copy_from_slice(&bytes[..16]);

        Some(Self {
            digits,
            gmt_offset: bytes[16] as i8,
        })
    }

    fn field(&self, range: std::ops::Range<usize>) -> Option<u32> {
        std::str::from_utf8(&self.digits[range]).ok()?.parse().ok()
    }

    /// Convert to UTC; `None` for the all-zero "not specified" form or garbage
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let year = self.field(0..4)?;
        if year == 0 {
            return None;
        }

        let naive = NaiveDate::from_ymd_opt(year as i32, self.field(4..6)?, self.field(6..8)?)?
            .and_hms_milli_opt(
                self.field(8..10)?,
                self.field(10..12)?,
                self.field(12..14)?,
                self.field(14..16)? * 10,
            )?;

        gmt_offset(self.gmt_offset)?
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Decode a fixed-width, space-padded identifier field
pub fn decode_identifier(bytes: &[u8]) -> String {
    let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
    text.trim_end_matches(|c| c == ' ' || c == '\0')
        .trim_start()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_both_endian_u16() {
        let bytes = [0x34, 0x12, 0x12, 0x34]; // LE: 0x1234, BE: 0x1234
        let both = BothEndian::<u16>::from_bytes(&bytes).unwrap();
        assert_eq!(both.little, 0x1234);
        assert_eq!(both.big, 0x1234);
        assert_eq!(both.value("test").unwrap(), 0x1234);
    }

    #[test]
    fn test_both_endian_u32() {
        let bytes = [0x78, 0x56, 0x34, 0x12, 0x12, 0x34, 0x56, 0x78];
        assert_eq!(both_endian_u32(&bytes, "test").unwrap(), 0x12345678);
    }

    #[test]
    fn test_both_endian_disagreement() {
        let bytes = [0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09];
        let err = both_endian_u32(&bytes, "Extent location").unwrap_err();
        assert!(err.to_string().contains("Extent location"));

        assert!(both_endian_u16(&[1, 0], "short").is_err());
    }

    #[test]
    fn test_iso_datetime_utc() {
        let bytes = [96, 3, 14, 9, 30, 45, 0];
        let dt = IsoDateTime::from_bytes(&bytes).unwrap().to_utc().unwrap();
        assert_eq!(dt.year(), 1996);
        assert_eq!(dt.month(), 3);
        assert_eq!(dt.day(), 14);
        assert_eq!(dt.hour(), 9);
        assert_eq!(dt.minute(), 30);
        assert_eq!(dt.second(), 45);
    }

    #[test]
    fn test_iso_datetime_gmt_offset() {
        // 12:00 at GMT+2 (8 quarter hours) is 10:00 UTC
        let bytes = [120, 6, 1, 12, 0, 0, 8];
        let dt = IsoDateTime::from_bytes(&bytes).unwrap().to_utc().unwrap();
        assert_eq!(dt.hour(), 10);

        // 01:00 at GMT-5 (-20 quarter hours) is 06:00 UTC
        let bytes = [120, 6, 1, 1, 0, 0, (-20i8) as u8];
        let dt = IsoDateTime::from_bytes(&bytes).unwrap().to_utc().unwrap();
        assert_eq!(dt.hour(), 6);
    }

    #[test]
    fn test_iso_datetime_unset_and_invalid() {
        assert!(IsoDateTime::default().to_utc().is_none());
        let bytes = [96, 13, 40, 0, 0, 0, 0];
        assert!(IsoDateTime::from_bytes(&bytes).unwrap().to_utc().is_none());
    }

    #[test]
    fn test_ascii_datetime() {
        let mut bytes = [0u8; 17];
        bytes[..16].copy_from_slice(b"2024011512000050");
        let dt = IsoAsciiDateTime::from_bytes(&bytes).unwrap().to_utc().unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.nanosecond(), 500_000_000);

        bytes[..16].copy_from_slice(b"0000000000000000");
        assert!(IsoAsciiDateTime::from_bytes(&bytes).unwrap().to_utc().is_none());
    }

    #[test]
    fn test_decode_identifier() {
        assert_eq!(decode_identifier(b"TESTVOL                         "), "TESTVOL");
        assert_eq!(decode_identifier(b"CDROM\0\0\0"), "CDROM");
        assert_eq!(decode_identifier(b"                "), "");
    }
}
