//! Directory records and lazy iteration over directory extents
//!
//! A directory's extent is a run of sectors filled with variable-length
//! records. A record never crosses a sector boundary; the space after the
//! last record of a sector is zero-filled, so a zero length byte means
//! "continue at the next sector", not "end of directory".

use crate::sector::SectorReader;
use crate::types::{both_endian_u16, both_endian_u32, IsoDateTime};
use isoscope_core::{Error, Result, MAX_DIRECTORY_ENTRIES};
use std::fmt;

/// Size of the fixed part of a directory record
pub const RECORD_HEADER_SIZE: usize = 33;

/// Smallest valid directory record (header plus a 1-byte identifier)
pub const MIN_RECORD_SIZE: usize = 34;

/// A contiguous run of sectors holding (part of) a file's data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// First logical sector
    pub location: u32,
    /// Length in bytes
    pub length: u32,
}

/// One file system entry decoded from a directory extent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Display name: version suffix and empty extension removed
    pub name: String,
    /// Raw file identifier bytes
    pub identifier: Vec<u8>,
    /// Sectors of extended attribute record ahead of the data
    pub extended_attr_length: u8,
    /// First logical sector of the extent, extended attribute record included
    pub extent_location: u32,
    /// Length of the data in the first extent
    pub data_length: u32,
    /// Further extents of a multi-extent file, in order
    pub continuation: Vec<Extent>,
    pub recording_date: IsoDateTime,
    /// Bit flags (hidden, directory, etc.)
    pub file_flags: u8,
    pub file_unit_size: u8,
    pub interleave_gap_size: u8,
    pub volume_sequence_number: u16,
    /// Logical sector and byte offset the record was decoded from
    pub found_at: (u64, usize),
}

impl DirectoryRecord {
    /// File flag: Hidden
    pub const FLAG_HIDDEN: u8 = 0x01;
    /// File flag: Directory
    pub const FLAG_DIRECTORY: u8 = 0x02;
    /// File flag: Associated file
    pub const FLAG_ASSOCIATED: u8 = 0x04;
    /// File flag: Record format specified
    pub const FLAG_RECORD: u8 = 0x08;
    /// File flag: Protection attributes specified
    pub const FLAG_PROTECTION: u8 = 0x10;
    /// File flag: Not final directory record
    pub const FLAG_NOT_FINAL: u8 = 0x80;

    /// Check if this is a directory
    pub fn is_directory(&self) -> bool {
        (self.file_flags & Self::FLAG_DIRECTORY) != 0
    }

    /// Check if this is hidden
    pub fn is_hidden(&self) -> bool {
        (self.file_flags & Self::FLAG_HIDDEN) != 0
    }

    /// Check if more extents of the same file follow this record
    pub fn is_multi_extent(&self) -> bool {
        (self.file_flags & Self::FLAG_NOT_FINAL) != 0
    }

    /// Check if the data is recorded in interleaved mode
    pub fn is_interleaved(&self) -> bool {
        self.file_unit_size != 0 || self.interleave_gap_size != 0
    }

    /// True for the "." and ".." entries every directory starts with
    pub fn is_self_or_parent(&self) -> bool {
        self.identifier == [0x00] || self.identifier == [0x01]
    }

    /// Name including any `;version` suffix
    pub fn versioned_name(&self) -> String {
        match self.identifier.as_slice() {
            [0x00] => ".".to_string(),
            [0x01] => "..".to_string(),
            bytes => decode_file_identifier(bytes),
        }
    }

    /// Name as presented to callers
    pub fn display_name(&self, strip_version: bool) -> String {
        if strip_version {
            self.name.clone()
        } else {
            self.versioned_name()
        }
    }

    /// First logical sector of the data, past any extended attribute record
    pub fn data_location(&self) -> u32 {
        self.extent_location.saturating_add(self.extended_attr_length as u32)
    }

    /// All data extents of this entry, in order
    pub fn extents(&self) -> impl Iterator<Item = Extent> + '_ {
        std::iter::once(Extent {
            location: self.data_location(),
            length: self.data_length,
        })
        .chain(self.continuation.iter().copied())
    }

    /// Total data size across all extents
    pub fn size(&self) -> u64 {
        self.extents().map(|e| e.length as u64).sum()
    }
}

impl fmt::Display for DirectoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes at LBA {})",
            self.name,
            self.size(),
            self.extent_location
        )
    }
}

fn decode_file_identifier(bytes: &[u8]) -> String {
    let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Strip the `;version` suffix and a trailing `.` left by an empty extension
fn strip_version(name: &str) -> String {
    let base = match name.rfind(';') {
        Some(pos) => &name[..pos],
        None => name,
    };
    match base.strip_suffix('.') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}

/// Decode the directory record starting at `buffer[offset]`
///
/// Returns the record and its length in bytes.
///
/// # Errors
///
/// Returns a format error if the record is shorter than the minimum, runs
/// past the end of `buffer`, has an identifier that does not fit, or carries
/// disagreeing both-endian fields.
pub fn decode_record(buffer: &[u8], offset: usize) -> Result<(DirectoryRecord, usize)> {
    let length = *buffer
        .get(offset)
        .ok_or_else(|| Error::format(format!("Directory record offset {} out of range", offset)))?
        as usize;

    if length < MIN_RECORD_SIZE {
        return Err(Error::format(format!(
            "Directory record at offset {} has invalid length {}",
            offset, length
        )));
    }

    let bytes = buffer.get(offset..offset + length).ok_or_else(|| {
        Error::format(format!(
            "Directory record at offset {} (length {}) overruns its sector",
            offset, length
        ))
    })?;

    let identifier_length = bytes[32] as usize;
    if identifier_length == 0 || RECORD_HEADER_SIZE + identifier_length > length {
        return Err(Error::format(format!(
            "Directory record at offset {} has identifier length {} for record length {}",
            offset, identifier_length, length
        )));
    }

    let extent_location = both_endian_u32(&bytes[2..10], "Directory record extent location")?;
    let data_length = both_endian_u32(&bytes[10..18], "Directory record data length")?;
    let volume_sequence_number =
        both_endian_u16(&bytes[28..32], "Directory record volume sequence number")?;
    // Length checked above, the 7-byte slice is always present
    let recording_date = IsoDateTime::from_bytes(&bytes[18..25]).unwrap_or_default();

    let identifier = bytes[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + identifier_length].to_vec();
    let name = match identifier.as_slice() {
        [0x00] => ".".to_string(),
        [0x01] => "..".to_string(),
        raw => strip_version(&decode_file_identifier(raw)),
    };

    tracing::trace!(
        "Decoded record {:?} at LBA {} ({} bytes)",
        name,
        extent_location,
        data_length
    );

    let record = DirectoryRecord {
        name,
        identifier,
        extended_attr_length: bytes[1],
        extent_location,
        data_length,
        continuation: Vec::new(),
        recording_date,
        file_flags: bytes[25],
        file_unit_size: bytes[26],
        interleave_gap_size: bytes[27],
        volume_sequence_number,
        found_at: (0, offset),
    };

    Ok((record, length))
}

/// Lazily decode the records of the directory extent at `extent_start`
///
/// # Errors
///
/// Returns an I/O error if the extent does not lie within the image.
pub fn decode_directory_entries(
    reader: &SectorReader,
    extent_start: u32,
    extent_length: u32,
) -> Result<DirectoryEntries<'_>> {
    reader.check_extent(extent_start as u64, extent_length as u64)?;

    Ok(DirectoryEntries {
        reader,
        extent_start,
        extent_length,
        position: 0,
        sector_index: None,
        sector: Vec::new(),
        decoded: 0,
        finished: false,
    })
}

/// Iterator over the records of one directory extent
///
/// Yields every record including "." and ".."; consecutive records of a
/// multi-extent file are merged into one record. Holds only the extent
/// coordinates and a cursor, so [`restart`](Self::restart) begins again from
/// the first record.
pub struct DirectoryEntries<'a> {
    reader: &'a SectorReader,
    extent_start: u32,
    extent_length: u32,
    position: u64,
    sector_index: Option<u64>,
    sector: Vec<u8>,
    decoded: usize,
    finished: bool,
}

impl<'a> DirectoryEntries<'a> {
    /// First sector of the extent being iterated
    pub fn extent_start(&self) -> u32 {
        self.extent_start
    }

    /// Length in bytes of the extent being iterated
    pub fn extent_length(&self) -> u32 {
        self.extent_length
    }

    /// Rewind to the first record
    pub fn restart(&mut self) {
        self.position = 0;
        self.decoded = 0;
        self.finished = false;
    }

    fn fail(&mut self, err: Error) -> Option<Result<DirectoryRecord>> {
        self.finished = true;
        Some(Err(err))
    }

    /// Decode the next physical record without merging extents
    fn next_record(&mut self) -> Option<Result<DirectoryRecord>> {
        let sector_size = self.reader.sector_size() as u64;

        loop {
            if self.finished || self.position >= self.extent_length as u64 {
                self.finished = true;
                return None;
            }

            let index = self.position / sector_size;
            let within = (self.position % sector_size) as usize;

            if self.sector_index != Some(index) {
                match self.reader.read_sector(self.extent_start as u64 + index) {
                    Ok(sector) => {
                        self.sector = sector;
                        self.sector_index = Some(index);
                    }
                    Err(e) => return self.fail(e),
                }
            }

            // The final sector may be only partly covered by the extent
            let limit = (self.extent_length as u64 - index * sector_size).min(sector_size) as usize;
            let length = if within < limit { self.sector[within] } else { 0 };

            if length == 0 {
                self.position = (index + 1) * sector_size;
                continue;
            }

            let absolute_sector = self.extent_start as u64 + index;
            let record = match decode_record(&self.sector[..limit], within) {
                Ok((mut record, record_length)) => {
                    self.position += record_length as u64;
                    record.found_at = (absolute_sector, within);
                    record
                }
                Err(e) => {
                    return self.fail(Error::format(format!(
                        "Sector {} offset {}: {}",
                        absolute_sector, within, e
                    )))
                }
            };

            self.decoded += 1;
            if self.decoded > MAX_DIRECTORY_ENTRIES {
                return self.fail(Error::format(format!(
                    "Directory at sector {} exceeds {} entries",
                    self.extent_start, MAX_DIRECTORY_ENTRIES
                )));
            }

            return Some(Ok(record));
        }
    }
}

impl<'a> Iterator for DirectoryEntries<'a> {
    type Item = Result<DirectoryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = match self.next_record()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };

        let mut more = record.is_multi_extent();
        while more {
            let part = match self.next_record() {
                Some(Ok(part)) => part,
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    return self.fail(Error::format(format!(
                        "Multi-extent file {:?} ends without a final record",
                        record.name
                    )))
                }
            };

            if part.identifier != record.identifier {
                return self.fail(Error::format(format!(
                    "Multi-extent file {:?} continues with {:?}",
                    record.name, part.name
                )));
            }

            more = part.is_multi_extent();
            record.continuation.push(Extent {
                location: part.data_location(),
                length: part.data_length,
            });
        }

        record.file_flags &= !DirectoryRecord::FLAG_NOT_FINAL;
        Some(Ok(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SectorGeometry;
    use crate::testutil::{record_bytes, IsoBuilder};
    use isoscope_core::ErrorKind;
    use isoscope_pipeline::MemorySource;
    use std::sync::Arc;

    fn reader_for(image: Vec<u8>) -> SectorReader {
        SectorReader::new(Arc::new(MemorySource::new(image)), SectorGeometry::COOKED).unwrap()
    }

    #[test]
    fn test_extended_attributes_precede_data() {
        let mut bytes = record_bytes(b"A.BIN;1", 30, 7, 0);
        bytes[1] = 2;
        let (record, _) = decode_record(&bytes, 0).unwrap();

        assert_eq!(record.extent_location, 30);
        assert_eq!(record.data_location(), 32);
        let extents: Vec<Extent> = record.extents().collect();
        assert_eq!(extents, vec![Extent { location: 32, length: 7 }]);
    }

    #[test]
    fn test_decode_file_record() {
        let bytes = record_bytes(b"README.TXT;1", 30, 1234, 0);
        let (record, length) = decode_record(&bytes, 0).unwrap();

        assert_eq!(length, bytes.len());
        assert_eq!(record.name, "README.TXT");
        assert_eq!(record.versioned_name(), "README.TXT;1");
        assert_eq!(record.extent_location, 30);
        assert_eq!(record.data_length, 1234);
        assert!(!record.is_directory());
        assert!(record.recording_date.to_utc().is_some());
    }

    #[test]
    fn test_decode_record_at_offset() {
        let mut buffer = record_bytes(b"A;1", 20, 1, 0);
        let first_len = buffer.len();
        buffer.extend(record_bytes(b"SUBDIR", 21, 2048, DirectoryRecord::FLAG_DIRECTORY));

        let (record, length) = decode_record(&buffer, first_len).unwrap();
        assert_eq!(record.name, "SUBDIR");
        assert!(record.is_directory());
        assert_eq!(first_len + length, buffer.len());
    }

    #[test]
    fn test_special_names() {
        let (dot, _) = decode_record(&record_bytes(&[0x00], 18, 2048, 2), 0).unwrap();
        assert_eq!(dot.name, ".");
        assert!(dot.is_self_or_parent());

        let (dotdot, _) = decode_record(&record_bytes(&[0x01], 18, 2048, 2), 0).unwrap();
        assert_eq!(dotdot.name, "..");
        assert!(dotdot.is_self_or_parent());
    }

    #[test]
    fn test_name_stripping() {
        assert_eq!(strip_version("FILE.TXT;1"), "FILE.TXT");
        assert_eq!(strip_version("NOEXT.;1"), "NOEXT");
        assert_eq!(strip_version("DIRNAME"), "DIRNAME");
        assert_eq!(strip_version("."), ".");
    }

    #[test]
    fn test_flags() {
        let (record, _) = decode_record(&record_bytes(b"SECRET.DAT;1", 20, 10, 0x01), 0).unwrap();
        assert!(record.is_hidden());
        assert!(!record.is_directory());
        assert!(!record.is_multi_extent());
    }

    #[test]
    fn test_invalid_lengths() {
        let mut bytes = record_bytes(b"X;1", 20, 10, 0);
        bytes[0] = 20;
        assert_eq!(decode_record(&bytes, 0).unwrap_err().kind(), ErrorKind::Format);

        // Record length claims more than the buffer holds
        let mut bytes = record_bytes(b"X;1", 20, 10, 0);
        bytes[0] = 200;
        assert_eq!(decode_record(&bytes, 0).unwrap_err().kind(), ErrorKind::Format);

        // Identifier longer than the record
        let mut bytes = record_bytes(b"X;1", 20, 10, 0);
        bytes[32] = 40;
        assert_eq!(decode_record(&bytes, 0).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn test_disagreeing_endian_fields() {
        let mut bytes = record_bytes(b"X;1", 20, 10, 0);
        bytes[9] = 0x55; // corrupt big-endian extent location
        let err = decode_record(&bytes, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("extent location"));
    }

    #[test]
    fn test_entries_include_self_and_parent() {
        let builder = IsoBuilder::new("TESTVOL")
            .file("/GAME.EXE", b"MZ".to_vec())
            .file("/README.TXT", b"hello".to_vec());
        let reader = reader_for(builder.build());
        let root = builder.root_extent();

        let names: Vec<String> = decode_directory_entries(&reader, root.location, root.length)
            .unwrap()
            .map(|r| r.unwrap().name)
            .collect();
        assert_eq!(names, vec![".", "..", "GAME.EXE", "README.TXT"]);
    }

    #[test]
    fn test_zero_padding_skips_to_next_sector() {
        // Enough entries to overflow the first sector of the root directory
        let mut builder = IsoBuilder::new("TESTVOL");
        for i in 0..80 {
            builder = builder.file(&format!("/FILE{:04}.DAT", i), vec![i as u8]);
        }
        let reader = reader_for(builder.build());
        let root = builder.root_extent();
        assert!(root.length > 2048);

        // The first sector ends in zero padding before its last byte
        let first = reader.read_sector(root.location as u64).unwrap();
        assert_eq!(first[2047], 0);

        let records: Vec<DirectoryRecord> =
            decode_directory_entries(&reader, root.location, root.length)
                .unwrap()
                .map(|r| r.unwrap())
                .filter(|r| !r.is_self_or_parent())
                .collect();
        assert_eq!(records.len(), 80);
        assert_eq!(records[79].name, "FILE0079.DAT");
    }

    #[test]
    fn test_restart() {
        let builder = IsoBuilder::new("TESTVOL").file("/A.TXT", b"a".to_vec());
        let reader = reader_for(builder.build());
        let root = builder.root_extent();

        let mut entries = decode_directory_entries(&reader, root.location, root.length).unwrap();
        let first: Vec<String> = entries.by_ref().map(|r| r.unwrap().name).collect();
        assert!(entries.next().is_none());

        entries.restart();
        let second: Vec<String> = entries.map(|r| r.unwrap().name).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_multi_extent_merge() {
        let data: Vec<u8> = (0u8..=255).cycle().take(5000).collect();
        let builder = IsoBuilder::new("TESTVOL").multi_extent_file("/BIG.BIN", data, 4096);
        let reader = reader_for(builder.build());
        let root = builder.root_extent();

        let big = decode_directory_entries(&reader, root.location, root.length)
            .unwrap()
            .map(|r| r.unwrap())
            .find(|r| r.name == "BIG.BIN")
            .unwrap();

        assert_eq!(big.data_length, 4096);
        assert_eq!(big.continuation.len(), 1);
        assert_eq!(big.continuation[0].length, 904);
        assert_eq!(big.size(), 5000);
        assert!(!big.is_multi_extent());
    }

    #[test]
    fn test_corrupt_record_aborts_iteration() {
        let builder = IsoBuilder::new("TESTVOL").file("/A.TXT", b"a".to_vec());
        let mut image = builder.build();
        let root = builder.root_extent();

        // Third record (after "." and "..") gets an impossible length
        let third = root.location as usize * 2048 + 34 + 34;
        image[third] = 10;

        let reader = reader_for(image);
        let results: Vec<Result<DirectoryRecord>> =
            decode_directory_entries(&reader, root.location, root.length)
                .unwrap()
                .collect();
        assert_eq!(results.len(), 3);
        assert!(results[2].is_err());
    }

    #[test]
    fn test_extent_outside_image() {
        let builder = IsoBuilder::new("TESTVOL");
        let reader = reader_for(builder.build());
        let err = decode_directory_entries(&reader, 10_000, 2048).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
