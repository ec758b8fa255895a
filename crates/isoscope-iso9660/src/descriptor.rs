//! Volume descriptor set parsing

use crate::record::{decode_record, DirectoryRecord};
use crate::sector::SectorReader;
use crate::types::{
    both_endian_u16, both_endian_u32, decode_identifier, IsoAsciiDateTime, STANDARD_IDENTIFIER,
    VOLUME_DESCRIPTOR_START_SECTOR,
};
use isoscope_core::{validate_logical_block_size, Error, ErrorKind, Result};

/// Volume descriptor types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VolumeDescriptorType {
    BootRecord = 0,
    PrimaryVolumeDescriptor = 1,
    SupplementaryVolumeDescriptor = 2,
    VolumePartitionDescriptor = 3,
    VolumeDescriptorSetTerminator = 255,
}

impl VolumeDescriptorType {
    /// Try to convert from a u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::BootRecord),
            1 => Some(Self::PrimaryVolumeDescriptor),
            2 => Some(Self::SupplementaryVolumeDescriptor),
            3 => Some(Self::VolumePartitionDescriptor),
            255 => Some(Self::VolumeDescriptorSetTerminator),
            _ => None,
        }
    }
}

/// Primary Volume Descriptor (sector 16 onwards)
#[derive(Debug, Clone)]
pub struct PrimaryVolumeDescriptor {
    pub version: u8,
    pub system_identifier: String,
    pub volume_identifier: String,
    pub volume_space_size: u32, // Total number of logical blocks
    pub volume_set_size: u16,
    pub volume_sequence_number: u16,
    pub logical_block_size: u16, // Usually 2048
    pub path_table_size: u32,
    pub l_path_table: u32,          // Little-endian path table location
    pub optional_l_path_table: u32, // 0 when absent
    pub m_path_table: u32,          // Big-endian path table location
    pub optional_m_path_table: u32,
    pub root_directory_record: DirectoryRecord,
    pub volume_set_identifier: String,
    pub publisher_identifier: String,
    pub data_preparer_identifier: String,
    pub application_identifier: String,
    pub copyright_file_identifier: String,
    pub abstract_file_identifier: String,
    pub bibliographic_file_identifier: String,
    pub volume_creation_date: IsoAsciiDateTime,
    pub volume_modification_date: IsoAsciiDateTime,
    pub volume_expiration_date: IsoAsciiDateTime,
    pub volume_effective_date: IsoAsciiDateTime,
    pub file_structure_version: u8,
}

impl PrimaryVolumeDescriptor {
    /// Parse from a logical sector
    ///
    /// # Errors
    ///
    /// Returns a format error if the sector is not a version 1 primary
    /// descriptor, a both-endian field disagrees with itself, or the block
    /// size or root directory record is invalid.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2048 {
            return Err(Error::format(format!(
                "Primary volume descriptor needs 2048 bytes, got {}",
                bytes.len()
            )));
        }

        if bytes[0] != VolumeDescriptorType::PrimaryVolumeDescriptor as u8 {
            return Err(Error::format(format!(
                "Descriptor type {} is not a primary volume descriptor",
                bytes[0]
            )));
        }

        if &bytes[1..6] != STANDARD_IDENTIFIER {
            return Err(Error::format(format!(
                "Invalid ISO-9660 identifier: {:?}",
                &bytes[1..6]
            )));
        }

        let version = bytes[6];
        if version != 1 {
            return Err(Error::format(format!(
                "Unsupported primary volume descriptor version {}",
                version
            )));
        }

        let volume_space_size = both_endian_u32(&bytes[80..88], "Volume space size")?;
        let volume_set_size = both_endian_u16(&bytes[120..124], "Volume set size")?;
        let volume_sequence_number = both_endian_u16(&bytes[124..128], "Volume sequence number")?;
        let logical_block_size = both_endian_u16(&bytes[128..132], "Logical block size")?;
        let path_table_size = both_endian_u32(&bytes[132..140], "Path table size")?;

        validate_logical_block_size(logical_block_size as u32)?;

        let word = |at: usize| [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
        let le = |at: usize| u32::from_le_bytes(word(at));
        let be = |at: usize| u32::from_be_bytes(word(at));

        // Root directory record (34 bytes at offset 156)
        let (mut root_directory_record, _) = decode_record(&bytes[156..190], 0)
            .map_err(|e| Error::format(format!("Root directory record: {}", e)))?;
        if !root_directory_record.is_directory() {
            return Err(Error::format("Root directory record is not a directory"));
        }
        root_directory_record.name = "/".to_string();

        let date = |offset: usize| {
            IsoAsciiDateTime::from_bytes(&bytes[offset..offset + 17])
                .ok_or_else(|| Error::format(format!("Truncated date at offset {}", offset)))
        };

        Ok(Self {
            version,
            system_identifier: decode_identifier(&bytes[8..40]),
            volume_identifier: decode_identifier(&bytes[40..72]),
            volume_space_size,
            volume_set_size,
            volume_sequence_number,
            logical_block_size,
            path_table_size,
            l_path_table: le(140),
            optional_l_path_table: le(144),
            m_path_table: be(148),
            optional_m_path_table: be(152),
            root_directory_record,
            volume_set_identifier: decode_identifier(&bytes[190..318]),
            publisher_identifier: decode_identifier(&bytes[318..446]),
            data_preparer_identifier: decode_identifier(&bytes[446..574]),
            application_identifier: decode_identifier(&bytes[574..702]),
            copyright_file_identifier: decode_identifier(&bytes[702..739]),
            abstract_file_identifier: decode_identifier(&bytes[739..776]),
            bibliographic_file_identifier: decode_identifier(&bytes[776..813]),
            volume_creation_date: date(813)?,
            volume_modification_date: date(830)?,
            volume_expiration_date: date(847)?,
            volume_effective_date: date(864)?,
            file_structure_version: bytes[881],
        })
    }

    /// Get the volume label as a trimmed string
    pub fn volume_label(&self) -> &str {
        &self.volume_identifier
    }

    /// Total size of the volume in bytes
    pub fn volume_size(&self) -> u64 {
        self.volume_space_size as u64 * self.logical_block_size as u64
    }
}

/// All volume descriptors found between sector 16 and the terminator
#[derive(Debug, Clone)]
pub struct VolumeDescriptorSet {
    /// The first primary volume descriptor
    pub primary: PrimaryVolumeDescriptor,
    /// Every descriptor seen, in order, as (sector, type)
    pub descriptors: Vec<(u64, VolumeDescriptorType)>,
    /// Sector holding the set terminator
    pub terminator_sector: u64,
}

impl VolumeDescriptorSet {
    /// Sectors of descriptors of the given type
    pub fn sectors_of(&self, kind: VolumeDescriptorType) -> impl Iterator<Item = u64> + '_ {
        self.descriptors
            .iter()
            .filter(move |(_, t)| *t == kind)
            .map(|(sector, _)| *sector)
    }

    /// True if an El Torito style boot record is present
    pub fn has_boot_record(&self) -> bool {
        self.sectors_of(VolumeDescriptorType::BootRecord).next().is_some()
    }
}

/// Scan the volume descriptor set starting at sector 16
///
/// Reads at most `scan_limit` descriptors looking for the terminator.
///
/// # Errors
///
/// Returns a format error if a descriptor lacks the `CD001` identifier, no
/// primary descriptor precedes the terminator, the terminator is not found
/// within `scan_limit` sectors, or the image ends inside the descriptor set.
pub fn parse_volume_descriptors(
    reader: &SectorReader,
    scan_limit: u32,
) -> Result<VolumeDescriptorSet> {
    let mut primary: Option<PrimaryVolumeDescriptor> = None;
    let mut descriptors = Vec::new();

    for index in 0..scan_limit as u64 {
        let sector_number = VOLUME_DESCRIPTOR_START_SECTOR + index;
        let sector = reader.read_sector(sector_number).map_err(|e| match e.kind() {
            ErrorKind::Io => Error::format(format!(
                "Truncated descriptor set at sector {}: {}",
                sector_number, e
            )),
            _ => e,
        })?;

        let descriptor_type = sector[0];
        if &sector[1..6] != STANDARD_IDENTIFIER {
            return Err(Error::format(format!(
                "Invalid ISO-9660 identifier at sector {}: {:?}",
                sector_number,
                &sector[1..6]
            )));
        }

        match VolumeDescriptorType::from_u8(descriptor_type) {
            Some(VolumeDescriptorType::VolumeDescriptorSetTerminator) => {
                descriptors.push((
                    sector_number,
                    VolumeDescriptorType::VolumeDescriptorSetTerminator,
                ));
                let primary = primary.ok_or_else(|| {
                    Error::format("No primary volume descriptor before the set terminator")
                })?;
                tracing::debug!(
                    "Descriptor set: {} descriptors, terminator at sector {}",
                    descriptors.len(),
                    sector_number
                );
                return Ok(VolumeDescriptorSet {
                    primary,
                    descriptors,
                    terminator_sector: sector_number,
                });
            }
            Some(VolumeDescriptorType::PrimaryVolumeDescriptor) => {
                descriptors.push((sector_number, VolumeDescriptorType::PrimaryVolumeDescriptor));
                if primary.is_none() {
                    let pvd = PrimaryVolumeDescriptor::from_bytes(&sector)
                        .map_err(|e| Error::format(format!("Sector {}: {}", sector_number, e)))?;
                    if pvd.logical_block_size as u32 != reader.sector_size() {
                        return Err(Error::format(format!(
                            "Logical block size {} does not match the {}-byte sector size",
                            pvd.logical_block_size,
                            reader.sector_size()
                        )));
                    }
                    tracing::debug!(
                        "Primary volume descriptor at sector {}: {:?}, {} blocks",
                        sector_number,
                        pvd.volume_identifier,
                        pvd.volume_space_size
                    );
                    primary = Some(pvd);
                } else {
                    tracing::debug!(
                        "Ignoring extra primary descriptor at sector {}",
                        sector_number
                    );
                }
            }
            Some(kind) => {
                tracing::debug!("{:?} at sector {}", kind, sector_number);
                descriptors.push((sector_number, kind));
            }
            None => {
                tracing::warn!(
                    "Unknown volume descriptor type {} at sector {}, skipping",
                    descriptor_type,
                    sector_number
                );
            }
        }
    }

    Err(Error::format(format!(
        "No volume descriptor set terminator within {} sectors",
        scan_limit
    )))
}

/// Locate and parse the primary volume descriptor
pub fn parse_primary_volume_descriptor(reader: &SectorReader) -> Result<PrimaryVolumeDescriptor> {
    parse_volume_descriptors(reader, isoscope_core::DEFAULT_DESCRIPTOR_SCAN_LIMIT)
        .map(|set| set.primary)
}
