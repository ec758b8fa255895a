//! L-type path table: a flat index of every directory on the volume

use crate::config::CaseSensitivity;
use crate::sector::SectorReader;
use isoscope_core::{validate_allocation_size, Error, Result, MAX_DIRECTORY_ENTRIES};
use std::collections::HashMap;

/// One directory listed in the path table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTableEntry {
    /// Directory identifier
    pub name: String,
    /// First sector of the directory's extent
    pub extent_location: u32,
    /// Sectors of extended attribute record ahead of the directory data
    pub extended_attr_length: u8,
    /// 1-based index of the parent entry
    pub parent: u16,
    /// Absolute path, "/" for the root
    pub path: String,
}

impl PathTableEntry {
    /// First sector of the directory's records
    pub fn data_location(&self) -> u32 {
        self.extent_location.saturating_add(self.extended_attr_length as u32)
    }
}

/// Parsed path table with a lookup index on absolute paths
#[derive(Debug, Clone)]
pub struct PathTable {
    entries: Vec<PathTableEntry>,
    index: HashMap<String, usize>,
    case: CaseSensitivity,
}

impl PathTable {
    /// Read and parse the L-type path table
    ///
    /// # Errors
    ///
    /// Returns an error if the table lies outside the image, an entry is
    /// truncated, or an entry's parent does not precede it.
    pub fn read(
        reader: &SectorReader,
        location: u32,
        size: u32,
        case: CaseSensitivity,
    ) -> Result<Self> {
        let limit = (MAX_DIRECTORY_ENTRIES * 264) as u64;
        let length = validate_allocation_size(size as u64, limit, "Path table")?;
        let data = reader.read_bytes(location as u64, 0, length)?;
        Self::parse(&data, case)
    }

    /// Parse little-endian path table bytes
    pub fn parse(data: &[u8], case: CaseSensitivity) -> Result<Self> {
        let mut entries: Vec<PathTableEntry> = Vec::new();
        let mut pos = 0;

        while pos + 8 <= data.len() {
            let identifier_length = data[pos] as usize;
            if identifier_length == 0 {
                // Trailing padding
                break;
            }

            let end = pos + 8 + identifier_length;
            if end > data.len() {
                return Err(Error::format(format!(
                    "Path table entry at offset {} overruns the table",
                    pos
                )));
            }

            let extent_location =
                u32::from_le_bytes([data[pos + 2], data[pos + 3], data[pos + 4], data[pos + 5]]);
            let parent = u16::from_le_bytes([data[pos + 6], data[pos + 7]]);
            let identifier = &data[pos + 8..end];

            let number = entries.len() + 1;
            let path = if number == 1 {
                "/".to_string()
            } else {
                if parent == 0 || parent as usize >= number {
                    return Err(Error::format(format!(
                        "Path table entry {} has parent {} which does not precede it",
                        number, parent
                    )));
                }
                let (name, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(identifier);
                let parent_path = &entries[parent as usize - 1].path;
                if parent_path == "/" {
                    format!("/{}", name)
                } else {
                    format!("{}/{}", parent_path, name)
                }
            };

            let name = match path.rsplit('/').next() {
                Some("") | None => "/".to_string(),
                Some(name) => name.to_string(),
            };

            entries.push(PathTableEntry {
                name,
                extent_location,
                extended_attr_length: data[pos + 1],
                parent,
                path,
            });

            if entries.len() > MAX_DIRECTORY_ENTRIES {
                return Err(Error::format("Path table has too many entries"));
            }

            pos = end + identifier_length % 2;
        }

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (case.key(&entry.path), i))
            .collect();

        tracing::debug!("Path table: {} directories", entries.len());

        Ok(Self { entries, index, case })
    }

    /// Find the directory at a normalized absolute path
    pub fn lookup(&self, path: &str) -> Option<&PathTableEntry> {
        self.index.get(&self.case.key(path)).map(|&i| &self.entries[i])
    }

    /// All entries in table order
    pub fn entries(&self) -> &[PathTableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
