//! Core types for image reading

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Attributes of a file or directory inside an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    /// Name of the file or directory
    pub name: String,

    /// True if this is a directory, false if it's a file
    pub is_directory: bool,

    /// Size in bytes (extent length for directories)
    pub size: u64,

    /// Recording timestamp
    pub modified: Option<DateTime<Utc>>,

    /// Hidden (existence) flag
    pub hidden: bool,

    /// First logical sector of the entry's data
    pub location: u64,

    /// Raw file system flag bits
    pub attributes: u32,
}

impl FileAttributes {
    /// Create a new file entry
    pub fn file(name: String, size: u64) -> Self {
        Self {
            name,
            is_directory: false,
            size,
            modified: None,
            hidden: false,
            location: 0,
            attributes: 0,
        }
    }

    /// Create a new directory entry
    pub fn directory(name: String, size: u64) -> Self {
        Self {
            name,
            is_directory: true,
            size,
            modified: None,
            hidden: false,
            location: 0,
            attributes: 0,
        }
    }

    /// Set modified timestamp
    pub fn with_modified(mut self, modified: Option<DateTime<Utc>>) -> Self {
        self.modified = modified;
        self
    }

    /// Set hidden flag
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set data location
    pub fn with_location(mut self, location: u64) -> Self {
        self.location = location;
        self
    }

    /// Set attributes
    pub fn with_attributes(mut self, attributes: u32) -> Self {
        self.attributes = attributes;
        self
    }
}

impl fmt::Display for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_char = if self.is_directory { "d" } else { "f" };
        let modified = self
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{} {:>12} {:>16} {}",
            type_char,
            if self.is_directory {
                "<DIR>".to_string()
            } else {
                format_size(self.size)
            },
            modified,
            self.name
        )
    }
}

/// Format size in human-readable format
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_attributes_file() {
        let file = FileAttributes::file("README.TXT".to_string(), 1024);
        assert_eq!(file.name, "README.TXT");
        assert!(!file.is_directory);
        assert_eq!(file.size, 1024);
    }

    #[test]
    fn test_file_attributes_directory() {
        let dir = FileAttributes::directory("SUBDIR".to_string(), 2048).with_location(20);
        assert!(dir.is_directory);
        assert_eq!(dir.location, 20);
        assert!(dir.to_string().contains("<DIR>"));
    }

    #[test]
    fn test_display_with_timestamp() {
        let when = Utc.with_ymd_and_hms(1996, 3, 14, 9, 30, 0).unwrap();
        let file = FileAttributes::file("GAME.EXE".to_string(), 512).with_modified(Some(when));
        let line = file.to_string();
        assert!(line.starts_with("f "));
        assert!(line.contains("1996-03-14 09:30"));
        assert!(line.ends_with("GAME.EXE"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(1536 * 1024), "1.50 MB");
    }
}
