//! # isoscope ISO 9660
//!
//! Read-only access to ISO 9660 CD-ROM images without mounting them.
//!
//! - **SectorReader**: logical sector reads over cooked or raw (2352-byte) images
//! - **Descriptors**: volume descriptor set and primary volume descriptor
//! - **Records**: directory record decoding and lazy directory iteration
//! - **PathResolver**: cached, thread-safe path lookup
//! - **IsoImage**: the file system facade tying it all together
//!
//! ## Example
//!
//! ```rust,no_run
//! use isoscope_iso9660::{ImageConfig, IsoImage};
//!
//! let image = IsoImage::open("game.iso", ImageConfig::default()).unwrap();
//! println!("Volume: {}", image.volume_name());
//!
//! let readme = image.contents_of_file("/README.TXT").unwrap();
//! println!("{}", String::from_utf8_lossy(&readme));
//! ```

pub mod config;
pub mod descriptor;
pub mod enumerator;
pub mod geometry;
pub mod image;
pub mod path_table;
pub mod record;
pub mod resolver;
pub mod sector;
pub mod stream;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{CaseSensitivity, GeometryMode, ImageConfig};
pub use descriptor::{
    parse_primary_volume_descriptor, parse_volume_descriptors, PrimaryVolumeDescriptor,
    VolumeDescriptorSet, VolumeDescriptorType,
};
pub use enumerator::{DirectoryEnumerator, TreeEnumerator, WalkEntry};
pub use geometry::SectorGeometry;
pub use image::IsoImage;
pub use path_table::{PathTable, PathTableEntry};
pub use record::{
    decode_directory_entries, decode_record, DirectoryEntries, DirectoryRecord, Extent,
};
pub use resolver::PathResolver;
pub use sector::SectorReader;
pub use stream::ExtentReader;
