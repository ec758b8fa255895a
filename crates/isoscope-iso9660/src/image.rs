//! ISO 9660 image facade

use crate::config::{GeometryMode, ImageConfig};
use crate::descriptor::{parse_volume_descriptors, PrimaryVolumeDescriptor, VolumeDescriptorSet};
use crate::enumerator::{DirectoryEnumerator, TreeEnumerator};
use crate::geometry::SectorGeometry;
use crate::path_table::PathTable;
use crate::record::DirectoryRecord;
use crate::resolver::PathResolver;
use crate::sector::SectorReader;
use crate::stream::ExtentReader;
use isoscope_core::{
    validate_allocation_size, Error, FileAttributes, Filesystem, ImageSource, Result,
    MAX_FILE_EXTRACT_SIZE, MAX_PATH_DEPTH,
};
use isoscope_pipeline::open_source;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An opened ISO 9660 image
///
/// Immutable after opening apart from the path cache, and safe to share
/// between threads.
///
/// # Example
///
/// ```rust,no_run
/// use isoscope_iso9660::{ImageConfig, IsoImage};
///
/// let image = IsoImage::open("disc.iso", ImageConfig::default()).unwrap();
/// for entry in image.enumerator(None).unwrap() {
///     println!("{}", entry.unwrap());
/// }
/// ```
#[derive(Debug)]
pub struct IsoImage {
    reader: SectorReader,
    descriptors: VolumeDescriptorSet,
    volume_name: String,
    source_location: Option<PathBuf>,
    config: ImageConfig,
    resolver: PathResolver,
}

impl IsoImage {
    /// Open the image file at `path`
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened, or a format error
    /// if it does not hold a valid ISO 9660 volume.
    pub fn open(path: impl AsRef<Path>, config: ImageConfig) -> Result<Self> {
        let path = path.as_ref();
        let source: Arc<dyn ImageSource> = Arc::from(open_source(path, config.source_config())?);
        let mut image = Self::with_source(source, config)?;
        image.source_location = Some(path.to_path_buf());
        Ok(image)
    }

    /// Open an image from any positioned-read source
    pub fn from_source(source: impl ImageSource + 'static, config: ImageConfig) -> Result<Self> {
        Self::with_source(Arc::new(source), config)
    }

    fn with_source(source: Arc<dyn ImageSource>, config: ImageConfig) -> Result<Self> {
        let geometry = match config.geometry {
            GeometryMode::Auto => SectorGeometry::detect(&*source)?,
            GeometryMode::Cooked => SectorGeometry::COOKED,
            GeometryMode::RawMode1 => SectorGeometry::RAW_MODE1,
            GeometryMode::RawMode2Form1 => SectorGeometry::RAW_MODE2_FORM1,
            GeometryMode::Custom(geometry) => geometry,
        };

        let reader = SectorReader::new(source, geometry)?;
        let descriptors = parse_volume_descriptors(&reader, config.descriptor_scan_limit)?;
        let primary = &descriptors.primary;

        let volume_name = primary.volume_label().to_string();
        let max_depth = (reader.sector_count().min(MAX_PATH_DEPTH as u64)) as usize;

        let mut resolver = PathResolver::new(
            primary.root_directory_record.clone(),
            config.case_sensitivity,
            max_depth,
        );

        if config.use_path_table {
            match PathTable::read(
                &reader,
                primary.l_path_table,
                primary.path_table_size,
                config.case_sensitivity,
            ) {
                Ok(table) => resolver = resolver.with_path_table(table),
                Err(e) => tracing::warn!("Ignoring unreadable path table: {}", e),
            }
        }

        tracing::debug!(
            "Opened volume {:?}: {} sectors, {}",
            volume_name,
            reader.sector_count(),
            geometry
        );

        Ok(Self {
            reader,
            descriptors,
            volume_name,
            source_location: None,
            config,
            resolver,
        })
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    /// Path of the image file, if opened from one
    pub fn source_location(&self) -> Option<&Path> {
        self.source_location.as_deref()
    }

    /// Size of the image file in bytes
    pub fn image_size(&self) -> u64 {
        self.reader.image_size()
    }

    pub fn geometry(&self) -> SectorGeometry {
        self.reader.geometry()
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    pub fn primary_descriptor(&self) -> &PrimaryVolumeDescriptor {
        &self.descriptors.primary
    }

    /// Every volume descriptor found at open
    pub fn descriptors(&self) -> &VolumeDescriptorSet {
        &self.descriptors
    }

    pub fn sector_reader(&self) -> &SectorReader {
        &self.reader
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Resolve `path` to its directory record
    pub fn resolve(&self, path: &str) -> Result<DirectoryRecord> {
        self.resolver.resolve(&self.reader, path)
    }

    /// Convert a record to generic attributes
    pub fn attributes_of(&self, record: &DirectoryRecord) -> FileAttributes {
        let name = if record.name == "/" {
            "/".to_string()
        } else {
            record.display_name(self.config.strip_version)
        };

        let attributes = if record.is_directory() {
            FileAttributes::directory(name, record.size())
        } else {
            FileAttributes::file(name, record.size())
        };

        attributes
            .with_modified(record.recording_date.to_utc())
            .with_hidden(record.is_hidden())
            .with_location(record.extent_location as u64)
            .with_attributes(record.file_flags as u32)
    }

    /// Get the attributes of the entry at `path`
    pub fn attributes_of_file(&self, path: &str) -> Result<FileAttributes> {
        let record = self.resolve(path)?;
        Ok(self.attributes_of(&record))
    }

    /// Read the whole file at `path`
    ///
    /// # Errors
    ///
    /// - `IsADirectory` if `path` names a directory
    /// - `Unsupported` for interleaved files
    /// - `Format` if the file is larger than the extraction limit
    /// - `Io` if the data lies outside the image
    pub fn contents_of_file(&self, path: &str) -> Result<Vec<u8>> {
        let record = self.resolve(path)?;
        self.contents_of(path, &record)
    }

    fn contents_of(&self, path: &str, record: &DirectoryRecord) -> Result<Vec<u8>> {
        if record.is_directory() {
            return Err(Error::is_a_directory(path));
        }
        if record.is_interleaved() {
            return Err(Error::unsupported(format!(
                "{} is recorded in interleaved mode",
                path
            )));
        }

        let size = validate_allocation_size(record.size(), MAX_FILE_EXTRACT_SIZE, path)?;
        let mut data = vec![0u8; size];

        let mut filled = 0usize;
        for extent in record.extents() {
            let length = extent.length as usize;
            self.reader
                .read_into(extent.location as u64, 0, &mut data[filled..filled + length])?;
            filled += length;
        }

        Ok(data)
    }

    /// Enumerate the children of a directory (`None` for the root)
    pub fn enumerator(&self, path: Option<&str>) -> Result<DirectoryEnumerator<'_>> {
        let path = path.unwrap_or("/");
        let record = self.resolve(path)?;
        if !record.is_directory() {
            return Err(Error::not_a_directory(path));
        }
        DirectoryEnumerator::new(&self.reader, record)
    }

    /// Walk the tree below `path` depth first
    pub fn walk(&self, path: &str) -> Result<TreeEnumerator<'_>> {
        let record = self.resolve(path)?;
        if !record.is_directory() {
            return Err(Error::not_a_directory(path));
        }

        // Build the prefix from on-disc names, not the caller's spelling
        let segments = self.resolver.normalize(path)?;
        let mut root_path = String::new();
        for depth in 1..=segments.len() {
            let prefix = self.resolve(&segments[..depth].join("/"))?;
            root_path.push('/');
            root_path.push_str(&prefix.name);
        }
        if root_path.is_empty() {
            root_path.push('/');
        }
        let max_depth = (self.reader.sector_count().min(MAX_PATH_DEPTH as u64)) as usize;

        TreeEnumerator::new(
            &self.reader,
            root_path,
            &record,
            self.config.strip_version,
            max_depth.saturating_sub(segments.len()),
        )
    }

    /// Open the file at `path` for streaming reads
    pub fn open_file(&self, path: &str) -> Result<ExtentReader<'_>> {
        let record = self.resolve(path)?;
        if record.is_directory() {
            return Err(Error::is_a_directory(path));
        }
        if record.is_interleaved() {
            return Err(Error::unsupported(format!(
                "{} is recorded in interleaved mode",
                path
            )));
        }
        for extent in record.extents() {
            self.reader
                .check_extent(extent.location as u64, extent.length as u64)?;
        }
        Ok(ExtentReader::new(&self.reader, &record))
    }
}

impl Filesystem for IsoImage {
    fn identify(&self) -> &str {
        "ISO 9660 filesystem"
    }

    fn volume_name(&self) -> &str {
        &self.volume_name
    }

    fn block_size(&self) -> u64 {
        self.descriptors.primary.logical_block_size as u64
    }

    fn domain_size(&self) -> u64 {
        self.descriptors.primary.volume_size()
    }

    fn attributes_of_file(&self, path: &str) -> Result<FileAttributes> {
        IsoImage::attributes_of_file(self, path)
    }

    fn contents_of_file(&self, path: &str) -> Result<Vec<u8>> {
        IsoImage::contents_of_file(self, path)
    }

    fn list_directory(&self, path: &str) -> Result<Vec<FileAttributes>> {
        self.enumerator(Some(path))?
            .map(|record| record.map(|r| self.attributes_of(&r)))
            .collect()
    }
}
