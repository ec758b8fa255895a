//! Path resolution with a shared cache of decoded records
//!
//! Every resolved prefix of a path is cached under its normalized key, so a
//! later lookup of `/A/B/C` starts from the deepest cached ancestor instead
//! of the root. Concurrent lookups of the same prefix wait on a per-key gate
//! and decode the parent directory only once; unrelated prefixes never wait
//! on each other.

use crate::config::CaseSensitivity;
use crate::path_table::PathTable;
use crate::record::{decode_directory_entries, DirectoryRecord};
use crate::sector::SectorReader;
use isoscope_core::{Error, Result};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

fn poisoned() -> Error {
    Error::Io(io::Error::new(io::ErrorKind::Other, "Path cache lock poisoned"))
}

/// Resolves absolute paths to directory records
#[derive(Debug)]
pub struct PathResolver {
    root: DirectoryRecord,
    case: CaseSensitivity,
    max_depth: usize,
    cache: RwLock<HashMap<String, DirectoryRecord>>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    path_table: Option<PathTable>,
    directory_scans: AtomicUsize,
}

impl PathResolver {
    /// Create a resolver rooted at `root`
    ///
    /// Paths deeper than `max_depth` segments are rejected.
    pub fn new(root: DirectoryRecord, case: CaseSensitivity, max_depth: usize) -> Self {
        Self {
            root,
            case,
            max_depth,
            cache: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            path_table: None,
            directory_scans: AtomicUsize::new(0),
        }
    }

    /// Use `table` to jump straight to directories
    pub fn with_path_table(mut self, table: PathTable) -> Self {
        self.path_table = Some(table);
        self
    }

    pub fn root(&self) -> &DirectoryRecord {
        &self.root
    }

    pub fn path_table(&self) -> Option<&PathTable> {
        self.path_table.as_ref()
    }

    /// Split a path into its segments
    ///
    /// Both `/` and `\` separate segments; empty and `.` segments are dropped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` for `..` segments and for paths deeper than the
    /// resolver's depth limit.
    pub fn normalize(&self, path: &str) -> Result<Vec<String>> {
        let mut segments = Vec::new();
        for segment in path.split(|c| c == '/' || c == '\\') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(Error::invalid_path(format!(
                        "Parent references are not allowed: {}",
                        path
                    )))
                }
                s => segments.push(s.to_string()),
            }
        }

        if segments.len() > self.max_depth {
            return Err(Error::invalid_path(format!(
                "Path has {} segments, limit is {}",
                segments.len(),
                self.max_depth
            )));
        }

        Ok(segments)
    }

    fn display_path(segments: &[String]) -> String {
        format!("/{}", segments.join("/"))
    }

    fn cache_key(&self, segments: &[String]) -> String {
        self.case.key(&Self::display_path(segments))
    }

    fn cached(&self, key: &str) -> Result<Option<DirectoryRecord>> {
        let cache = self.cache.read().map_err(|_| poisoned())?;
        Ok(cache.get(key).cloned())
    }

    fn remember(&self, key: String, record: &DirectoryRecord) -> Result<()> {
        let mut cache = self.cache.write().map_err(|_| poisoned())?;
        cache.entry(key).or_insert_with(|| record.clone());
        Ok(())
    }

    /// Resolve `path` to its directory record
    ///
    /// # Errors
    ///
    /// - `InvalidPath` if the path cannot be normalized
    /// - `NotFound` naming the first missing segment
    /// - `NotADirectory` if a non-final segment is a file
    /// - `Io` or `Format` if a directory on the way cannot be decoded
    pub fn resolve(&self, reader: &SectorReader, path: &str) -> Result<DirectoryRecord> {
        let segments = self.normalize(path)?;
        if segments.is_empty() {
            return Ok(self.root.clone());
        }

        let (mut start, mut current) = self.deepest_cached(&segments)?;
        if start > 0 {
            tracing::debug!("Path cache hit for {} at depth {}", path, start);
        }

        if let Some((depth, record)) = self.from_path_table(reader, &segments, start)? {
            start = depth;
            current = record;
        }

        for i in start..segments.len() {
            if !current.is_directory() {
                return Err(Error::not_a_directory(Self::display_path(&segments[..i])));
            }
            current = self.lookup_child(reader, &current, &segments, i)?;
        }

        Ok(current)
    }

    /// Deepest cached prefix of `segments`, as (segments consumed, record)
    fn deepest_cached(&self, segments: &[String]) -> Result<(usize, DirectoryRecord)> {
        let cache = self.cache.read().map_err(|_| poisoned())?;
        for depth in (1..=segments.len()).rev() {
            if let Some(record) = cache.get(&self.cache_key(&segments[..depth])) {
                return Ok((depth, record.clone()));
            }
        }
        Ok((0, self.root.clone()))
    }

    /// Deepest proper prefix of `segments` past `start` listed in the path table
    ///
    /// The returned record is the directory's own "." entry and serves only as
    /// the starting point for the remaining scans. It is not cached, so every
    /// cached record is the entry from its parent's listing.
    fn from_path_table(
        &self,
        reader: &SectorReader,
        segments: &[String],
        start: usize,
    ) -> Result<Option<(usize, DirectoryRecord)>> {
        let table = match &self.path_table {
            Some(table) => table,
            None => return Ok(None),
        };

        for depth in (start + 1..segments.len()).rev() {
            let prefix = Self::display_path(&segments[..depth]);
            let entry = match table.lookup(&prefix) {
                Some(entry) => entry,
                None => continue,
            };

            // The "." record at the start of the extent carries the directory's size
            let mut entries =
                decode_directory_entries(reader, entry.data_location(), reader.sector_size())?;
            let mut record = match entries.next() {
                Some(record) => record?,
                None => continue,
            };
            if !record.is_directory() || record.extent_location != entry.extent_location {
                tracing::warn!(
                    "Path table entry {} disagrees with its directory extent, walking instead",
                    entry.path
                );
                return Ok(None);
            }
            record.extended_attr_length = entry.extended_attr_length;

            tracing::debug!("Path table hit for {}", prefix);
            return Ok(Some((depth, record)));
        }

        Ok(None)
    }

    /// Find `segments[index]` inside `parent`, decoding it at most once per key
    fn lookup_child(
        &self,
        reader: &SectorReader,
        parent: &DirectoryRecord,
        segments: &[String],
        index: usize,
    ) -> Result<DirectoryRecord> {
        let key = self.cache_key(&segments[..=index]);

        if let Some(record) = self.cached(&key)? {
            return Ok(record);
        }

        let gate = {
            let mut in_flight = self.in_flight.lock().map_err(|_| poisoned())?;
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = gate.lock().map_err(|_| poisoned())?;

        // Another thread may have finished the same lookup while we waited
        if let Some(record) = self.cached(&key)? {
            return Ok(record);
        }

        tracing::debug!(
            "Path cache miss for {}, scanning directory at LBA {}",
            key,
            parent.data_location()
        );
        let result = self.scan(reader, parent, &segments[index]);

        if let Ok(Some(record)) = &result {
            self.remember(key.clone(), record)?;
        }
        self.in_flight.lock().map_err(|_| poisoned())?.remove(&key);

        match result? {
            Some(record) => Ok(record),
            None => Err(Error::not_found(
                Self::display_path(segments),
                segments[index].clone(),
            )),
        }
    }

    fn scan(
        &self,
        reader: &SectorReader,
        parent: &DirectoryRecord,
        name: &str,
    ) -> Result<Option<DirectoryRecord>> {
        self.directory_scans.fetch_add(1, Ordering::Relaxed);

        let entries =
            decode_directory_entries(reader, parent.data_location(), parent.data_length)?;
        for record in entries {
            let record = record?;
            if record.is_self_or_parent() {
                continue;
            }
            if self.case.matches(&record.name, name)
                || self.case.matches(&record.versioned_name(), name)
            {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    /// Number of cached path prefixes
    pub fn cached_len(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Number of directory scans performed so far
    pub fn directory_scans(&self) -> usize {
        self.directory_scans.load(Ordering::Relaxed)
    }
}
