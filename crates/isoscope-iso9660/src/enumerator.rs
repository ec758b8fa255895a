//! Directory enumeration: one level, or a whole subtree

use crate::record::{decode_directory_entries, DirectoryEntries, DirectoryRecord};
use crate::sector::SectorReader;
use isoscope_core::Result;

/// Lazy, restartable cursor over the children of one directory
///
/// The "." and ".." records are skipped.
pub struct DirectoryEnumerator<'a> {
    directory: DirectoryRecord,
    entries: DirectoryEntries<'a>,
}

impl<'a> DirectoryEnumerator<'a> {
    pub(crate) fn new(reader: &'a SectorReader, directory: DirectoryRecord) -> Result<Self> {
        let entries =
            decode_directory_entries(reader, directory.data_location(), directory.data_length)?;
        Ok(Self { directory, entries })
    }

    /// The directory being enumerated
    pub fn directory(&self) -> &DirectoryRecord {
        &self.directory
    }

    /// Start again from the first child
    pub fn restart(&mut self) {
        self.entries.restart();
    }
}

impl<'a> Iterator for DirectoryEnumerator<'a> {
    type Item = Result<DirectoryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.entries.next()? {
                Ok(record) if record.is_self_or_parent() => continue,
                other => return Some(other),
            }
        }
    }
}

/// One entry produced by [`TreeEnumerator`]
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Absolute path of the entry
    pub path: String,
    /// Depth below the walk root, starting at 1
    pub level: usize,
    pub record: DirectoryRecord,
}

struct Frame<'a> {
    path: String,
    extent: u32,
    entries: DirectoryEntries<'a>,
}

/// Depth-first walk of a directory tree
///
/// Each directory is yielded before its contents. Calling
/// [`skip_descendants`](Self::skip_descendants) right after a directory was
/// yielded prevents the walk from entering it.
pub struct TreeEnumerator<'a> {
    reader: &'a SectorReader,
    strip_version: bool,
    max_depth: usize,
    stack: Vec<Frame<'a>>,
    pending: Option<(String, DirectoryRecord)>,
}

impl<'a> TreeEnumerator<'a> {
    pub(crate) fn new(
        reader: &'a SectorReader,
        root_path: String,
        root: &DirectoryRecord,
        strip_version: bool,
        max_depth: usize,
    ) -> Result<Self> {
        let entries = decode_directory_entries(reader, root.data_location(), root.data_length)?;
        Ok(Self {
            reader,
            strip_version,
            max_depth,
            stack: vec![Frame {
                path: root_path,
                extent: root.extent_location,
                entries,
            }],
            pending: None,
        })
    }

    /// Depth of the directory currently being read
    pub fn level(&self) -> usize {
        self.stack.len()
    }

    /// Do not descend into the directory yielded last
    pub fn skip_descendants(&mut self) {
        self.pending = None;
    }

    fn descend(&mut self, path: String, directory: DirectoryRecord) -> Result<()> {
        if self.stack.len() >= self.max_depth {
            tracing::warn!(
                "Not descending into {}: depth limit {} reached",
                path,
                self.max_depth
            );
            return Ok(());
        }

        if self.stack.iter().any(|frame| frame.extent == directory.extent_location) {
            tracing::warn!(
                "Not descending into {}: extent {} is one of its ancestors",
                path,
                directory.extent_location
            );
            return Ok(());
        }

        let entries = decode_directory_entries(
            self.reader,
            directory.data_location(),
            directory.data_length,
        )?;
        self.stack.push(Frame {
            path,
            extent: directory.extent_location,
            entries,
        });
        Ok(())
    }
}

impl<'a> Iterator for TreeEnumerator<'a> {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((path, directory)) = self.pending.take() {
            if let Err(e) = self.descend(path, directory) {
                return Some(Err(e));
            }
        }

        loop {
            let frame = self.stack.last_mut()?;
            let record = match frame.entries.next() {
                None => {
                    self.stack.pop();
                    continue;
                }
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(record)) if record.is_self_or_parent() => continue,
                Some(Ok(record)) => record,
            };

            let name = record.display_name(self.strip_version);
            let path = if frame.path.ends_with('/') {
                format!("{}{}", frame.path, name)
            } else {
                format!("{}/{}", frame.path, name)
            };
            let level = self.stack.len();

            if record.is_directory() {
                self.pending = Some((path.clone(), record.clone()));
            }

            return Some(Ok(WalkEntry { path, level, record }));
        }
    }
}
