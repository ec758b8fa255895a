//! In-memory ISO 9660 image builder for tests
//!
//! Layout of a built image (cooked sectors):
//!
//! ```text
//! 0..16   system area (zero)
//! 16      primary volume descriptor
//! 17      descriptor set terminator
//! 18      L path table
//! 19      M path table
//! 20..    directory extents (breadth-first), then file data
//! ```

use crate::geometry::CD_SYNC_PATTERN;
use crate::record::{DirectoryRecord, Extent};

pub(crate) const SS: usize = 2048;

/// Recording date stamped on every record: 1996-03-14 09:30:00 UTC
pub(crate) const RECORDING_DATE: [u8; 7] = [96, 3, 14, 9, 30, 0, 0];

const FIRST_DIRECTORY_SECTOR: u32 = 20;

/// Encode one directory record
pub(crate) fn record_bytes(identifier: &[u8], extent: u32, length: u32, flags: u8) -> Vec<u8> {
    let mut len = 33 + identifier.len();
    if len % 2 == 1 {
        len += 1;
    }

    let mut bytes = vec![0u8; len];
    bytes[0] = len as u8;
    bytes[2..6].copy_from_slice(&extent.to_le_bytes());
    bytes[6..10].copy_from_slice(&extent.to_be_bytes());
    bytes[10..14].copy_from_slice(&length.to_le_bytes());
    bytes[14..18].copy_from_slice(&length.to_be_bytes());
    bytes[18..25].copy_from_slice(&RECORDING_DATE);
    bytes[25] = flags;
    bytes[28..30].copy_from_slice(&1u16.to_le_bytes());
    bytes[30..32].copy_from_slice(&1u16.to_be_bytes());
    bytes[32] = identifier.len() as u8;
    bytes[33..33 + identifier.len()].copy_from_slice(identifier);
    bytes
}

#[derive(Clone)]
enum Kind {
    Dir {
        flags: u8,
    },
    File {
        data: Vec<u8>,
        flags: u8,
        first_extent: Option<usize>,
    },
}

#[derive(Clone)]
struct Node {
    segments: Vec<String>,
    kind: Kind,
}

struct DirPlan {
    /// Index into `nodes`, `None` for the root
    node: Option<usize>,
    parent: usize,
    sector: u32,
    length: u32,
    children: Vec<usize>,
}

struct Layout {
    dirs: Vec<DirPlan>,
    /// Directory plan index per directory node
    dir_of_node: Vec<Option<usize>>,
    /// Data extents per file node
    file_extents: Vec<Vec<Extent>>,
    total_sectors: u32,
}

/// Builds small, valid ISO 9660 images in memory
#[derive(Clone)]
pub(crate) struct IsoBuilder {
    volume_id: String,
    nodes: Vec<Node>,
    raw_mode: Option<u8>,
}

impl IsoBuilder {
    pub(crate) fn new(volume_id: &str) -> Self {
        Self {
            volume_id: volume_id.to_string(),
            nodes: Vec::new(),
            raw_mode: None,
        }
    }

    fn segments(path: &str) -> Vec<String> {
        path.split('/').filter(|s| !s.is_empty()).map(String::from).collect()
    }

    /// Add a directory; its parent must already exist
    pub(crate) fn dir(self, path: &str) -> Self {
        self.dir_with_flags(path, 0)
    }

    /// Add a directory whose record carries `flags` besides the directory bit
    pub(crate) fn dir_with_flags(mut self, path: &str, flags: u8) -> Self {
        self.nodes.push(Node {
            segments: Self::segments(path),
            kind: Kind::Dir { flags },
        });
        self
    }

    /// Add a file; its parent must already exist
    pub(crate) fn file(self, path: &str, data: Vec<u8>) -> Self {
        self.file_with_flags(path, data, 0)
    }

    pub(crate) fn hidden_file(self, path: &str, data: Vec<u8>) -> Self {
        self.file_with_flags(path, data, DirectoryRecord::FLAG_HIDDEN)
    }

    pub(crate) fn file_with_flags(mut self, path: &str, data: Vec<u8>, flags: u8) -> Self {
        self.nodes.push(Node {
            segments: Self::segments(path),
            kind: Kind::File {
                data,
                flags,
                first_extent: None,
            },
        });
        self
    }

    /// Add a file recorded as two extents, the first `first_extent` bytes long
    pub(crate) fn multi_extent_file(
        mut self,
        path: &str,
        data: Vec<u8>,
        first_extent: usize,
    ) -> Self {
        assert_eq!(first_extent % SS, 0);
        assert!(first_extent < data.len());
        self.nodes.push(Node {
            segments: Self::segments(path),
            kind: Kind::File {
                data,
                flags: 0,
                first_extent: Some(first_extent),
            },
        });
        self
    }

    /// Emit raw 2352-byte sectors of the given mode (1 or 2)
    pub(crate) fn raw(mut self, mode: u8) -> Self {
        self.raw_mode = Some(mode);
        self
    }

    fn identifier(node: &Node) -> Vec<u8> {
        let name = node.segments.last().cloned().unwrap_or_default();
        match node.kind {
            Kind::Dir { .. } => name.into_bytes(),
            Kind::File { .. } => format!("{};1", name).into_bytes(),
        }
    }

    /// Records of a directory in order: ".", "..", then children
    fn directory_records(&self, layout: &Layout, dir: usize) -> Vec<Vec<u8>> {
        let plan = &layout.dirs[dir];
        let parent = &layout.dirs[plan.parent];
        let flags = DirectoryRecord::FLAG_DIRECTORY;

        let mut records = vec![
            record_bytes(&[0x00], plan.sector, plan.length, flags),
            record_bytes(&[0x01], parent.sector, parent.length, flags),
        ];

        for &child in &plan.children {
            let node = &self.nodes[child];
            let identifier = Self::identifier(node);
            match &node.kind {
                Kind::Dir { flags: extra } => {
                    let sub = &layout.dirs[layout.dir_of_node[child].unwrap_or(0)];
                    records.push(record_bytes(&identifier, sub.sector, sub.length, flags | extra));
                }
                Kind::File { flags, .. } => {
                    let extents = &layout.file_extents[child];
                    for (i, extent) in extents.iter().enumerate() {
                        let mut record_flags = *flags;
                        if i + 1 < extents.len() {
                            record_flags |= DirectoryRecord::FLAG_NOT_FINAL;
                        }
                        records.push(record_bytes(
                            &identifier,
                            extent.location,
                            extent.length,
                            record_flags,
                        ));
                    }
                }
            }
        }

        records
    }

    /// Number of sectors a list of records occupies when none may cross a sector
    fn sectors_for(records: &[Vec<u8>]) -> u32 {
        let mut sectors = 1;
        let mut pos = 0;
        for record in records {
            if pos + record.len() > SS {
                sectors += 1;
                pos = 0;
            }
            pos += record.len();
        }
        sectors
    }

    fn layout(&self) -> Layout {
        let mut dirs = vec![DirPlan {
            node: None,
            parent: 0,
            sector: 0,
            length: 0,
            children: Vec::new(),
        }];
        let mut dir_of_node = vec![None; self.nodes.len()];

        // Breadth-first, so parents precede children as the path table requires
        let mut i = 0;
        while i < dirs.len() {
            let prefix: Vec<String> = match dirs[i].node {
                Some(n) => self.nodes[n].segments.clone(),
                None => Vec::new(),
            };
            for (n, node) in self.nodes.iter().enumerate() {
                if node.segments.len() == prefix.len() + 1 && node.segments.starts_with(&prefix) {
                    dirs[i].children.push(n);
                    if let Kind::Dir { .. } = node.kind {
                        dir_of_node[n] = Some(dirs.len());
                        dirs.push(DirPlan {
                            node: Some(n),
                            parent: i,
                            sector: 0,
                            length: 0,
                            children: Vec::new(),
                        });
                    }
                }
            }
            i += 1;
        }

        // Files first get provisional extents so record sizes are known
        let mut file_extents = vec![Vec::new(); self.nodes.len()];
        for (n, node) in self.nodes.iter().enumerate() {
            if let Kind::File { data, first_extent, .. } = &node.kind {
                file_extents[n] = match first_extent {
                    Some(first) => vec![
                        Extent { location: 0, length: *first as u32 },
                        Extent { location: 0, length: (data.len() - first) as u32 },
                    ],
                    None => vec![Extent { location: 0, length: data.len() as u32 }],
                };
            }
        }

        let mut layout = Layout {
            dirs,
            dir_of_node,
            file_extents,
            total_sectors: 0,
        };

        let mut next = FIRST_DIRECTORY_SECTOR;
        for d in 0..layout.dirs.len() {
            let sectors = Self::sectors_for(&self.directory_records(&layout, d));
            layout.dirs[d].sector = next;
            layout.dirs[d].length = sectors * SS as u32;
            next += sectors;
        }

        for extents in layout.file_extents.iter_mut() {
            for extent in extents.iter_mut() {
                if extent.length == 0 {
                    continue;
                }
                extent.location = next;
                next += (extent.length as usize).div_ceil(SS) as u32;
            }
        }

        layout.total_sectors = next;
        layout
    }

    /// Extent of the root directory in the built image
    pub(crate) fn root_extent(&self) -> Extent {
        let layout = self.layout();
        Extent {
            location: layout.dirs[0].sector,
            length: layout.dirs[0].length,
        }
    }

    /// Data location of the file at `path`
    pub(crate) fn file_location(&self, path: &str) -> u32 {
        let segments = Self::segments(path);
        let layout = self.layout();
        let n = self
            .nodes
            .iter()
            .position(|node| node.segments == segments)
            .unwrap_or_else(|| panic!("no such file {}", path));
        layout.file_extents[n][0].location
    }

    /// Build the image as cooked sectors, converted to raw if requested
    pub(crate) fn build(&self) -> Vec<u8> {
        let layout = self.layout();
        let total = layout.total_sectors;
        let mut iso = vec![0u8; total as usize * SS];

        self.write_primary_descriptor(&mut iso, &layout);

        // Sector 17: Volume Descriptor Set Terminator
        let term = 17 * SS;
        iso[term] = 255;
        iso[term + 1..term + 6].copy_from_slice(b"CD001");
        iso[term + 6] = 1;

        self.write_path_tables(&mut iso, &layout);

        for d in 0..layout.dirs.len() {
            let mut pos = layout.dirs[d].sector as usize * SS;
            let mut used = 0;
            for record in self.directory_records(&layout, d) {
                if used + record.len() > SS {
                    pos += SS - used;
                    used = 0;
                }
                iso[pos..pos + record.len()].copy_from_slice(&record);
                pos += record.len();
                used += record.len();
            }
        }

        for (n, node) in self.nodes.iter().enumerate() {
            if let Kind::File { data, .. } = &node.kind {
                let mut consumed = 0;
                for extent in &layout.file_extents[n] {
                    let len = extent.length as usize;
                    let start = extent.location as usize * SS;
                    iso[start..start + len].copy_from_slice(&data[consumed..consumed + len]);
                    consumed += len;
                }
            }
        }

        match self.raw_mode {
            Some(mode) => to_raw(&iso, mode),
            None => iso,
        }
    }

    fn path_table_entries(&self, layout: &Layout) -> Vec<(Vec<u8>, u32, u16)> {
        layout
            .dirs
            .iter()
            .map(|plan| {
                let identifier = match plan.node {
                    Some(n) => Self::identifier(&self.nodes[n]),
                    None => vec![0x00],
                };
                (identifier, plan.sector, plan.parent as u16 + 1)
            })
            .collect()
    }

    fn path_table_size(&self, layout: &Layout) -> usize {
        self.path_table_entries(layout)
            .iter()
            .map(|(id, _, _)| 8 + id.len() + id.len() % 2)
            .sum()
    }

    fn write_path_tables(&self, iso: &mut [u8], layout: &Layout) {
        let mut l_pos = 18 * SS;
        let mut m_pos = 19 * SS;
        for (identifier, extent, parent) in self.path_table_entries(layout) {
            for (pos, big) in [(&mut l_pos, false), (&mut m_pos, true)] {
                iso[*pos] = identifier.len() as u8;
                let (extent_bytes, parent_bytes) = if big {
                    (extent.to_be_bytes(), parent.to_be_bytes())
                } else {
                    (extent.to_le_bytes(), parent.to_le_bytes())
                };
                iso[*pos + 2..*pos + 6].copy_from_slice(&extent_bytes);
                iso[*pos + 6..*pos + 8].copy_from_slice(&parent_bytes);
                iso[*pos + 8..*pos + 8 + identifier.len()].copy_from_slice(&identifier);
                *pos += 8 + identifier.len() + identifier.len() % 2;
            }
        }
    }

    fn write_primary_descriptor(&self, iso: &mut [u8], layout: &Layout) {
        let pvd = 16 * SS;
        let total = layout.total_sectors;

        iso[pvd] = 1;
        iso[pvd + 1..pvd + 6].copy_from_slice(b"CD001");
        iso[pvd + 6] = 1;

        let mut system_id = [b' '; 32];
        system_id[..5].copy_from_slice(b"LINUX");
        iso[pvd + 8..pvd + 40].copy_from_slice(&system_id);

        let mut volume_id = [b' '; 32];
        volume_id[..self.volume_id.len()].copy_from_slice(self.volume_id.as_bytes());
        iso[pvd + 40..pvd + 72].copy_from_slice(&volume_id);

        iso[pvd + 80..pvd + 84].copy_from_slice(&total.to_le_bytes());
        iso[pvd + 84..pvd + 88].copy_from_slice(&total.to_be_bytes());
        iso[pvd + 120..pvd + 122].copy_from_slice(&1u16.to_le_bytes());
        iso[pvd + 122..pvd + 124].copy_from_slice(&1u16.to_be_bytes());
        iso[pvd + 124..pvd + 126].copy_from_slice(&1u16.to_le_bytes());
        iso[pvd + 126..pvd + 128].copy_from_slice(&1u16.to_be_bytes());
        iso[pvd + 128..pvd + 130].copy_from_slice(&2048u16.to_le_bytes());
        iso[pvd + 130..pvd + 132].copy_from_slice(&2048u16.to_be_bytes());

        let table_size = self.path_table_size(layout) as u32;
        iso[pvd + 132..pvd + 136].copy_from_slice(&table_size.to_le_bytes());
        iso[pvd + 136..pvd + 140].copy_from_slice(&table_size.to_be_bytes());
        iso[pvd + 140..pvd + 144].copy_from_slice(&18u32.to_le_bytes());
        iso[pvd + 148..pvd + 152].copy_from_slice(&19u32.to_be_bytes());

        let root = &layout.dirs[0];
        let root_record =
            record_bytes(&[0x00], root.sector, root.length, DirectoryRecord::FLAG_DIRECTORY);
        iso[pvd + 156..pvd + 190].copy_from_slice(&root_record);

        // Creation date set, the other three left "not specified"
        iso[pvd + 813..pvd + 829].copy_from_slice(b"1996031409300000");
        for offset in [830, 847, 864] {
            iso[pvd + offset..pvd + offset + 16].fill(b'0');
        }

        iso[pvd + 881] = 1;
    }
}

/// Wrap cooked sectors into raw 2352-byte sectors
fn to_raw(cooked: &[u8], mode: u8) -> Vec<u8> {
    let data_offset = if mode == 1 { 16 } else { 24 };
    let mut raw = Vec::with_capacity(cooked.len() / SS * 2352);

    for (i, sector) in cooked.chunks(SS).enumerate() {
        let mut out = [0u8; 2352];
        out[..12].copy_from_slice(&CD_SYNC_PATTERN);

        // Header address in BCD minute/second/frame, offset by the 2 second pregap
        let lba = i + 150;
        let bcd = |v: usize| (((v / 10) << 4) | (v % 10)) as u8;
        out[12] = bcd(lba / (60 * 75));
        out[13] = bcd((lba / 75) % 60);
        out[14] = bcd(lba % 75);
        out[15] = mode;
        if mode == 2 {
            out[18] = 0x08;
            out[22] = 0x08;
        }

        out[data_offset..data_offset + SS].copy_from_slice(sector);
        raw.extend_from_slice(&out);
    }

    raw
}
