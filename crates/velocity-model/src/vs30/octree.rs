//! Storage of Vs30 leaves addressed like an octree.
//!
//! Addresses are integer tick coordinates at a given level. A leaf at level
//! `l` spans `2^(MAX_LEVEL - l)` ticks per axis, and a search returns the leaf
//! that contains the address, whatever its level.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::metadata::{LeafAddressing, Vs30MapConfig};
use crate::backend::read_exact_at;
use crate::error::Vs30Error;

/// Deepest octree level; one tick is a leaf at this level.
pub const MAX_LEVEL: u8 = 31;

/// Magic bytes at the start of a leaf grid file.
pub const LEAF_GRID_MAGIC: &[u8; 8] = b"VS30LEAF";

/// Bytes per stored payload (two little-endian f32).
const PAYLOAD_SIZE: u64 = 8;

/// Magic plus the metadata length word.
const HEADER_SIZE: u64 = 12;

/// An octree address in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OctreeAddress {
    pub x: u64,
    pub y: u64,
    pub z: u64,
    pub level: u8,
}

impl OctreeAddress {
    /// The address of the level-`level` octant containing this address.
    pub fn ancestor(&self, level: u8) -> Self {
        let size = 1u64 << (MAX_LEVEL - level);
        Self {
            x: self.x - self.x % size,
            y: self.y - self.y % size,
            z: self.z - self.z % size,
            level,
        }
    }
}

/// Value stored at each Vs30 leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vs30Payload {
    /// Surface elevation (metres)
    pub surface: f32,
    /// Time-averaged shear velocity in the top 30 m (m/s)
    pub vs30: f32,
}

/// Read access to a store of Vs30 leaves.
pub trait OctreeStore: Send + Sync {
    /// The application metadata string describing the map.
    fn app_meta(&self) -> &str;

    /// The payload of the leaf containing `addr`.
    fn search(&self, addr: OctreeAddress) -> Result<Vs30Payload, Vs30Error>;
}

/// An in-memory octree keyed by leaf address.
#[derive(Debug, Clone, Default)]
pub struct MemoryOctree {
    meta: String,
    leaves: HashMap<OctreeAddress, Vs30Payload>,
}

impl MemoryOctree {
    pub fn new(meta: impl Into<String>) -> Self {
        Self {
            meta: meta.into(),
            leaves: HashMap::new(),
        }
    }

    /// Fill every leaf of the map's leaf level from `f(cell_x, cell_y)`.
    pub fn from_fn(
        meta: impl Into<String>,
        mut f: impl FnMut(u64, u64) -> Vs30Payload,
    ) -> Result<Self, Vs30Error> {
        let mut octree = Self::new(meta);
        let map: Vs30MapConfig = octree.meta.parse()?;
        let leaf = LeafAddressing::new(&map)?;
        let (cells_x, cells_y) = leaf.cells();
        for cy in 0..cells_y {
            for cx in 0..cells_x {
                octree.insert(
                    OctreeAddress {
                        x: cx * leaf.leaf_ticks,
                        y: cy * leaf.leaf_ticks,
                        z: 0,
                        level: leaf.level,
                    },
                    f(cx, cy),
                );
            }
        }
        Ok(octree)
    }

    /// Store a leaf. The address is aligned to its level.
    pub fn insert(&mut self, addr: OctreeAddress, payload: Vs30Payload) {
        self.leaves.insert(addr.ancestor(addr.level), payload);
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

impl OctreeStore for MemoryOctree {
    fn app_meta(&self) -> &str {
        &self.meta
    }

    fn search(&self, addr: OctreeAddress) -> Result<Vs30Payload, Vs30Error> {
        (0..=addr.level.min(MAX_LEVEL))
            .rev()
            .find_map(|level| self.leaves.get(&addr.ancestor(level)).copied())
            .ok_or(Vs30Error::AddressOutOfRange(addr))
    }
}

/// A Vs30 map stored as a dense grid of leaves.
///
/// Layout: the magic `VS30LEAF`, the metadata length as u32 LE, the metadata
/// bytes, then one `(surface f32, vs30 f32)` LE payload per leaf with x
/// varying fastest.
#[derive(Debug)]
pub struct LeafGridFile {
    meta: String,
    leaf: LeafAddressing,
    cells: (u64, u64),
    data_start: u64,
    file: File,
    path: PathBuf,
}

/// Leaves in a `cells_x` by `cells_y` grid, or an error when the count does
/// not fit in a u64.
fn leaf_count((cells_x, cells_y): (u64, u64)) -> Result<u64, Vs30Error> {
    cells_x
        .checked_mul(cells_y)
        .ok_or_else(|| Vs30Error::InvalidField {
            field: "ticks",
            value: format!("{} x {} leaves", cells_x, cells_y),
        })
}

impl LeafGridFile {
    pub fn open(path: &Path) -> Result<Self, Vs30Error> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)
            .map_err(|_| Vs30Error::BadMagic(path.to_path_buf()))?;
        if &magic != LEAF_GRID_MAGIC {
            return Err(Vs30Error::BadMagic(path.to_path_buf()));
        }

        let mut len = [0u8; 4];
        file.read_exact(&mut len)?;
        let meta_len = u32::from_le_bytes(len);
        let file_len = file.metadata()?.len();
        let data_start = HEADER_SIZE + meta_len as u64;
        if data_start > file_len {
            return Err(Vs30Error::InvalidField {
                field: "metadata",
                value: format!("{} bytes claimed, file is {} bytes", meta_len, file_len),
            });
        }

        let mut meta = vec![0u8; meta_len as usize];
        file.read_exact(&mut meta)?;
        let meta = String::from_utf8(meta).map_err(|e| Vs30Error::InvalidField {
            field: "metadata",
            value: e.to_string(),
        })?;

        let map: Vs30MapConfig = meta.parse()?;
        let leaf = LeafAddressing::new(&map)?;
        let cells = leaf.cells();

        let expected = leaf_count(cells)?;
        let found = (file_len - data_start) / PAYLOAD_SIZE;
        let expected_len = expected
            .checked_mul(PAYLOAD_SIZE)
            .and_then(|bytes| bytes.checked_add(data_start));
        if expected_len != Some(file_len) {
            return Err(Vs30Error::PayloadCount { expected, found });
        }

        debug!(
            path = %path.display(),
            level = leaf.level,
            cells_x = cells.0,
            cells_y = cells.1,
            "Opened Vs30 leaf grid"
        );

        Ok(Self {
            meta,
            leaf,
            cells,
            data_start,
            file,
            path: path.to_path_buf(),
        })
    }

    /// Write a leaf grid file. `payloads` holds every leaf, x fastest.
    pub fn create(path: &Path, meta: &str, payloads: &[Vs30Payload]) -> Result<(), Vs30Error> {
        let map: Vs30MapConfig = meta.parse()?;
        let expected = leaf_count(LeafAddressing::new(&map)?.cells())?;
        if payloads.len() as u64 != expected {
            return Err(Vs30Error::PayloadCount {
                expected,
                found: payloads.len() as u64,
            });
        }
        let meta_len = u32::try_from(meta.len()).map_err(|_| Vs30Error::InvalidField {
            field: "metadata",
            value: format!("{} bytes", meta.len()),
        })?;

        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(LEAF_GRID_MAGIC)?;
        out.write_all(&meta_len.to_le_bytes())?;
        out.write_all(meta.as_bytes())?;
        for payload in payloads {
            out.write_all(&payload.surface.to_le_bytes())?;
            out.write_all(&payload.vs30.to_le_bytes())?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OctreeStore for LeafGridFile {
    fn app_meta(&self) -> &str {
        &self.meta
    }

    fn search(&self, addr: OctreeAddress) -> Result<Vs30Payload, Vs30Error> {
        let cell_x = addr.x / self.leaf.leaf_ticks;
        let cell_y = addr.y / self.leaf.leaf_ticks;
        if addr.level < self.leaf.level
            || addr.z >= self.leaf.leaf_ticks
            || cell_x >= self.cells.0
            || cell_y >= self.cells.1
        {
            return Err(Vs30Error::AddressOutOfRange(addr));
        }

        let offset = self.data_start + (cell_y * self.cells.0 + cell_x) * PAYLOAD_SIZE;
        let mut buf = [0u8; 8];
        read_exact_at(&self.file, &mut buf, offset)?;

        let mut surface = [0u8; 4];
        let mut vs30 = [0u8; 4];
        surface.copy_from_slice(&buf[..4]);
        vs30.copy_from_slice(&buf[4..]);
        Ok(Vs30Payload {
            surface: f32::from_le_bytes(surface),
            vs30: f32::from_le_bytes(vs30),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: &str = "vs30|Test surface|tester|2026-10-18|100.0|vs30-surf|\
+proj=aeqd +lat_0=34.0 +lon_0=-118.0 +ellps=WGS84|-118.0,34.0,0.0|0.0|800.0,400.0,0.0|\
2147483648,1073741824,0";

    fn payload(cx: u64, cy: u64) -> Vs30Payload {
        Vs30Payload {
            surface: cy as f32,
            vs30: 200.0 + 10.0 * cx as f32 + 100.0 * cy as f32,
        }
    }

    fn leaf_addr(cx: u64, cy: u64) -> OctreeAddress {
        // 800 m / 100 m -> level 3, leaves of 2^28 ticks.
        OctreeAddress {
            x: cx << 28,
            y: cy << 28,
            z: 0,
            level: MAX_LEVEL,
        }
    }

    #[test]
    fn test_ancestor_alignment() {
        let addr = OctreeAddress {
            x: (5 << 28) + 12345,
            y: 3 << 28,
            z: 7,
            level: MAX_LEVEL,
        };
        let parent = addr.ancestor(3);
        assert_eq!((parent.x, parent.y, parent.z), (5 << 28, 3 << 28, 0));
        assert_eq!(parent.level, 3);
    }

    #[test]
    fn test_memory_octree_finds_containing_leaf() {
        let octree = MemoryOctree::from_fn(META, payload).unwrap();
        assert_eq!(octree.len(), 8 * 4);
        assert_eq!(octree.app_meta(), META);

        let found = octree.search(leaf_addr(3, 2)).unwrap();
        assert_eq!(found, payload(3, 2));

        // Any tick inside a leaf resolves to that leaf.
        let mut inside = leaf_addr(3, 2);
        inside.x += 1000;
        inside.y += (1 << 28) - 1;
        assert_eq!(octree.search(inside).unwrap(), payload(3, 2));
    }

    #[test]
    fn test_memory_octree_missing_leaf() {
        let mut octree = MemoryOctree::new(META);
        octree.insert(leaf_addr(0, 0).ancestor(3), payload(0, 0));
        assert!(octree.search(leaf_addr(0, 0)).is_ok());
        assert!(matches!(
            octree.search(leaf_addr(1, 0)),
            Err(Vs30Error::AddressOutOfRange(_))
        ));
    }

    #[test]
    fn test_memory_octree_coarse_leaf_covers_children() {
        let mut octree = MemoryOctree::new(META);
        let coarse = OctreeAddress {
            x: 0,
            y: 0,
            z: 0,
            level: 1,
        };
        octree.insert(coarse, payload(9, 9));
        assert_eq!(octree.search(leaf_addr(3, 2)).unwrap(), payload(9, 9));
    }

    #[test]
    fn test_leaf_grid_file_matches_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vs30.leaf");
        let payloads: Vec<Vs30Payload> = (0..4u64)
            .flat_map(|cy| (0..8u64).map(move |cx| payload(cx, cy)))
            .collect();
        LeafGridFile::create(&path, META, &payloads).unwrap();

        let file = LeafGridFile::open(&path).unwrap();
        let memory = MemoryOctree::from_fn(META, payload).unwrap();
        assert_eq!(file.app_meta(), META);
        for cy in 0..4 {
            for cx in 0..8 {
                assert_eq!(
                    file.search(leaf_addr(cx, cy)).unwrap(),
                    memory.search(leaf_addr(cx, cy)).unwrap()
                );
            }
        }
        assert!(file.search(leaf_addr(8, 0)).is_err());
        assert!(file.search(leaf_addr(0, 4)).is_err());
    }

    #[test]
    fn test_leaf_grid_file_format_errors() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("bad_magic.leaf");
        std::fs::write(&path, b"NOTALEAFFILE").unwrap();
        assert!(matches!(
            LeafGridFile::open(&path),
            Err(Vs30Error::BadMagic(_))
        ));

        let path = dir.path().join("short.leaf");
        let mut bytes = LEAF_GRID_MAGIC.to_vec();
        bytes.extend_from_slice(&(META.len() as u32).to_le_bytes());
        bytes.extend_from_slice(META.as_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            LeafGridFile::open(&path),
            Err(Vs30Error::PayloadCount {
                expected: 32,
                found: 2
            })
        ));

        assert!(LeafGridFile::create(&path, META, &[payload(0, 0)]).is_err());
    }

    #[test]
    fn test_leaf_grid_file_metadata_length_beyond_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge_meta.leaf");
        let mut bytes = LEAF_GRID_MAGIC.to_vec();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(META.as_bytes());
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            LeafGridFile::open(&path),
            Err(Vs30Error::InvalidField {
                field: "metadata",
                ..
            })
        ));
    }

    #[test]
    fn test_leaf_count_overflow_rejected() {
        // 2^31 m at 1 m spacing gives one-tick leaves, so 2^63 ticks per axis overflows.
        let meta = "vs30|Huge|tester|2026-10-18|1.0|vs30-surf|\
+proj=aeqd +lat_0=34.0 +lon_0=-118.0 +ellps=WGS84|-118.0,34.0,0.0|0.0|2147483648.0,2147483648.0,0.0|\
9223372036854775808,9223372036854775808,0";
        assert!(matches!(
            leaf_count((1 << 32, 1 << 32)),
            Err(Vs30Error::InvalidField { field: "ticks", .. })
        ));
        assert_eq!(leaf_count((8, 4)).unwrap(), 32);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.leaf");
        assert!(LeafGridFile::create(&path, meta, &[payload(0, 0)]).is_err());

        let mut bytes = LEAF_GRID_MAGIC.to_vec();
        bytes.extend_from_slice(&(meta.len() as u32).to_le_bytes());
        bytes.extend_from_slice(meta.as_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, bytes).unwrap();
        assert!(LeafGridFile::open(&path).is_err());
    }
}
