//! Storage of the gridded material properties.
//!
//! Each property grid is loaded into memory when possible. If the allocation
//! fails or the configured memory cap would be exceeded, that property alone
//! is read from disk on every fetch.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ModelConfig, SampleFormat};
use crate::error::{ModelError, QueryError, Result};
use crate::mapper::GridLayout;
use crate::types::{Property, PropertyRecord, SENTINEL};

/// Where a property's values are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Residency {
    Absent,
    OnDisk,
    InMemory,
}

/// A grid file read one record at a time.
///
/// Reads are positional and never move a shared cursor, so parallel queries
/// fetch from the same handle without locking.
#[derive(Debug)]
pub struct DiskGrid {
    file: File,
    format: SampleFormat,
    path: PathBuf,
}

impl DiskGrid {
    fn read(&self, offset: usize) -> std::io::Result<f64> {
        let size = self.format.record_size();
        let mut buf = [0u8; 8];
        read_exact_at(&self.file, &mut buf[..size], offset as u64 * size as u64)?;
        Ok(self.format.decode(&buf[..size]))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fill `buf` from `position` without moving the file cursor.
#[cfg(unix)]
pub(crate) fn read_exact_at(file: &File, buf: &mut [u8], position: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, position)
}

#[cfg(windows)]
pub(crate) fn read_exact_at(file: &File, mut buf: &mut [u8], mut position: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, position)? {
            0 => return Err(std::io::ErrorKind::UnexpectedEof.into()),
            n => {
                buf = &mut buf[n..];
                position += n as u64;
            }
        }
    }
    Ok(())
}

/// Storage state of one property grid. Fixed once the model is opened.
#[derive(Debug)]
pub enum PropertyGrid {
    Absent,
    OnDisk(DiskGrid),
    InMemory(Vec<f64>),
}

impl PropertyGrid {
    pub fn residency(&self) -> Residency {
        match self {
            Self::Absent => Residency::Absent,
            Self::OnDisk(_) => Residency::OnDisk,
            Self::InMemory(_) => Residency::InMemory,
        }
    }
}

/// The five property grids of a model.
#[derive(Debug)]
pub struct GridBackend {
    layout: GridLayout,
    grids: [PropertyGrid; 5],
}

impl GridBackend {
    /// Open every property grid named by `config` in `model_dir`.
    pub fn open(model_dir: &Path, config: &ModelConfig) -> Result<Self> {
        let layout = GridLayout::from_config(config);
        let expected_len = config.grid_file_len();
        let mut budget = config.max_resident_mb.map(|mb| mb * 1024 * 1024);

        let mut grids = [
            PropertyGrid::Absent,
            PropertyGrid::Absent,
            PropertyGrid::Absent,
            PropertyGrid::Absent,
            PropertyGrid::Absent,
        ];

        for property in Property::ALL {
            let path = model_dir.join(file_name(config, property));
            if !path.is_file() {
                if property.is_required() {
                    return Err(ModelError::MissingGrid { property, path });
                }
                debug!(property = %property, path = %path.display(), "Property grid absent");
                continue;
            }

            let found = std::fs::metadata(&path)
                .map_err(|source| ModelError::GridFile {
                    property,
                    path: path.clone(),
                    source,
                })?
                .len();
            if found != expected_len {
                return Err(ModelError::GridSize {
                    property,
                    path,
                    expected: expected_len,
                    found,
                });
            }

            grids[property.index()] =
                load_property(property, &path, config.sample_format, layout.len(), &mut budget)?;
        }

        Ok(Self { layout, grids })
    }

    /// Build a backend from values already in memory, in file order.
    /// `None` marks an absent property.
    pub fn from_values(layout: GridLayout, values: [Option<Vec<f64>>; 5]) -> Self {
        let grids = values.map(|v| match v {
            Some(values) => {
                debug_assert_eq!(values.len(), layout.len());
                PropertyGrid::InMemory(values)
            }
            None => PropertyGrid::Absent,
        });
        Self { layout, grids }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn residency(&self, property: Property) -> Residency {
        self.grids[property.index()].residency()
    }

    /// Value of `property` at node `(x, y, k)`, `k` counting from the surface.
    /// Returns `None` when the property has no grid.
    pub fn fetch(
        &self,
        property: Property,
        x: usize,
        y: usize,
        k: usize,
    ) -> std::result::Result<Option<f64>, QueryError> {
        let offset = self.layout.offset(x, y, k);
        match &self.grids[property.index()] {
            PropertyGrid::Absent => Ok(None),
            PropertyGrid::InMemory(values) => Ok(Some(values[offset])),
            PropertyGrid::OnDisk(grid) => grid
                .read(offset)
                .map(Some)
                .map_err(|source| QueryError::Io { property, source }),
        }
    }

    /// All five properties at one node. Absent properties are the sentinel.
    pub fn node(&self, x: usize, y: usize, k: usize) -> std::result::Result<PropertyRecord, QueryError> {
        let mut record = PropertyRecord::SENTINEL;
        for property in Property::ALL {
            record.set(property, self.fetch(property, x, y, k)?.unwrap_or(SENTINEL));
        }
        Ok(record)
    }
}

fn file_name(config: &ModelConfig, property: Property) -> &str {
    match property {
        Property::Vp => &config.files.vp,
        Property::Vs => &config.files.vs,
        Property::Rho => &config.files.rho,
        Property::Qp => &config.files.qp,
        Property::Qs => &config.files.qs,
    }
}

fn load_property(
    property: Property,
    path: &Path,
    format: SampleFormat,
    len: usize,
    budget: &mut Option<u64>,
) -> Result<PropertyGrid> {
    let file_error = |source| ModelError::GridFile {
        property,
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(file_error)?;
    let resident_bytes = (len * std::mem::size_of::<f64>()) as u64;

    let on_disk = |file: File| {
        PropertyGrid::OnDisk(DiskGrid {
            file,
            format,
            path: path.to_path_buf(),
        })
    };

    if let Some(remaining) = *budget {
        if resident_bytes > remaining {
            warn!(
                property = %property,
                required_bytes = resident_bytes,
                remaining_bytes = remaining,
                "Memory cap reached, reading property from disk"
            );
            return Ok(on_disk(file));
        }
    }

    let mut values: Vec<f64> = Vec::new();
    if values.try_reserve_exact(len).is_err() {
        warn!(
            property = %property,
            required_bytes = resident_bytes,
            "Allocation failed, reading property from disk"
        );
        return Ok(on_disk(file));
    }

    let size = format.record_size();
    let mut reader = BufReader::with_capacity(1 << 16, file);
    let mut chunk = vec![0u8; size * 8192];
    let mut remaining = len;
    while remaining > 0 {
        let count = remaining.min(8192);
        let bytes = &mut chunk[..count * size];
        reader.read_exact(bytes).map_err(file_error)?;
        values.extend(bytes.chunks_exact(size).map(|raw| format.decode(raw)));
        remaining -= count;
    }

    if let Some(remaining) = budget.as_mut() {
        *remaining -= resident_bytes;
    }
    debug!(
        property = %property,
        path = %path.display(),
        records = len,
        "Loaded property grid into memory"
    );
    Ok(PropertyGrid::InMemory(values))
}
