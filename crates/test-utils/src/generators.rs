//! Generators for synthetic property grids.
//!
//! Values are produced in natural order, indexed by node `(x, y, k)` with `k`
//! counting layers from the surface. Fixtures reorder them into whatever
//! layout the model files use.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Creates a volume whose values encode their node position.
///
/// Each node value is `x * 1_000_000 + y * 1000 + k`, so a wrong axis order
/// or flipped depth direction shows up immediately in the value read back.
///
/// # Returns
///
/// A `Vec<f64>` in natural order: x fastest, then y, then k.
///
/// # Example
///
/// ```
/// use test_utils::create_test_volume;
///
/// let volume = create_test_volume(3, 2, 2);
/// assert_eq!(volume.len(), 12);
/// assert_eq!(volume[1], 1_000_000.0);  // x=1, y=0, k=0
/// assert_eq!(volume[3], 1000.0);       // x=0, y=1, k=0
/// assert_eq!(volume[6], 1.0);          // x=0, y=0, k=1
/// ```
pub fn create_test_volume(nx: usize, ny: usize, nz: usize) -> Vec<f64> {
    create_volume(nx, ny, nz, node_code)
}

/// The value [`create_test_volume`] stores at node `(x, y, k)`.
pub fn node_code(x: usize, y: usize, k: usize) -> f64 {
    (x * 1_000_000 + y * 1000 + k) as f64
}

/// Creates a volume in natural order from a function of the node indices.
pub fn create_volume(
    nx: usize,
    ny: usize,
    nz: usize,
    f: impl Fn(usize, usize, usize) -> f64,
) -> Vec<f64> {
    let mut data = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                data.push(f(x, y, k));
            }
        }
    }
    data
}

/// A velocity-like field increasing linearly with node position.
///
/// Values are `base + dx * x + dy * y + dk * k`. Trilinear interpolation
/// reproduces such a field exactly, which makes expected query results easy
/// to compute.
pub fn linear_field(
    base: f64,
    dx: f64,
    dy: f64,
    dk: f64,
) -> impl Fn(usize, usize, usize) -> f64 + Clone {
    move |x, y, k| base + dx * x as f64 + dy * y as f64 + dk * k as f64
}

/// Writes values as a flat little-endian array of f64, or of f32 when
/// `single_precision` is set.
pub fn write_grid(path: &Path, values: &[f64], single_precision: bool) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for &v in values {
        if single_precision {
            out.write_all(&(v as f32).to_le_bytes())?;
        } else {
            out.write_all(&v.to_le_bytes())?;
        }
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_volume_encoding() {
        let volume = create_test_volume(4, 3, 2);
        assert_eq!(volume.len(), 24);
        // x=3, y=2, k=1 is the last element
        assert_eq!(volume[23], 3_002_001.0);
    }

    #[test]
    fn test_linear_field() {
        let f = linear_field(1000.0, 10.0, 20.0, 500.0);
        assert_eq!(f(0, 0, 0), 1000.0);
        assert_eq!(f(1, 2, 3), 1000.0 + 10.0 + 40.0 + 1500.0);
    }

    #[test]
    fn test_write_grid_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let values = create_test_volume(2, 2, 2);

        let double = dir.path().join("double.dat");
        write_grid(&double, &values, false).unwrap();
        assert_eq!(std::fs::metadata(&double).unwrap().len(), 64);

        let single = dir.path().join("single.dat");
        write_grid(&single, &values, true).unwrap();
        let bytes = std::fs::read(&single).unwrap();
        assert_eq!(bytes.len(), 32);
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[4..8]);
        assert_eq!(f32::from_le_bytes(raw), 1_000_000.0);
    }
}
