//! Synthetic model directories.
//!
//! [`ModelFixture`] writes a configuration file and property grids that a
//! velocity model can be opened from, with the grid values supplied as
//! functions of the node indices.

use std::io::Write;
use std::path::Path;

use crate::generators::{create_volume, write_grid};

/// Common footprints for testing, in UTM zone 11 metres.
pub mod footprint {
    use super::Footprint;

    /// 10 km square, axis-aligned, near downtown Los Angeles
    pub const LA_10KM: Footprint = Footprint {
        origin: (380_000.0, 3_760_000.0),
        width: 10_000.0,
        height: 10_000.0,
        rotation_deg: 0.0,
    };

    /// 20 km x 12 km, bottom edge rotated 30 degrees counter-clockwise
    pub const ROTATED_20X12KM: Footprint = Footprint {
        origin: (400_000.0, 3_700_000.0),
        width: 20_000.0,
        height: 12_000.0,
        rotation_deg: 30.0,
    };
}

/// A rotated rectangle in UTM coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    /// Bottom-left corner (easting, northing)
    pub origin: (f64, f64),
    pub width: f64,
    pub height: f64,
    /// Rotation of the bottom edge from east, counter-clockwise
    pub rotation_deg: f64,
}

impl Footprint {
    /// UTM position of the footprint-local offset `(x, y)`.
    pub fn utm_at(&self, x: f64, y: f64) -> (f64, f64) {
        let (s, c) = self.rotation_deg.to_radians().sin_cos();
        (
            self.origin.0 + x * c - y * s,
            self.origin.1 + x * s + y * c,
        )
    }

    /// Corners in the order bottom-left, bottom-right, top-right, top-left.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            self.utm_at(0.0, 0.0),
            self.utm_at(self.width, 0.0),
            self.utm_at(self.width, self.height),
            self.utm_at(0.0, self.height),
        ]
    }
}

/// Builder for a model directory.
#[derive(Debug, Clone)]
pub struct ModelFixture {
    pub label: String,
    pub utm_zone: u8,
    pub footprint: Footprint,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub depth: f64,
    pub depth_interval: f64,
    pub fast_y: bool,
    pub bottom_up: bool,
    pub single_precision: bool,
    /// (file name, values in natural order)
    grids: Vec<(String, Vec<f64>)>,
    /// Extra configuration lines
    lines: Vec<String>,
}

impl ModelFixture {
    /// A fixture whose depth extent reaches the deepest layer.
    pub fn new(
        label: &str,
        footprint: Footprint,
        (nx, ny, nz): (usize, usize, usize),
        depth_interval: f64,
    ) -> Self {
        Self {
            label: label.to_string(),
            utm_zone: 11,
            footprint,
            nx,
            ny,
            nz,
            depth: (nz.max(2) - 1) as f64 * depth_interval,
            depth_interval,
            fast_y: false,
            bottom_up: false,
            single_precision: false,
            grids: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Add a grid file with values `f(x, y, k)`, `k` counting from the surface.
    pub fn with_grid(mut self, file: &str, f: impl Fn(usize, usize, usize) -> f64) -> Self {
        let values = create_volume(self.nx, self.ny, self.nz, f);
        self.grids.push((file.to_string(), values));
        self
    }

    /// Add a raw configuration line such as `gtl = on`.
    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = depth;
        self
    }

    /// Store grids with y varying fastest.
    pub fn fast_y(mut self) -> Self {
        self.fast_y = true;
        self
    }

    /// Store the deepest layer first.
    pub fn bottom_up(mut self) -> Self {
        self.bottom_up = true;
        self
    }

    /// Store 4-byte samples.
    pub fn single_precision(mut self) -> Self {
        self.single_precision = true;
        self
    }

    /// The `key = value` configuration text.
    pub fn config_text(&self) -> String {
        let [bl, br, tr, tl] = self.footprint.corners();
        let mut text = format!(
            "# Synthetic model '{}'\n\
             utm_zone = {}\n\
             nx = {}\nny = {}\nnz = {}\n\
             depth = {}\ndepth_interval = {}\n\
             top_left_corner_e = {}\ntop_left_corner_n = {}\n\
             top_right_corner_e = {}\ntop_right_corner_n = {}\n\
             bottom_left_corner_e = {}\nbottom_left_corner_n = {}\n\
             bottom_right_corner_e = {}\nbottom_right_corner_n = {}\n\
             seek_axis = {}\nseek_direction = {}\nsample_format = {}\n",
            self.label,
            self.utm_zone,
            self.nx,
            self.ny,
            self.nz,
            self.depth,
            self.depth_interval,
            tl.0,
            tl.1,
            tr.0,
            tr.1,
            bl.0,
            bl.1,
            br.0,
            br.1,
            if self.fast_y { "fast-y" } else { "fast-x" },
            if self.bottom_up { "bottom-up" } else { "top-down" },
            if self.single_precision { "float" } else { "double" },
        );
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    /// Reorder natural-order values into the fixture's file layout.
    pub fn file_order(&self, values: &[f64]) -> Vec<f64> {
        let natural = |x: usize, y: usize, k: usize| values[(k * self.ny + y) * self.nx + x];
        let mut out = Vec::with_capacity(values.len());
        for layer in 0..self.nz {
            let k = if self.bottom_up {
                self.nz - 1 - layer
            } else {
                layer
            };
            if self.fast_y {
                for x in 0..self.nx {
                    for y in 0..self.ny {
                        out.push(natural(x, y, k));
                    }
                }
            } else {
                for y in 0..self.ny {
                    for x in 0..self.nx {
                        out.push(natural(x, y, k));
                    }
                }
            }
        }
        out
    }

    /// Write `<label>.conf` and every grid file into `dir`.
    pub fn write(&self, dir: &Path) -> std::io::Result<()> {
        let mut conf = std::fs::File::create(dir.join(format!("{}.conf", self.label)))?;
        conf.write_all(self.config_text().as_bytes())?;

        for (file, values) in &self.grids {
            write_grid(&dir.join(file), &self.file_order(values), self.single_precision)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{create_test_volume, node_code};

    #[test]
    fn test_footprint_corners() {
        let [bl, br, tr, tl] = footprint::LA_10KM.corners();
        assert_eq!(bl, (380_000.0, 3_760_000.0));
        assert_eq!(br, (390_000.0, 3_760_000.0));
        assert_eq!(tr, (390_000.0, 3_770_000.0));
        assert_eq!(tl, (380_000.0, 3_770_000.0));
    }

    #[test]
    fn test_rotated_footprint_keeps_edge_lengths() {
        let fp = footprint::ROTATED_20X12KM;
        let [bl, br, _, tl] = fp.corners();
        let width = ((br.0 - bl.0).powi(2) + (br.1 - bl.1).powi(2)).sqrt();
        let height = ((tl.0 - bl.0).powi(2) + (tl.1 - bl.1).powi(2)).sqrt();
        assert!((width - 20_000.0).abs() < 1e-6);
        assert!((height - 12_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_file_order_layouts() {
        let fixture = ModelFixture::new("t", footprint::LA_10KM, (3, 2, 2), 100.0);
        let natural = create_test_volume(3, 2, 2);
        assert_eq!(fixture.file_order(&natural), natural);

        let fixture = fixture.fast_y().bottom_up();
        let ordered = fixture.file_order(&natural);
        assert_eq!(ordered[0], node_code(0, 0, 1));
        assert_eq!(ordered[1], node_code(0, 1, 1));
        assert_eq!(ordered[2], node_code(1, 0, 1));
        assert_eq!(ordered[6], node_code(0, 0, 0));
    }

    #[test]
    fn test_write_model_directory() {
        let dir = tempfile::tempdir().unwrap();
        ModelFixture::new("tiny", footprint::LA_10KM, (2, 2, 2), 500.0)
            .with_grid("vp.dat", node_code)
            .with_line("gtl = off")
            .write(dir.path())
            .unwrap();

        let conf = std::fs::read_to_string(dir.path().join("tiny.conf")).unwrap();
        assert!(conf.contains("nx = 2"));
        assert!(conf.contains("depth = 500"));
        assert!(conf.contains("gtl = off"));
        assert_eq!(std::fs::metadata(dir.path().join("vp.dat")).unwrap().len(), 64);
    }
}
