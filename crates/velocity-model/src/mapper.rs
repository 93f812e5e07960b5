//! Mapping from geographic points to grid cells.
//!
//! The model footprint is a rectangle in UTM space that may be rotated. Its
//! bottom-left corner is the origin of the grid-local frame, the bottom edge
//! is the local x axis and the left edge is the local y axis.

use nalgebra::{Rotation2, Vector2};
use projection::{PlanarProjection, Projection};
use tracing::debug;

use crate::config::{Corners, DepthOrder, FastAxis, ModelConfig};
use crate::error::{ConfigError, ModelError, QueryError};
use crate::types::Point;

/// Relative tolerance on the footprint's rectangularity.
const RECTANGLE_TOLERANCE: f64 = 0.01;

/// A position in the model's grid-local frame (metres from the bottom-left
/// corner along the footprint's edges).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLocal {
    pub x: f64,
    pub y: f64,
}

/// The rotated rectangle covered by the model, derived once from its corners.
#[derive(Debug, Clone)]
pub struct GridFrame {
    origin: Vector2<f64>,
    /// Rotates UTM offsets into the grid-local frame.
    to_local: Rotation2<f64>,
    width: f64,
    height: f64,
}

impl GridFrame {
    /// Derive the frame from the four UTM corners.
    ///
    /// The corners must form a rectangle: positive edge lengths, a left edge
    /// perpendicular to the bottom edge, and a top-right corner at
    /// `BL + (BR - BL) + (TL - BL)`, all within 1% of the footprint size.
    pub fn from_corners(corners: &Corners) -> Result<Self, ConfigError> {
        let bl = Vector2::new(corners.bottom_left.e, corners.bottom_left.n);
        let br = Vector2::new(corners.bottom_right.e, corners.bottom_right.n);
        let tl = Vector2::new(corners.top_left.e, corners.top_left.n);
        let tr = Vector2::new(corners.top_right.e, corners.top_right.n);

        if [bl, br, tl, tr].iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(ConfigError::DegenerateFootprint(
                "corner coordinates must be finite".to_string(),
            ));
        }

        let bottom = br - bl;
        let left = tl - bl;
        let width = bottom.norm();
        let height = left.norm();
        if width <= 0.0 || height <= 0.0 {
            return Err(ConfigError::DegenerateFootprint(format!(
                "width {} m, height {} m",
                width, height
            )));
        }

        let cos_between = bottom.dot(&left) / (width * height);
        if cos_between.abs() > RECTANGLE_TOLERANCE {
            return Err(ConfigError::DegenerateFootprint(format!(
                "left edge is not perpendicular to the bottom edge (cos = {:.4})",
                cos_between
            )));
        }

        let expected_tr = bl + bottom + left;
        let scale = width.max(height);
        if (tr - expected_tr).norm() > RECTANGLE_TOLERANCE * scale {
            return Err(ConfigError::DegenerateFootprint(format!(
                "top-right corner is {:.1} m from where the other corners place it",
                (tr - expected_tr).norm()
            )));
        }

        // Counter-clockwise footprints only: the left edge must be +90° from the bottom.
        if bottom.perp(&left) <= 0.0 {
            return Err(ConfigError::DegenerateFootprint(
                "corners are mirrored (top-left lies clockwise of the bottom edge)".to_string(),
            ));
        }

        let angle = bottom.y.atan2(bottom.x);
        Ok(Self {
            origin: bl,
            to_local: Rotation2::new(-angle),
            width,
            height,
        })
    }

    /// Express a UTM position in grid-local coordinates.
    pub fn to_local(&self, easting: f64, northing: f64) -> GridLocal {
        let local = self.to_local * (Vector2::new(easting, northing) - self.origin);
        GridLocal {
            x: local.x,
            y: local.y,
        }
    }

    /// Express a grid-local position in UTM coordinates.
    pub fn to_utm(&self, local: GridLocal) -> (f64, f64) {
        let utm = self.origin + self.to_local.inverse() * Vector2::new(local.x, local.y);
        (utm.x, utm.y)
    }

    pub fn contains(&self, local: GridLocal) -> bool {
        (0.0..=self.width).contains(&local.x) && (0.0..=self.height).contains(&local.y)
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Rotation of the bottom edge from grid east, in degrees counter-clockwise.
    pub fn rotation_deg(&self) -> f64 {
        -self.to_local.angle().to_degrees()
    }
}

/// Dimensions and on-disk ordering of the property grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub fast_axis: FastAxis,
    pub depth_order: DepthOrder,
}

impl GridLayout {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            nx: config.nx,
            ny: config.ny,
            nz: config.nz,
            fast_axis: config.seek_axis,
            depth_order: config.seek_direction,
        }
    }

    /// Number of records per property.
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat record offset of node `(x, y, k)`, where `k` counts layers from
    /// the surface.
    pub fn offset(&self, x: usize, y: usize, k: usize) -> usize {
        debug_assert!(x < self.nx && y < self.ny && k < self.nz);
        let layer = match self.depth_order {
            DepthOrder::TopDown => k,
            DepthOrder::BottomUp => self.nz - 1 - k,
        };
        match self.fast_axis {
            FastAxis::FastX => (layer * self.ny + y) * self.nx + x,
            FastAxis::FastY => (layer * self.nx + x) * self.ny + y,
        }
    }
}

/// How the vertical direction is interpolated for a located point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Vertical {
    /// Between layers `z` and `z + 1` with fraction `percent`.
    Between { z: usize, percent: f64 },
    /// At or below the deepest layer: the deepest layer alone.
    Bottom { z: usize },
}

/// The grid cell containing a point and the point's fractional position
/// inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub x: usize,
    pub y: usize,
    pub x_percent: f64,
    pub y_percent: f64,
    pub vertical: Vertical,
}

/// Converts query points into grid cells.
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    projection: Projection,
    frame: GridFrame,
    layout: GridLayout,
    depth: f64,
    depth_interval: f64,
    cell_width: f64,
    cell_height: f64,
}

impl CoordinateMapper {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let projection = Projection::utm(config.utm_zone)?;
        let frame = GridFrame::from_corners(&config.corners)?;
        let layout = GridLayout::from_config(config);

        let cell_width = frame.width() / (layout.nx - 1) as f64;
        let cell_height = frame.height() / (layout.ny - 1) as f64;

        debug!(
            width = frame.width(),
            height = frame.height(),
            rotation_deg = frame.rotation_deg(),
            cell_width = cell_width,
            cell_height = cell_height,
            "Derived model footprint"
        );

        Ok(Self {
            projection,
            frame,
            layout,
            depth: config.depth,
            depth_interval: config.depth_interval,
            cell_width,
            cell_height,
        })
    }

    pub fn frame(&self) -> &GridFrame {
        &self.frame
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Project a point into the grid-local frame without range checks.
    pub fn to_local(&self, lon: f64, lat: f64) -> Result<GridLocal, QueryError> {
        let (easting, northing) = self.projection.project(lon, lat)?;
        Ok(self.frame.to_local(easting, northing))
    }

    /// Geographic position of a grid-local offset.
    pub fn to_geographic(&self, local: GridLocal) -> Result<(f64, f64), QueryError> {
        let (easting, northing) = self.frame.to_utm(local);
        Ok(self.projection.unproject(easting, northing)?)
    }

    /// Locate the grid cell containing `point`.
    pub fn locate(&self, point: &Point) -> Result<GridCell, QueryError> {
        let local = self.to_local(point.lon, point.lat)?;
        if !self.frame.contains(local) {
            return Err(QueryError::OutsideFootprint {
                lon: point.lon,
                lat: point.lat,
            });
        }
        self.locate_local(local, point.depth)
    }

    /// Locate the grid cell for a grid-local position already known to lie
    /// inside the footprint.
    pub fn locate_local(&self, local: GridLocal, depth: f64) -> Result<GridCell, QueryError> {
        if !(0.0..=self.depth).contains(&depth) {
            return Err(QueryError::OutsideDepthRange {
                depth,
                max_depth: self.depth,
            });
        }

        let (x, x_percent) = split_index(local.x / self.cell_width, self.layout.nx);
        let (y, y_percent) = split_index(local.y / self.cell_height, self.layout.ny);

        let bottom = self.layout.nz - 1;
        let z_continuous = depth / self.depth_interval;
        let vertical = if self.layout.nz == 1 || z_continuous >= bottom as f64 {
            Vertical::Bottom { z: bottom }
        } else {
            let z = z_continuous.floor() as usize;
            Vertical::Between {
                z,
                percent: z_continuous - z as f64,
            }
        };

        Ok(GridCell {
            x,
            y,
            x_percent,
            y_percent,
            vertical,
        })
    }
}

/// Split a continuous node coordinate into a base index in `[0, n - 2]` and
/// a fraction in `[0, 1]`.
fn split_index(continuous: f64, n: usize) -> (usize, f64) {
    let last_base = n - 2;
    let base = continuous.floor().max(0.0);
    if base >= (n - 1) as f64 {
        return (last_base, 1.0);
    }
    let index = base as usize;
    (index, (continuous - base).clamp(0.0, 1.0))
}
