//! Vs30 map metadata and leaf addressing.
//!
//! The metadata string has eleven `|`-separated fields:
//!
//! ```text
//! type|description|author|date|spacing|schema|projection|lon,lat,depth|rotation|x,y,z|xt,yt,zt
//! ```
//!
//! `spacing` and the dimensions are metres, `rotation` degrees, and the last
//! field the octree's extent in ticks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::octree::{OctreeAddress, MAX_LEVEL};
use crate::error::Vs30Error;

const FIELD_COUNT: usize = 11;

/// Parsed Vs30 map metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vs30MapConfig {
    pub map_type: String,
    pub description: String,
    pub author: String,
    pub date: String,
    /// Nominal sample spacing (metres)
    pub spacing: f64,
    pub schema: String,
    /// Proj.4-style definition of the map's projection
    pub projection: String,
    /// Geographic origin of the map frame: lon, lat, depth
    pub origin: [f64; 3],
    /// Rotation of the map frame (degrees)
    pub rotation: f64,
    /// Map extent along x, y, z (metres)
    pub dimensions: [f64; 3],
    /// Octree extent along x, y, z (ticks)
    pub ticks: [u64; 3],
}

impl Vs30MapConfig {
    pub fn x_dimension(&self) -> f64 {
        self.dimensions[0]
    }

    pub fn y_dimension(&self) -> f64 {
        self.dimensions[1]
    }
}

impl FromStr for Vs30MapConfig {
    type Err = Vs30Error;

    fn from_str(meta: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = meta.split('|').collect();
        if fields.len() != FIELD_COUNT {
            return Err(Vs30Error::FieldCount {
                expected: FIELD_COUNT,
                found: fields.len(),
            });
        }

        let config = Self {
            map_type: fields[0].trim().to_string(),
            description: fields[1].trim().to_string(),
            author: fields[2].trim().to_string(),
            date: fields[3].trim().to_string(),
            spacing: parse_number("spacing", fields[4])?,
            schema: fields[5].trim().to_string(),
            projection: fields[6].trim().to_string(),
            origin: parse_triple("origin", fields[7])?,
            rotation: parse_number("rotation", fields[8])?,
            dimensions: parse_triple("dimensions", fields[9])?,
            ticks: parse_triple("ticks", fields[10])?,
        };

        if config.spacing.is_nan() || config.spacing <= 0.0 {
            return Err(invalid("spacing", fields[4]));
        }
        if config.dimensions[..2].iter().any(|d| d.is_nan() || *d <= 0.0) {
            return Err(invalid("dimensions", fields[9]));
        }
        Ok(config)
    }
}

impl fmt::Display for Vs30MapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|{},{},{}|{}|{},{},{}|{},{},{}",
            self.map_type,
            self.description,
            self.author,
            self.date,
            self.spacing,
            self.schema,
            self.projection,
            self.origin[0],
            self.origin[1],
            self.origin[2],
            self.rotation,
            self.dimensions[0],
            self.dimensions[1],
            self.dimensions[2],
            self.ticks[0],
            self.ticks[1],
            self.ticks[2],
        )
    }
}

fn invalid(field: &'static str, value: &str) -> Vs30Error {
    Vs30Error::InvalidField {
        field,
        value: value.to_string(),
    }
}

fn parse_number<T: FromStr>(field: &'static str, value: &str) -> Result<T, Vs30Error> {
    value.trim().parse().map_err(|_| invalid(field, value))
}

fn parse_triple<T: FromStr + Copy>(field: &'static str, value: &str) -> Result<[T; 3], Vs30Error> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 3 {
        return Err(invalid(field, value));
    }
    Ok([
        parse_number(field, parts[0])?,
        parse_number(field, parts[1])?,
        parse_number(field, parts[2])?,
    ])
}

/// Leaf level, tick size and metric edge of the map's finest cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafAddressing {
    /// Octree level holding the leaves
    pub level: u8,
    /// Edge length of a leaf in ticks
    pub leaf_ticks: u64,
    /// Edge length of a leaf in metres
    pub edge: f64,
    /// Octree extent in ticks along x and y
    pub ticks: [u64; 2],
}

impl LeafAddressing {
    /// `level = ceil(log2(x_dimension / spacing))`, `leaf_ticks =
    /// 2^(MAX_LEVEL - level)` and `edge = x_dimension / 2^level`.
    pub fn new(map: &Vs30MapConfig) -> Result<Self, Vs30Error> {
        let level = (map.x_dimension() / map.spacing).log2().ceil().max(0.0);
        if level > MAX_LEVEL as f64 {
            return Err(invalid("spacing", &map.spacing.to_string()));
        }
        let level = level as u8;
        let leaf_ticks = 1u64 << (MAX_LEVEL - level);
        let edge = map.x_dimension() / (1u64 << level) as f64;

        let ticks = [map.ticks[0], map.ticks[1]];
        if ticks.iter().any(|&t| t < leaf_ticks) {
            return Err(invalid("ticks", &format!("{:?}", map.ticks)));
        }

        Ok(Self {
            level,
            leaf_ticks,
            edge,
            ticks,
        })
    }

    /// Leaf cells along x and y.
    pub fn cells(&self) -> (u64, u64) {
        (self.ticks[0] / self.leaf_ticks, self.ticks[1] / self.leaf_ticks)
    }

    /// Address of leaf cell `(cell_x, cell_y)`. Addresses past the octree's
    /// extent are clamped to its last leaf.
    pub fn address(&self, cell_x: u64, cell_y: u64) -> OctreeAddress {
        let clamp = |cell: u64, extent: u64| {
            let addr = cell.saturating_mul(self.leaf_ticks);
            if addr >= extent {
                extent - self.leaf_ticks
            } else {
                addr
            }
        };
        OctreeAddress {
            x: clamp(cell_x, self.ticks[0]),
            y: clamp(cell_y, self.ticks[1]),
            z: 0,
            level: MAX_LEVEL,
        }
    }
}
