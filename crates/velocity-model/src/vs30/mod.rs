//! Vs30 surface index.
//!
//! Maps a geographic point to a Vs30 value by bilinear interpolation between
//! the four surrounding leaves of a Vs30 map. The map has its own projection
//! and rotated frame, described by the store's metadata string.

mod metadata;
mod octree;

pub use metadata::{LeafAddressing, Vs30MapConfig};
pub use octree::{
    LeafGridFile, MemoryOctree, OctreeAddress, OctreeStore, Vs30Payload, LEAF_GRID_MAGIC,
    MAX_LEVEL,
};

use std::path::Path;

use nalgebra::{Rotation2, Vector2};
use projection::{PlanarProjection, ProjDefinition, Projection, ProjectionError};
use tracing::{debug, trace, warn};

use crate::error::Vs30Error;
use crate::interpolation::lerp;

/// A position in the Vs30 map's local frame (metres from the map origin
/// along the map's rotated axes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapLocal {
    pub x: f64,
    pub y: f64,
}

/// Point lookups against a Vs30 map.
pub struct Vs30Index {
    map: Vs30MapConfig,
    projection: Projection,
    origin: Vector2<f64>,
    rotation: Rotation2<f64>,
    leaf: LeafAddressing,
    store: Box<dyn OctreeStore>,
}

impl std::fmt::Debug for Vs30Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vs30Index")
            .field("map", &self.map)
            .field("projection", &self.projection.name())
            .field("leaf", &self.leaf)
            .finish_non_exhaustive()
    }
}

impl Vs30Index {
    /// Open a leaf grid file.
    pub fn open(path: &Path) -> Result<Self, Vs30Error> {
        Self::new(Box::new(LeafGridFile::open(path)?))
    }

    /// Build an index over any store, reading the map description from its
    /// metadata.
    pub fn new(store: Box<dyn OctreeStore>) -> Result<Self, Vs30Error> {
        let map: Vs30MapConfig = store.app_meta().parse()?;

        let definition = ProjDefinition::parse(&map.projection)?;
        for key in definition.unknown_keys() {
            warn!(key = key, "Ignoring unknown Vs30 projection parameter");
        }
        let projection = definition.build()?;

        let (origin_e, origin_n) = projection.project(map.origin[0], map.origin[1])?;
        let leaf = LeafAddressing::new(&map)?;

        debug!(
            projection = projection.name(),
            spacing = map.spacing,
            level = leaf.level,
            leaf_ticks = leaf.leaf_ticks,
            edge = leaf.edge,
            "Opened Vs30 map"
        );

        Ok(Self {
            rotation: Rotation2::new(map.rotation.to_radians()),
            origin: Vector2::new(origin_e, origin_n),
            map,
            projection,
            leaf,
            store,
        })
    }

    pub fn map(&self) -> &Vs30MapConfig {
        &self.map
    }

    pub fn leaf(&self) -> &LeafAddressing {
        &self.leaf
    }

    /// Express a geographic point in the map's local frame.
    pub fn to_local(&self, lon: f64, lat: f64) -> Result<MapLocal, ProjectionError> {
        let (e, n) = self.projection.project(lon, lat)?;
        let local = self.rotation * (Vector2::new(e, n) - self.origin);
        Ok(MapLocal {
            x: local.x,
            y: local.y,
        })
    }

    /// Vs30 (m/s) at a geographic point.
    ///
    /// `Ok(None)` when the point lies outside the map or any of the four
    /// surrounding leaves cannot be read. Projection failures are errors.
    pub fn lookup(&self, lon: f64, lat: f64) -> Result<Option<f64>, ProjectionError> {
        let local = self.to_local(lon, lat)?;
        Ok(self.lookup_local(local))
    }

    /// Vs30 at a position in the map's local frame.
    pub fn lookup_local(&self, local: MapLocal) -> Option<f64> {
        if !(0.0..=self.map.x_dimension()).contains(&local.x)
            || !(0.0..=self.map.y_dimension()).contains(&local.y)
        {
            return None;
        }

        let edge = self.leaf.edge;
        let cell_x = (local.x / edge).floor();
        let cell_y = (local.y / edge).floor();
        let x_percent = (local.x - cell_x * edge) / edge;
        let y_percent = (local.y - cell_y * edge) / edge;
        let (cx, cy) = (cell_x as u64, cell_y as u64);

        let mut values = [0.0; 4];
        for (i, (dx, dy)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
            let addr = self.leaf.address(cx + dx, cy + dy);
            match self.store.search(addr) {
                Ok(payload) => values[i] = payload.vs30 as f64,
                Err(e) => {
                    trace!(error = %e, "Vs30 leaf lookup failed");
                    return None;
                }
            }
        }

        let bottom = lerp(x_percent, values[0], values[1]);
        let top = lerp(x_percent, values[2], values[3]);
        Some(lerp(y_percent, bottom, top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: &str = "vs30|Test surface|tester|2026-10-18|100.0|vs30-surf|\
+proj=aeqd +lat_0=34.0 +lon_0=-118.0 +ellps=WGS84|-118.0,34.0,0.0|0.0|800.0,800.0,0.0|\
2147483648,2147483648,0";

    /// Vs30 that is linear in both cell indices.
    fn planar(cx: u64, cy: u64) -> Vs30Payload {
        Vs30Payload {
            surface: 0.0,
            vs30: 300.0 + 20.0 * cx as f32 + 5.0 * cy as f32,
        }
    }

    fn index(meta: &str) -> Vs30Index {
        Vs30Index::new(Box::new(MemoryOctree::from_fn(meta, planar).unwrap())).unwrap()
    }

    #[test]
    fn test_leaf_node_values_are_exact() {
        let index = index(META);
        let v = index.lookup_local(MapLocal { x: 200.0, y: 300.0 }).unwrap();
        assert!((v - (300.0 + 40.0 + 15.0)).abs() < 1e-9, "got {}", v);
    }

    #[test]
    fn test_bilinear_between_leaves() {
        let index = index(META);
        // Linear field: value at (250, 375) is 300 + 20*2.5 + 5*3.75.
        let v = index.lookup_local(MapLocal { x: 250.0, y: 375.0 }).unwrap();
        assert!((v - 368.75).abs() < 1e-9, "got {}", v);
    }

    #[test]
    fn test_fraction_uses_leaf_edge() {
        // 750 m over 100 m spacing gives 8 leaves of 93.75 m.
        let meta = META.replace("800.0,800.0,0.0", "750.0,750.0,0.0");
        let index = index(&meta);
        assert_eq!(index.leaf().edge, 93.75);
        let x = 2.5 * 93.75;
        let v = index.lookup_local(MapLocal { x, y: 0.0 }).unwrap();
        assert!((v - 350.0).abs() < 1e-9, "got {}", v);
    }

    #[test]
    fn test_far_edge_clamps_to_last_leaf() {
        let index = index(META);
        let v = index.lookup_local(MapLocal { x: 800.0, y: 0.0 }).unwrap();
        assert!((v - (300.0 + 20.0 * 7.0)).abs() < 1e-9, "got {}", v);
    }

    #[test]
    fn test_outside_map_is_none() {
        let index = index(META);
        assert!(index.lookup_local(MapLocal { x: -0.1, y: 10.0 }).is_none());
        assert!(index.lookup_local(MapLocal { x: 10.0, y: 800.1 }).is_none());
    }

    #[test]
    fn test_missing_leaf_is_none() {
        let mut octree = MemoryOctree::new(META);
        octree.insert(
            OctreeAddress {
                x: 0,
                y: 0,
                z: 0,
                level: 3,
            },
            planar(0, 0),
        );
        let index = Vs30Index::new(Box::new(octree)).unwrap();
        assert!(index.lookup_local(MapLocal { x: 10.0, y: 10.0 }).is_none());
    }

    #[test]
    fn test_geographic_lookup_at_origin() {
        let index = index(META);
        let v = index.lookup(-118.0, 34.0).unwrap().unwrap();
        assert!((v - 300.0).abs() < 1e-6, "got {}", v);

        // South-west of the origin is outside the map.
        assert!(index.lookup(-118.01, 33.99).unwrap().is_none());
    }

    #[test]
    fn test_rotated_map_frame() {
        let meta = META.replace("|0.0|800.0", "|90.0|800.0");
        let index = index(&meta);
        // A +90° rotation maps east offsets onto the local y axis.
        let local = index.to_local(-117.999, 34.0).unwrap();
        assert!(local.x.abs() < 0.01, "x = {}", local.x);
        assert!(local.y > 90.0 && local.y < 95.0, "y = {}", local.y);
    }

    #[test]
    fn test_bad_metadata_rejected() {
        let octree = MemoryOctree::new("vs30|too|few|fields");
        assert!(matches!(
            Vs30Index::new(Box::new(octree)),
            Err(Vs30Error::FieldCount { found: 4, .. })
        ));
    }
}
