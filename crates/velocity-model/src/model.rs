//! The velocity model: initialization, point queries and batches.

use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, trace, warn};

use crate::backend::{GridBackend, Residency};
use crate::config::{FailurePolicy, ModelConfig};
use crate::density::DensityDerivator;
use crate::error::{ConfigError, ModelError, QueryError, Result};
use crate::gtl::GtlBlender;
use crate::interpolation::{bilinear, trilinear};
use crate::mapper::{CoordinateMapper, GridCell, GridLocal, Vertical};
use crate::types::{Point, Property, PropertyRecord, SENTINEL};
use crate::vs30::Vs30Index;

/// Library name and version.
pub const VERSION: &str = concat!("velocity-model ", env!("CARGO_PKG_VERSION"));

/// Outcome of a batch query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.total - self.failed
    }
}

/// The near-surface taper and the Vs30 map it draws on.
#[derive(Debug)]
struct NearSurface {
    blender: GtlBlender,
    index: Vs30Index,
}

/// A gridded 3D velocity model opened for queries.
///
/// All state is read-only after [`VelocityModel::init`], so a model can be
/// shared across threads.
#[derive(Debug)]
pub struct VelocityModel {
    label: String,
    config: ModelConfig,
    mapper: CoordinateMapper,
    backend: GridBackend,
    density: DensityDerivator,
    near_surface: Option<NearSurface>,
}

impl VelocityModel {
    /// Open the model `label` stored in `model_dir`.
    pub fn init(model_dir: impl AsRef<Path>, label: &str) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let config = ModelConfig::load(model_dir, label)?;
        let backend = GridBackend::open(model_dir, &config)?;

        let vs30 = if config.gtl {
            let name = config
                .vs30_etree
                .as_deref()
                .ok_or(ConfigError::MissingKey("vs30_etree"))?;
            Some(Vs30Index::open(&model_dir.join(name))?)
        } else {
            None
        };

        let model = Self::from_parts(label, config, backend, vs30)?;
        info!(
            label = %model.label,
            nx = model.config.nx,
            ny = model.config.ny,
            nz = model.config.nz,
            width = model.mapper.frame().width(),
            height = model.mapper.frame().height(),
            rotation_deg = model.mapper.frame().rotation_deg(),
            gtl = model.config.gtl,
            vp = ?model.residency(Property::Vp),
            vs = ?model.residency(Property::Vs),
            rho = ?model.residency(Property::Rho),
            qp = ?model.residency(Property::Qp),
            qs = ?model.residency(Property::Qs),
            "Initialized velocity model"
        );
        Ok(model)
    }

    /// Assemble a model from components that are already open.
    pub fn from_parts(
        label: impl Into<String>,
        config: ModelConfig,
        backend: GridBackend,
        vs30: Option<Vs30Index>,
    ) -> Result<Self> {
        config.validate()?;
        let mapper = CoordinateMapper::new(&config)?;
        if backend.layout() != mapper.layout() {
            return Err(ConfigError::invalid(
                "nx/ny/nz",
                format!(
                    "grid backend is {:?}, configuration is {:?}",
                    backend.layout(),
                    mapper.layout()
                ),
            )
            .into());
        }

        let near_surface = match (config.gtl, vs30) {
            (true, Some(index)) => Some(NearSurface {
                blender: GtlBlender::new(config.depth_interval),
                index,
            }),
            (true, None) => return Err(ConfigError::MissingKey("vs30_etree").into()),
            (false, _) => None,
        };

        Ok(Self {
            label: label.into(),
            density: DensityDerivator::new(config.density, config.nafe_drake),
            config,
            mapper,
            backend,
            near_surface,
        })
    }

    /// Library name and version.
    pub fn version() -> &'static str {
        VERSION
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn residency(&self, property: Property) -> Residency {
        self.backend.residency(property)
    }

    /// Geographic (lon, lat) of the footprint corners: bottom-left,
    /// bottom-right, top-right, top-left.
    pub fn corner_coordinates(&self) -> std::result::Result<[(f64, f64); 4], QueryError> {
        let frame = self.mapper.frame();
        let (w, h) = (frame.width(), frame.height());
        Ok([
            self.mapper.to_geographic(GridLocal { x: 0.0, y: 0.0 })?,
            self.mapper.to_geographic(GridLocal { x: w, y: 0.0 })?,
            self.mapper.to_geographic(GridLocal { x: w, y: h })?,
            self.mapper.to_geographic(GridLocal { x: 0.0, y: h })?,
        ])
    }

    /// Material properties at a single point.
    pub fn query_point(&self, point: &Point) -> std::result::Result<PropertyRecord, QueryError> {
        let mut record = self.sample_grid(point)?;
        let rho_modeled = self.backend.residency(Property::Rho) != Residency::Absent;

        if let Some(near_surface) = &self.near_surface {
            if let Some(z) = near_surface.blender.normalized_depth(point.depth) {
                let reference =
                    self.sample_grid(&point.at_depth(near_surface.blender.reference_depth()))?;
                match near_surface.index.lookup(point.lon, point.lat)? {
                    Some(vs30) => near_surface.blender.blend(z, &reference, vs30, &mut record),
                    None => {
                        record.vp = SENTINEL;
                        record.vs = SENTINEL;
                        self.density.apply(&mut record, rho_modeled);
                        return Err(QueryError::Vs30Unavailable {
                            lon: point.lon,
                            lat: point.lat,
                            partial: record,
                        });
                    }
                }
            }
        }

        self.density.apply(&mut record, rho_modeled);
        Ok(record)
    }

    /// Interpolate the property grids at a point.
    fn sample_grid(&self, point: &Point) -> std::result::Result<PropertyRecord, QueryError> {
        let cell = self.mapper.locate(point)?;
        match cell.vertical {
            Vertical::Between { z, percent } => {
                let [c0, c1, c2, c3] = self.face(&cell, z)?;
                let [c4, c5, c6, c7] = self.face(&cell, z + 1)?;
                Ok(trilinear(
                    cell.x_percent,
                    cell.y_percent,
                    percent,
                    &[c0, c1, c2, c3, c4, c5, c6, c7],
                ))
            }
            Vertical::Bottom { z } => Ok(bilinear(
                cell.x_percent,
                cell.y_percent,
                &self.face(&cell, z)?,
            )),
        }
    }

    /// The four nodes of `cell` on layer `k`, in bilinear corner order.
    fn face(
        &self,
        cell: &GridCell,
        k: usize,
    ) -> std::result::Result<[PropertyRecord; 4], QueryError> {
        let (x, y) = (cell.x, cell.y);
        Ok([
            self.backend.node(x, y, k)?,
            self.backend.node(x + 1, y, k)?,
            self.backend.node(x, y + 1, k)?,
            self.backend.node(x + 1, y + 1, k)?,
        ])
    }

    /// Resolve one point into `slot`. Returns false if the point failed.
    fn resolve_into(&self, point: &Point, slot: &mut PropertyRecord) -> bool {
        match self.query_point(point) {
            Ok(record) => {
                *slot = record;
                true
            }
            Err(e) => {
                trace!(
                    lon = point.lon,
                    lat = point.lat,
                    depth = point.depth,
                    error = %e,
                    "Point failed"
                );
                *slot = e.output_record();
                false
            }
        }
    }

    /// Query a batch of points, writing one record per point into `out`.
    ///
    /// Every slot of `out` is written, failed points with the sentinel
    /// record. Under the strict failure policy any failure makes the result
    /// [`ModelError::PointFailures`].
    pub fn query(&self, points: &[Point], out: &mut [PropertyRecord]) -> Result<BatchReport> {
        check_lengths(points, out)?;
        let failed = points
            .iter()
            .zip(out.iter_mut())
            .map(|(point, slot)| self.resolve_into(point, slot))
            .filter(|ok| !ok)
            .count();
        self.finish_batch(BatchReport {
            total: points.len(),
            failed,
        })
    }

    /// [`VelocityModel::query`] spread across the rayon thread pool.
    pub fn par_query(&self, points: &[Point], out: &mut [PropertyRecord]) -> Result<BatchReport> {
        check_lengths(points, out)?;
        let failed = points
            .par_iter()
            .zip(out.par_iter_mut())
            .map(|(point, slot)| self.resolve_into(point, slot))
            .filter(|ok| !ok)
            .count();
        self.finish_batch(BatchReport {
            total: points.len(),
            failed,
        })
    }

    fn finish_batch(&self, report: BatchReport) -> Result<BatchReport> {
        if report.failed > 0 {
            warn!(
                label = %self.label,
                failed = report.failed,
                total = report.total,
                "Some points could not be resolved"
            );
            if self.config.point_failure == FailurePolicy::Strict {
                return Err(ModelError::PointFailures {
                    failed: report.failed,
                    total: report.total,
                });
            }
        }
        Ok(report)
    }

    /// Release the model's grids and files.
    pub fn finalize(self) {
        info!(label = %self.label, "Released velocity model");
    }
}

fn check_lengths(points: &[Point], out: &[PropertyRecord]) -> Result<()> {
    if points.len() != out.len() {
        return Err(ModelError::BufferMismatch {
            points: points.len(),
            outputs: out.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::density_from_vs;
    use crate::gtl::vp_from_vs30;
    use crate::mapper::GridLayout;
    use crate::vs30::{MemoryOctree, OctreeAddress, Vs30Payload};

    fn config(extra: &str) -> ModelConfig {
        let text = format!(
            "utm_zone = 11\nnx = 2\nny = 2\nnz = 2\ndepth = 2000\ndepth_interval = 1000\n\
             top_left_corner_e = 400000\ntop_left_corner_n = 3701000\n\
             top_right_corner_e = 401000\ntop_right_corner_n = 3701000\n\
             bottom_left_corner_e = 400000\nbottom_left_corner_n = 3700000\n\
             bottom_right_corner_e = 401000\nbottom_right_corner_n = 3700000\n\
             seek_direction = top-down\n{}",
            extra
        );
        ModelConfig::from_conf_str(&text).unwrap()
    }

    /// Backend whose vp is `1000 * (1 + offset)` and vs is half of vp.
    fn backend(config: &ModelConfig) -> GridBackend {
        let layout = GridLayout::from_config(config);
        let vp: Vec<f64> = (0..layout.len()).map(|i| 1000.0 * (1.0 + i as f64)).collect();
        let vs: Vec<f64> = vp.iter().map(|v| v / 2.0).collect();
        GridBackend::from_values(layout, [Some(vp), Some(vs), None, None, None])
    }

    fn model(extra: &str) -> VelocityModel {
        let config = config(extra);
        let backend = backend(&config);
        VelocityModel::from_parts("test", config, backend, None).unwrap()
    }

    fn point_at(model: &VelocityModel, x: f64, y: f64, depth: f64) -> Point {
        let (lon, lat) = model.mapper.to_geographic(GridLocal { x, y }).unwrap();
        Point::new(lon, lat, depth)
    }

    #[test]
    fn test_centre_is_mean_of_corners() {
        let model = model("");
        let record = model.query_point(&point_at(&model, 500.0, 500.0, 500.0)).unwrap();
        // vp nodes are 1000..=8000
        assert!((record.vp - 4500.0).abs() < 1e-6, "vp = {}", record.vp);
        assert!((record.vs - 2250.0).abs() < 1e-6, "vs = {}", record.vs);
        assert_eq!(record.qp, SENTINEL);
        assert!((record.rho - density_from_vs(record.vs)).abs() < 1e-9);
    }

    #[test]
    fn test_below_deepest_layer_is_bilinear() {
        let model = model("");
        let record = model.query_point(&point_at(&model, 500.0, 500.0, 1500.0)).unwrap();
        // Mean of the deepest layer's nodes, offsets 4..=7.
        assert!((record.vp - 6500.0).abs() < 1e-6, "vp = {}", record.vp);
    }

    #[test]
    fn test_batch_writes_every_slot() {
        let model = model("point_failure = lenient\n");
        let points = [
            point_at(&model, 500.0, 500.0, 0.0),
            point_at(&model, -100.0, 500.0, 0.0),
            point_at(&model, 500.0, 500.0, 2500.0),
        ];
        let mut out = [PropertyRecord::default(); 3];
        let report = model.query(&points, &mut out).unwrap();
        assert_eq!(report, BatchReport { total: 3, failed: 2 });
        assert_eq!(report.succeeded(), 1);
        assert!(!out[0].is_sentinel());
        assert!(out[1].is_sentinel());
        assert!(out[2].is_sentinel());
    }

    #[test]
    fn test_strict_policy_reports_failures() {
        let model = model("");
        let points = [
            point_at(&model, 500.0, 500.0, 0.0),
            point_at(&model, 1100.0, 500.0, 0.0),
        ];
        let mut out = [PropertyRecord::default(); 2];
        match model.query(&points, &mut out) {
            Err(ModelError::PointFailures { failed, total }) => {
                assert_eq!((failed, total), (1, 2));
            }
            other => panic!("expected point failures, got {:?}", other),
        }
        assert!(!out[0].is_sentinel());
        assert!(out[1].is_sentinel());
    }

    #[test]
    fn test_par_query_matches_query() {
        let model = model("point_failure = lenient\n");
        let points: Vec<Point> = (0..64)
            .map(|i| {
                let x = (i * 17 % 1100) as f64;
                let y = (i * 31 % 1000) as f64;
                point_at(&model, x, y, (i * 29 % 2000) as f64)
            })
            .collect();
        let mut serial = vec![PropertyRecord::default(); points.len()];
        let mut parallel = vec![PropertyRecord::default(); points.len()];
        let a = model.query(&points, &mut serial).unwrap();
        let b = model.par_query(&points, &mut parallel).unwrap();
        assert_eq!(a, b);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_buffer_mismatch() {
        let model = model("");
        let points = [point_at(&model, 500.0, 500.0, 0.0)];
        let mut out = [PropertyRecord::default(); 2];
        assert!(matches!(
            model.query(&points, &mut out),
            Err(ModelError::BufferMismatch { points: 1, outputs: 2 })
        ));
    }

    #[test]
    fn test_gtl_requires_index() {
        let config = config("gtl = on\nvs30_etree = vs30.leaf\n");
        let backend = backend(&config);
        assert!(matches!(
            VelocityModel::from_parts("test", config, backend, None),
            Err(ModelError::Config(ConfigError::MissingKey("vs30_etree")))
        ));
    }

    /// GTL model over a 2 km UTM-aligned Vs30 map of 250 m leaves anchored
    /// 500 m south-west of the model corner. Leaves exist for `cx < covered`.
    fn gtl_model(covered: u64) -> VelocityModel {
        use projection::{PlanarProjection, Projection};

        let (lon, lat) = Projection::utm(11).unwrap().unproject(399_500.0, 3_699_500.0).unwrap();
        let meta = format!(
            "vs30|Test|tester|2026-10-18|250.0|vs30-surf|+proj=utm +zone=11|{},{},0.0|0.0|\
             2000.0,2000.0,0.0|2147483648,2147483648,0",
            lon, lat
        );
        let mut octree = MemoryOctree::new(meta);
        for cy in 0..8u64 {
            for cx in 0..covered {
                octree.insert(
                    OctreeAddress {
                        x: cx << 28,
                        y: cy << 28,
                        z: 0,
                        level: 3,
                    },
                    Vs30Payload {
                        surface: 0.0,
                        vs30: 400.0,
                    },
                );
            }
        }

        let config = config("gtl = on\nvs30_etree = vs30.leaf\n");
        let backend = backend(&config);
        let index = Vs30Index::new(Box::new(octree)).unwrap();
        VelocityModel::from_parts("test", config, backend, Some(index)).unwrap()
    }

    #[test]
    fn test_gtl_surface_value() {
        let model = gtl_model(8);
        let record = model.query_point(&point_at(&model, 500.0, 500.0, 0.0)).unwrap();
        assert!((record.vs - 200.0).abs() < 1e-3, "vs = {}", record.vs);
        assert!((record.vp - 0.5 * vp_from_vs30(400.0)).abs() < 1e-3);
    }

    #[test]
    fn test_gtl_blend_within_taper() {
        let model = gtl_model(8);
        let record = model.query_point(&point_at(&model, 500.0, 500.0, 250.0)).unwrap();
        // Deep model at 1000 m: vp 6500, vs 3250; f = 0.3625, g = 0.53125.
        assert!((record.vs - 1390.625).abs() < 1e-3, "vs = {}", record.vs);
        assert!((record.vp - 3240.25671).abs() < 1e-3, "vp = {}", record.vp);
        assert!((record.rho - density_from_vs(record.vs)).abs() < 1e-9);
    }

    #[test]
    fn test_gtl_below_taper_uses_grid() {
        let model = gtl_model(8);
        let record = model.query_point(&point_at(&model, 500.0, 500.0, 1500.0)).unwrap();
        assert!((record.vp - 6500.0).abs() < 1e-6, "vp = {}", record.vp);
    }

    #[test]
    fn test_gtl_missing_vs30_carries_partial_record() {
        let model = gtl_model(6);
        match model.query_point(&point_at(&model, 1000.0, 1000.0, 100.0)) {
            Err(QueryError::Vs30Unavailable { partial, .. }) => {
                assert_eq!(partial.vp, SENTINEL);
                assert_eq!(partial.vs, SENTINEL);
                assert_eq!(partial.rho, SENTINEL);
            }
            other => panic!("expected missing Vs30, got {:?}", other),
        }

        // Points that miss the map only below the taper are unaffected.
        assert!(model
            .query_point(&point_at(&model, 1000.0, 1000.0, 1500.0))
            .is_ok());
    }

    #[test]
    fn test_version() {
        assert!(VelocityModel::version().starts_with("velocity-model "));
    }
}
