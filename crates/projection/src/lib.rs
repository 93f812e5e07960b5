//! Coordinate reference system transformations.
//!
//! Implements the forward (and inverse) projections needed to take WGS84
//! longitude/latitude into the planar frames velocity models are laid out in:
//!
//! - [`TransverseMercator`] / UTM for model grids
//! - [`AzimuthalEquidistant`] and [`LambertAzimuthalEqualArea`] for surface maps,
//!   ellipsoidal unless a sphere radius (`+R`) is given
//!
//! All projections are implemented from scratch without external dependencies.
//! [`Projection`] ties them together and can be built from a Proj.4-style
//! definition string such as `+proj=aeqd +lat_0=34 +lon_0=-118 +ellps=WGS84`.
//!
//! # Example
//!
//! ```
//! use projection::{PlanarProjection, Projection};
//!
//! let utm = Projection::utm(11).unwrap();
//! let (e, n) = utm.project(-117.0, 0.0).unwrap();
//! assert!((e - 500_000.0).abs() < 1e-6);
//! assert!(n.abs() < 1e-6);
//! ```

pub mod azimuthal;
pub mod ellipsoid;
pub mod error;
pub mod geodesic;
pub mod proj_string;
pub mod transverse_mercator;

pub use azimuthal::{AzimuthalEquidistant, LambertAzimuthalEqualArea};
pub use ellipsoid::Ellipsoid;
pub use error::{ProjectionError, Result};
pub use proj_string::ProjDefinition;
pub use transverse_mercator::{Hemisphere, TransverseMercator};

use std::f64::consts::PI;

/// A forward projection from geographic degrees to planar metres.
///
/// Implementations must be pure: the same input always yields the same
/// output, so a single instance can be shared across query threads.
pub trait PlanarProjection: Send + Sync {
    /// Project `(lon, lat)` in degrees to `(easting, northing)` in metres.
    fn project(&self, lon_deg: f64, lat_deg: f64) -> Result<(f64, f64)>;

    /// Inverse of [`PlanarProjection::project`], returning `(lon, lat)` in degrees.
    fn unproject(&self, easting: f64, northing: f64) -> Result<(f64, f64)>;
}

/// Any projection supported by this crate.
#[derive(Debug, Clone)]
pub enum Projection {
    TransverseMercator(TransverseMercator),
    AzimuthalEquidistant(AzimuthalEquidistant),
    LambertAzimuthalEqualArea(LambertAzimuthalEqualArea),
}

impl Projection {
    /// UTM projection for a northern-hemisphere zone on WGS84.
    pub fn utm(zone: u8) -> Result<Self> {
        Ok(Self::TransverseMercator(TransverseMercator::utm(
            zone,
            Hemisphere::North,
            Ellipsoid::WGS84,
        )?))
    }

    /// Build a projection from a Proj.4-style definition string.
    pub fn from_proj_string(definition: &str) -> Result<Self> {
        ProjDefinition::parse(definition)?.build()
    }

    /// Short name of the projection, matching the `+proj=` keyword.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TransverseMercator(tm) if tm.zone().is_some() => "utm",
            Self::TransverseMercator(_) => "tmerc",
            Self::AzimuthalEquidistant(_) => "aeqd",
            Self::LambertAzimuthalEqualArea(_) => "laea",
        }
    }
}

impl PlanarProjection for Projection {
    fn project(&self, lon_deg: f64, lat_deg: f64) -> Result<(f64, f64)> {
        match self {
            Self::TransverseMercator(p) => p.project(lon_deg, lat_deg),
            Self::AzimuthalEquidistant(p) => p.project(lon_deg, lat_deg),
            Self::LambertAzimuthalEqualArea(p) => p.project(lon_deg, lat_deg),
        }
    }

    fn unproject(&self, easting: f64, northing: f64) -> Result<(f64, f64)> {
        match self {
            Self::TransverseMercator(p) => p.unproject(easting, northing),
            Self::AzimuthalEquidistant(p) => p.unproject(easting, northing),
            Self::LambertAzimuthalEqualArea(p) => p.unproject(easting, northing),
        }
    }
}

/// Reject non-finite or out-of-range geographic input.
pub(crate) fn check_geographic(lon_deg: f64, lat_deg: f64) -> Result<()> {
    if !lon_deg.is_finite() || !lat_deg.is_finite() {
        return Err(ProjectionError::NonFinite {
            x: lon_deg,
            y: lat_deg,
        });
    }
    if lat_deg.abs() > 90.0 {
        return Err(ProjectionError::LatitudeOutOfRange(lat_deg));
    }
    Ok(())
}

/// Reject non-finite planar input.
pub(crate) fn check_planar(x: f64, y: f64) -> Result<()> {
    if !x.is_finite() || !y.is_finite() {
        return Err(ProjectionError::NonFinite { x, y });
    }
    Ok(())
}

/// Normalize a longitude difference (radians) to [-π, π].
pub(crate) fn wrap_pi(mut dlon: f64) -> f64 {
    while dlon > PI {
        dlon -= 2.0 * PI;
    }
    while dlon < -PI {
        dlon += 2.0 * PI;
    }
    dlon
}
