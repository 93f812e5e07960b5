//! Parsing of Proj.4-style projection definitions.
//!
//! Only the subset of keywords used by velocity-model metadata is understood:
//!
//! ```text
//! +proj=utm  +zone=11 [+south] [+ellps=WGS84]
//! +proj=tmerc +lon_0=-117 [+k_0=0.9996] [+x_0=..] [+y_0=..] [+ellps=..]
//! +proj=aeqd +lat_0=34 +lon_0=-118 [+x_0=..] [+y_0=..] [+R=..|+ellps=..]
//! +proj=laea +lat_0=34 +lon_0=-118 [+x_0=..] [+y_0=..] [+R=..|+ellps=..]
//! ```
//!
//! Datum and bookkeeping keywords (`+datum`, `+no_defs`, `+towgs84`,
//! `+type`, `+wktext`) are accepted and ignored. `+units` must be `m`.

use std::collections::HashMap;

use crate::azimuthal::{AzimuthalEquidistant, LambertAzimuthalEqualArea};
use crate::ellipsoid::Ellipsoid;
use crate::error::{ProjectionError, Result};
use crate::transverse_mercator::{Hemisphere, TransverseMercator};
use crate::Projection;

/// Keywords that carry no information for the projections implemented here.
const IGNORED_KEYS: &[&str] = &["datum", "no_defs", "towgs84", "type", "wktext"];

enum AzimuthalFigure {
    Sphere(f64),
    Ellipsoid(Ellipsoid),
}

/// A parsed `+key=value` definition.
#[derive(Debug, Clone, Default)]
pub struct ProjDefinition {
    params: HashMap<String, Option<String>>,
}

impl ProjDefinition {
    /// Split a definition string into its keyword/value pairs.
    pub fn parse(definition: &str) -> Result<Self> {
        let mut params = HashMap::new();
        for token in definition.split_whitespace() {
            let token = token.strip_prefix('+').unwrap_or(token);
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((key, value)) => {
                    params.insert(key.to_string(), Some(value.to_string()));
                }
                None => {
                    params.insert(token.to_string(), None);
                }
            }
        }

        if let Some(units) = params.get("units") {
            if units.as_deref() != Some("m") {
                return Err(ProjectionError::InvalidParameter {
                    key: "units".to_string(),
                    value: units.clone().unwrap_or_default(),
                });
            }
        }

        Ok(Self { params })
    }

    /// The `+proj=` name, if present.
    pub fn proj_name(&self) -> Option<&str> {
        self.params.get("proj").and_then(|v| v.as_deref())
    }

    /// Whether a flag (valueless keyword such as `+south`) is present.
    pub fn has_flag(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Keywords present that are neither understood nor explicitly ignored.
    pub fn unknown_keys(&self) -> Vec<&str> {
        const KNOWN: &[&str] = &[
            "proj", "zone", "south", "ellps", "R", "lat_0", "lon_0", "x_0", "y_0", "k_0", "k",
            "units",
        ];
        let mut keys: Vec<&str> = self
            .params
            .keys()
            .map(String::as_str)
            .filter(|k| !KNOWN.contains(k) && !IGNORED_KEYS.contains(k))
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Read a numeric parameter, returning `None` when absent.
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(None) => Err(ProjectionError::InvalidParameter {
                key: key.to_string(),
                value: String::new(),
            }),
            Some(Some(value)) => value.parse::<f64>().map(Some).map_err(|_| {
                ProjectionError::InvalidParameter {
                    key: key.to_string(),
                    value: value.clone(),
                }
            }),
        }
    }

    fn ellipsoid(&self) -> Result<Option<Ellipsoid>> {
        match self.params.get("ellps") {
            None => Ok(None),
            Some(value) => {
                let name = value.as_deref().unwrap_or_default();
                Ellipsoid::from_proj_name(name)
                    .map(Some)
                    .ok_or_else(|| ProjectionError::InvalidParameter {
                        key: "ellps".to_string(),
                        value: name.to_string(),
                    })
            }
        }
    }

    /// Figure for the azimuthal projections: a sphere of radius `+R` when
    /// given, otherwise `+ellps` (default WGS84).
    fn azimuthal_figure(&self) -> Result<AzimuthalFigure> {
        if let Some(r) = self.get_f64("R")? {
            if r <= 0.0 {
                return Err(ProjectionError::InvalidParameter {
                    key: "R".to_string(),
                    value: r.to_string(),
                });
            }
            return Ok(AzimuthalFigure::Sphere(r));
        }
        Ok(AzimuthalFigure::Ellipsoid(self.ellipsoid()?.unwrap_or_default()))
    }

    /// Build the projection this definition describes.
    pub fn build(&self) -> Result<Projection> {
        let name = self
            .proj_name()
            .ok_or(ProjectionError::MissingParameter("proj"))?;
        let x_0 = self.get_f64("x_0")?.unwrap_or(0.0);
        let y_0 = self.get_f64("y_0")?.unwrap_or(0.0);

        match name {
            "utm" => {
                let zone = self
                    .get_f64("zone")?
                    .ok_or(ProjectionError::MissingParameter("zone"))?;
                if zone.fract() != 0.0 || !(1.0..=60.0).contains(&zone) {
                    return Err(ProjectionError::InvalidZone(zone as i64));
                }
                let hemisphere = if self.has_flag("south") {
                    Hemisphere::South
                } else {
                    Hemisphere::North
                };
                let ellipsoid = self.ellipsoid()?.unwrap_or_default();
                Ok(Projection::TransverseMercator(TransverseMercator::utm(
                    zone as u8, hemisphere, ellipsoid,
                )?))
            }
            "tmerc" => {
                let lon_0 = self.get_f64("lon_0")?.unwrap_or(0.0);
                let k_0 = match self.get_f64("k_0")? {
                    Some(k) => k,
                    None => self.get_f64("k")?.unwrap_or(1.0),
                };
                let ellipsoid = self.ellipsoid()?.unwrap_or_default();
                Ok(Projection::TransverseMercator(TransverseMercator::new(
                    lon_0, k_0, x_0, y_0, ellipsoid,
                )))
            }
            "aeqd" => {
                let (lat_0, lon_0) = self.centre()?;
                let aeqd = match self.azimuthal_figure()? {
                    AzimuthalFigure::Sphere(r) => {
                        AzimuthalEquidistant::with_false_origin(lat_0, lon_0, r, x_0, y_0)
                    }
                    AzimuthalFigure::Ellipsoid(e) => {
                        AzimuthalEquidistant::on_ellipsoid(lat_0, lon_0, e, x_0, y_0)
                    }
                };
                Ok(Projection::AzimuthalEquidistant(aeqd))
            }
            "laea" => {
                let (lat_0, lon_0) = self.centre()?;
                let laea = match self.azimuthal_figure()? {
                    AzimuthalFigure::Sphere(r) => {
                        LambertAzimuthalEqualArea::with_false_origin(lat_0, lon_0, r, x_0, y_0)
                    }
                    AzimuthalFigure::Ellipsoid(e) => {
                        LambertAzimuthalEqualArea::on_ellipsoid(lat_0, lon_0, e, x_0, y_0)
                    }
                };
                Ok(Projection::LambertAzimuthalEqualArea(laea))
            }
            other => Err(ProjectionError::Unsupported(other.to_string())),
        }
    }

    fn centre(&self) -> Result<(f64, f64)> {
        let lat_0 = self.get_f64("lat_0")?.unwrap_or(0.0);
        let lon_0 = self.get_f64("lon_0")?.unwrap_or(0.0);
        if lat_0.abs() > 90.0 {
            return Err(ProjectionError::LatitudeOutOfRange(lat_0));
        }
        Ok((lat_0, lon_0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlanarProjection;

    #[test]
    fn test_parse_typical_vs30_definition() {
        let def = ProjDefinition::parse(
            "+proj=aeqd +lat_0=34.0 +lon_0=-118.0 +x_0=0.0 +y_0=0.0 +ellps=WGS84 +datum=WGS84 +units=m +no_defs",
        )
        .unwrap();
        assert_eq!(def.proj_name(), Some("aeqd"));
        assert!(def.unknown_keys().is_empty());
        assert_eq!(def.get_f64("lat_0").unwrap(), Some(34.0));

        let proj = def.build().unwrap();
        let (x, y) = proj.project(-118.0, 34.0).unwrap();
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);
    }

    #[test]
    fn test_parse_utm() {
        let proj = Projection::from_proj_string("+proj=utm +zone=11 +ellps=WGS84").unwrap();
        let (e, _) = proj.project(-117.0, 34.0).unwrap();
        assert!((e - 500_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_utm_south() {
        let proj = Projection::from_proj_string("+proj=utm +zone=11 +south").unwrap();
        let (_, n) = proj.project(-117.0, -1.0).unwrap();
        assert!(n > 9_000_000.0);
    }

    #[test]
    fn test_false_origin_applied() {
        let proj = Projection::from_proj_string("+proj=laea +lat_0=0 +lon_0=0 +x_0=100 +y_0=200")
            .unwrap();
        let (x, y) = proj.project(0.0, 0.0).unwrap();
        assert!((x - 100.0).abs() < 1e-9);
        assert!((y - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_azimuthal_figure_follows_ellps_and_r() {
        let wgs84 = Projection::from_proj_string("+proj=aeqd +lat_0=34 +lon_0=-118 +ellps=WGS84")
            .unwrap();
        let (_, y) = wgs84.project(-118.0, 35.0).unwrap();
        assert!((y - 110_931.46).abs() < 0.05, "ellipsoidal y = {}", y);

        // No +ellps defaults to WGS84 as well.
        let default = Projection::from_proj_string("+proj=aeqd +lat_0=34 +lon_0=-118").unwrap();
        let (_, y) = default.project(-118.0, 35.0).unwrap();
        assert!((y - 110_931.46).abs() < 0.05, "default y = {}", y);

        let sphere = Projection::from_proj_string("+proj=aeqd +lat_0=34 +lon_0=-118 +R=6371000")
            .unwrap();
        let (_, y) = sphere.project(-118.0, 35.0).unwrap();
        assert!((y - 6_371_000.0 * 1f64.to_radians()).abs() < 1e-6, "spherical y = {}", y);

        match Projection::from_proj_string("+proj=laea +lat_0=34 +lon_0=-118 +ellps=GRS80").unwrap() {
            Projection::LambertAzimuthalEqualArea(laea) => assert!(laea.is_ellipsoidal()),
            other => panic!("unexpected projection {:?}", other),
        }
        match Projection::from_proj_string("+proj=laea +lat_0=34 +lon_0=-118 +R=6371000").unwrap() {
            Projection::LambertAzimuthalEqualArea(laea) => assert!(!laea.is_ellipsoidal()),
            other => panic!("unexpected projection {:?}", other),
        }
        assert!(Projection::from_proj_string("+proj=aeqd +R=-1").is_err());
    }

    #[test]
    fn test_unknown_keys_reported() {
        let def = ProjDefinition::parse("+proj=aeqd +lat_0=1 +foo=bar").unwrap();
        assert_eq!(def.unknown_keys(), vec!["foo"]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Projection::from_proj_string("+proj=merc"),
            Err(ProjectionError::Unsupported(_))
        ));
        assert!(matches!(
            Projection::from_proj_string("+lat_0=1"),
            Err(ProjectionError::MissingParameter("proj"))
        ));
        assert!(matches!(
            Projection::from_proj_string("+proj=utm"),
            Err(ProjectionError::MissingParameter("zone"))
        ));
        assert!(matches!(
            Projection::from_proj_string("+proj=utm +zone=75"),
            Err(ProjectionError::InvalidZone(75))
        ));
        assert!(Projection::from_proj_string("+proj=aeqd +lat_0=abc").is_err());
        assert!(Projection::from_proj_string("+proj=aeqd +units=km").is_err());
        assert!(Projection::from_proj_string("+proj=aeqd +ellps=bessel").is_err());
    }
}
