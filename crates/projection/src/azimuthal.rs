//! Azimuthal projections centred on a point of tangency.
//!
//! Surface maps (Vs30 and similar) are typically stored in a local azimuthal
//! frame centred near the region of interest. Each projection has an
//! ellipsoidal form, used whenever the definition names an ellipsoid, and a
//! spherical form for `+R` definitions.

use crate::ellipsoid::Ellipsoid;
use crate::error::{ProjectionError, Result};
use crate::geodesic;
use crate::{check_geographic, check_planar, wrap_pi, PlanarProjection};

/// Angular distance (radians) from the antipode below which azimuthal
/// projections are treated as undefined.
const ANTIPODE_EPSILON: f64 = 1e-6;

/// Ellipsoidal geodesics stop converging within about πf of the antipode.
const GEODESIC_ANTIPODE_ZONE: f64 = 0.02;

/// Shared centre parameters of the azimuthal projections.
#[derive(Debug, Clone, Copy)]
struct Centre {
    /// Latitude of the centre (radians)
    lat0: f64,
    /// Longitude of the centre (radians)
    lon0: f64,
    sin_lat0: f64,
    cos_lat0: f64,
    false_easting: f64,
    false_northing: f64,
}

impl Centre {
    fn new(lat0_deg: f64, lon0_deg: f64, false_easting: f64, false_northing: f64) -> Self {
        let lat0 = lat0_deg.to_radians();
        Self {
            lat0,
            lon0: lon0_deg.to_radians(),
            sin_lat0: lat0.sin(),
            cos_lat0: lat0.cos(),
            false_easting,
            false_northing,
        }
    }

    /// Returns (cos c, sin φ, cos φ, Δλ) for a geographic point, where c is
    /// the angular distance from the centre on the sphere.
    fn angular(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64, f64, f64) {
        let phi = lat_deg.to_radians();
        let dlon = wrap_pi(lon_deg.to_radians() - self.lon0);
        let (sin_phi, cos_phi) = phi.sin_cos();
        let cos_c = (self.sin_lat0 * sin_phi + self.cos_lat0 * cos_phi * dlon.cos()).clamp(-1.0, 1.0);
        (cos_c, sin_phi, cos_phi, dlon)
    }

    /// Recover (lon, lat) in degrees from planar offsets on the sphere and
    /// the angular distance c they correspond to.
    fn inverse(&self, x: f64, y: f64, c: f64) -> (f64, f64) {
        let rho = (x * x + y * y).sqrt();
        if rho < 1e-12 {
            return self.degrees();
        }
        let (sin_c, cos_c) = c.sin_cos();
        let lat = (cos_c * self.sin_lat0 + y * sin_c * self.cos_lat0 / rho)
            .clamp(-1.0, 1.0)
            .asin();
        let lon = self.lon0
            + (x * sin_c).atan2(rho * self.cos_lat0 * cos_c - y * self.sin_lat0 * sin_c);
        (wrap_pi(lon).to_degrees(), lat.to_degrees())
    }

    fn degrees(&self) -> (f64, f64) {
        (self.lon0.to_degrees(), self.lat0.to_degrees())
    }

    fn offset(&self, x: f64, y: f64) -> (f64, f64) {
        (x + self.false_easting, y + self.false_northing)
    }

    fn local(&self, easting: f64, northing: f64) -> (f64, f64) {
        (easting - self.false_easting, northing - self.false_northing)
    }
}

fn unprojectable(lon: f64, lat: f64, reason: &'static str) -> ProjectionError {
    ProjectionError::Unprojectable { lon, lat, reason }
}

/// Figure of the earth an azimuthal equidistant projection is computed on.
#[derive(Debug, Clone, Copy)]
enum Figure {
    Sphere { radius: f64 },
    Ellipsoid(Ellipsoid),
}

/// Azimuthal equidistant projection: distances from the centre are true.
///
/// On an ellipsoid the planar point lies at the geodesic distance from the
/// centre along the geodesic's initial azimuth.
#[derive(Debug, Clone)]
pub struct AzimuthalEquidistant {
    centre: Centre,
    figure: Figure,
}

impl AzimuthalEquidistant {
    /// Spherical form.
    ///
    /// # Arguments
    /// * `lat0_deg`, `lon0_deg` - Centre of projection (degrees)
    /// * `radius` - Sphere radius (metres)
    pub fn new(lat0_deg: f64, lon0_deg: f64, radius: f64) -> Self {
        Self::with_false_origin(lat0_deg, lon0_deg, radius, 0.0, 0.0)
    }

    /// Like [`AzimuthalEquidistant::new`] with false easting/northing applied.
    pub fn with_false_origin(
        lat0_deg: f64,
        lon0_deg: f64,
        radius: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        Self {
            centre: Centre::new(lat0_deg, lon0_deg, false_easting, false_northing),
            figure: Figure::Sphere { radius },
        }
    }

    /// Ellipsoidal form with false easting/northing applied.
    pub fn on_ellipsoid(
        lat0_deg: f64,
        lon0_deg: f64,
        ellipsoid: Ellipsoid,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        Self {
            centre: Centre::new(lat0_deg, lon0_deg, false_easting, false_northing),
            figure: Figure::Ellipsoid(ellipsoid),
        }
    }

    /// Whether the ellipsoidal form is in use.
    pub fn is_ellipsoidal(&self) -> bool {
        matches!(self.figure, Figure::Ellipsoid(_))
    }
}

impl PlanarProjection for AzimuthalEquidistant {
    fn project(&self, lon_deg: f64, lat_deg: f64) -> Result<(f64, f64)> {
        check_geographic(lon_deg, lat_deg)?;
        let p = &self.centre;
        let (cos_c, sin_phi, cos_phi, dlon) = p.angular(lon_deg, lat_deg);
        let c = cos_c.acos();

        match self.figure {
            Figure::Sphere { radius } => {
                if std::f64::consts::PI - c < ANTIPODE_EPSILON {
                    return Err(unprojectable(lon_deg, lat_deg, "antipode of the projection centre"));
                }
                // k' = c / sin c, tending to 1 at the centre
                let k = if c < 1e-12 { 1.0 } else { c / c.sin() };
                let x = radius * k * cos_phi * dlon.sin();
                let y = radius * k * (p.cos_lat0 * sin_phi - p.sin_lat0 * cos_phi * dlon.cos());
                Ok(p.offset(x, y))
            }
            Figure::Ellipsoid(ellipsoid) => {
                if std::f64::consts::PI - c < GEODESIC_ANTIPODE_ZONE {
                    return Err(unprojectable(
                        lon_deg,
                        lat_deg,
                        "too close to the antipode of the projection centre",
                    ));
                }
                let g = geodesic::inverse(
                    &ellipsoid,
                    p.lat0,
                    p.lon0,
                    lat_deg.to_radians(),
                    p.lon0 + dlon,
                )
                .ok_or_else(|| {
                    unprojectable(lon_deg, lat_deg, "geodesic from the centre did not converge")
                })?;
                let (sin_az, cos_az) = g.azimuth.sin_cos();
                Ok(p.offset(g.distance * sin_az, g.distance * cos_az))
            }
        }
    }

    fn unproject(&self, easting: f64, northing: f64) -> Result<(f64, f64)> {
        check_planar(easting, northing)?;
        let p = &self.centre;
        let (x, y) = p.local(easting, northing);
        let rho = (x * x + y * y).sqrt();

        match self.figure {
            Figure::Sphere { radius } => {
                let c = rho / radius;
                if c > std::f64::consts::PI {
                    return Err(unprojectable(
                        easting,
                        northing,
                        "planar distance exceeds half the sphere circumference",
                    ));
                }
                Ok(p.inverse(x, y, c))
            }
            Figure::Ellipsoid(ellipsoid) => {
                if rho > std::f64::consts::PI * ellipsoid.a {
                    return Err(unprojectable(
                        easting,
                        northing,
                        "planar distance exceeds half the ellipsoid circumference",
                    ));
                }
                if rho < 1e-12 {
                    return Ok(p.degrees());
                }
                let (lat, lon) = geodesic::direct(&ellipsoid, p.lat0, p.lon0, x.atan2(y), rho);
                Ok((lon.to_degrees(), lat.to_degrees()))
            }
        }
    }
}

/// Aspect of an ellipsoidal Lambert projection centred on a pole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pole {
    North,
    South,
}

/// Authalic-latitude terms of the ellipsoidal Lambert azimuthal projection.
#[derive(Debug, Clone, Copy)]
struct Authalic {
    a: f64,
    e: f64,
    e2: f64,
    /// q at the pole
    qp: f64,
    /// Radius of the sphere of equal area
    rq: f64,
    /// Scale adjustment making the centre free of distortion
    d: f64,
    sin_beta1: f64,
    cos_beta1: f64,
    pole: Option<Pole>,
}

impl Authalic {
    fn new(ellipsoid: &Ellipsoid, lat0: f64) -> Self {
        let e = ellipsoid.e();
        let mut terms = Self {
            a: ellipsoid.a,
            e,
            e2: e * e,
            qp: 0.0,
            rq: 0.0,
            d: 1.0,
            sin_beta1: 0.0,
            cos_beta1: 1.0,
            pole: None,
        };
        terms.qp = terms.q(1.0);
        terms.rq = terms.a * (terms.qp / 2.0).sqrt();

        if (lat0.abs() - std::f64::consts::FRAC_PI_2).abs() < 1e-10 {
            terms.pole = Some(if lat0 > 0.0 { Pole::North } else { Pole::South });
            return terms;
        }

        let (sin_phi1, cos_phi1) = lat0.sin_cos();
        terms.sin_beta1 = (terms.q(sin_phi1) / terms.qp).clamp(-1.0, 1.0);
        terms.cos_beta1 = (1.0 - terms.sin_beta1 * terms.sin_beta1).sqrt();
        let m1 = cos_phi1 / (1.0 - terms.e2 * sin_phi1 * sin_phi1).sqrt();
        terms.d = terms.a * m1 / (terms.rq * terms.cos_beta1);
        terms
    }

    /// q(φ), proportional to the area between the equator and latitude φ.
    fn q(&self, sin_phi: f64) -> f64 {
        if self.e < 1e-12 {
            return 2.0 * sin_phi;
        }
        (1.0 - self.e2)
            * (sin_phi / (1.0 - self.e2 * sin_phi * sin_phi) + (self.e * sin_phi).atanh() / self.e)
    }

    /// Geodetic latitude (radians) whose q equals `q`.
    fn latitude(&self, q: f64) -> f64 {
        if 1.0 - q.abs() / self.qp < 1e-12 {
            return std::f64::consts::FRAC_PI_2.copysign(q);
        }
        let mut phi = (q / 2.0).clamp(-1.0, 1.0).asin();
        if self.e < 1e-12 {
            return phi;
        }
        for _ in 0..50 {
            let (sin_phi, cos_phi) = phi.sin_cos();
            let one = 1.0 - self.e2 * sin_phi * sin_phi;
            let delta = one * one / (2.0 * cos_phi)
                * (q / (1.0 - self.e2) - sin_phi / one - (self.e * sin_phi).atanh() / self.e);
            phi += delta;
            if delta.abs() < 1e-14 {
                break;
            }
        }
        phi
    }
}

/// Figure of the earth a Lambert azimuthal projection is computed on.
#[derive(Debug, Clone, Copy)]
enum LambertFigure {
    Sphere { radius: f64 },
    Ellipsoid(Authalic),
}

/// Lambert azimuthal equal-area projection: areas are preserved.
#[derive(Debug, Clone)]
pub struct LambertAzimuthalEqualArea {
    centre: Centre,
    figure: LambertFigure,
}

impl LambertAzimuthalEqualArea {
    /// Spherical form.
    ///
    /// # Arguments
    /// * `lat0_deg`, `lon0_deg` - Centre of projection (degrees)
    /// * `radius` - Sphere radius (metres)
    pub fn new(lat0_deg: f64, lon0_deg: f64, radius: f64) -> Self {
        Self::with_false_origin(lat0_deg, lon0_deg, radius, 0.0, 0.0)
    }

    /// Like [`LambertAzimuthalEqualArea::new`] with false easting/northing applied.
    pub fn with_false_origin(
        lat0_deg: f64,
        lon0_deg: f64,
        radius: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        Self {
            centre: Centre::new(lat0_deg, lon0_deg, false_easting, false_northing),
            figure: LambertFigure::Sphere { radius },
        }
    }

    /// Ellipsoidal form with false easting/northing applied.
    pub fn on_ellipsoid(
        lat0_deg: f64,
        lon0_deg: f64,
        ellipsoid: Ellipsoid,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        Self {
            centre: Centre::new(lat0_deg, lon0_deg, false_easting, false_northing),
            figure: LambertFigure::Ellipsoid(Authalic::new(&ellipsoid, lat0_deg.to_radians())),
        }
    }

    /// Whether the ellipsoidal form is in use.
    pub fn is_ellipsoidal(&self) -> bool {
        matches!(self.figure, LambertFigure::Ellipsoid(_))
    }

    fn project_ellipsoidal(&self, t: &Authalic, lon_deg: f64, lat_deg: f64) -> Result<(f64, f64)> {
        let p = &self.centre;
        let dlon = wrap_pi(lon_deg.to_radians() - p.lon0);
        let (sin_dlon, cos_dlon) = dlon.sin_cos();
        let q = t.q(lat_deg.to_radians().sin());

        match t.pole {
            Some(Pole::North) => {
                if lat_deg <= -90.0 + 1e-9 {
                    return Err(unprojectable(lon_deg, lat_deg, "antipode of the projection centre"));
                }
                let rho = t.a * (t.qp - q).max(0.0).sqrt();
                Ok(p.offset(rho * sin_dlon, -rho * cos_dlon))
            }
            Some(Pole::South) => {
                if lat_deg >= 90.0 - 1e-9 {
                    return Err(unprojectable(lon_deg, lat_deg, "antipode of the projection centre"));
                }
                let rho = t.a * (t.qp + q).max(0.0).sqrt();
                Ok(p.offset(rho * sin_dlon, rho * cos_dlon))
            }
            None => {
                let sin_beta = (q / t.qp).clamp(-1.0, 1.0);
                let cos_beta = (1.0 - sin_beta * sin_beta).sqrt();
                let denom = 1.0 + t.sin_beta1 * sin_beta + t.cos_beta1 * cos_beta * cos_dlon;
                if denom < 0.5 * ANTIPODE_EPSILON * ANTIPODE_EPSILON {
                    return Err(unprojectable(lon_deg, lat_deg, "antipode of the projection centre"));
                }
                let b = t.rq * (2.0 / denom).sqrt();
                let x = b * t.d * cos_beta * sin_dlon;
                let y = b / t.d * (t.cos_beta1 * sin_beta - t.sin_beta1 * cos_beta * cos_dlon);
                Ok(p.offset(x, y))
            }
        }
    }

    fn unproject_ellipsoidal(&self, t: &Authalic, easting: f64, northing: f64) -> Result<(f64, f64)> {
        let p = &self.centre;
        let (x, y) = p.local(easting, northing);
        let beyond = || {
            unprojectable(easting, northing, "planar distance exceeds the projection's extent")
        };

        let (q, dlon) = match t.pole {
            Some(pole) => {
                let rho2 = (x * x + y * y) / (t.a * t.a);
                if rho2 > 2.0 * t.qp {
                    return Err(beyond());
                }
                match pole {
                    Pole::North => (t.qp - rho2, x.atan2(-y)),
                    Pole::South => (rho2 - t.qp, x.atan2(y)),
                }
            }
            None => {
                let rho = ((x / t.d).powi(2) + (t.d * y).powi(2)).sqrt();
                if rho < 1e-12 {
                    return Ok(p.degrees());
                }
                let half_chord = rho / (2.0 * t.rq);
                if half_chord > 1.0 {
                    return Err(beyond());
                }
                let (sin_ce, cos_ce) = (2.0 * half_chord.asin()).sin_cos();
                let sin_beta = (cos_ce * t.sin_beta1 + t.d * y * sin_ce * t.cos_beta1 / rho)
                    .clamp(-1.0, 1.0);
                let dlon = (x * sin_ce).atan2(
                    t.d * rho * t.cos_beta1 * cos_ce - t.d * t.d * y * t.sin_beta1 * sin_ce,
                );
                (t.qp * sin_beta, dlon)
            }
        };

        let lat = t.latitude(q);
        Ok((wrap_pi(p.lon0 + dlon).to_degrees(), lat.to_degrees()))
    }
}

impl PlanarProjection for LambertAzimuthalEqualArea {
    fn project(&self, lon_deg: f64, lat_deg: f64) -> Result<(f64, f64)> {
        check_geographic(lon_deg, lat_deg)?;
        let radius = match &self.figure {
            LambertFigure::Sphere { radius } => *radius,
            LambertFigure::Ellipsoid(t) => return self.project_ellipsoidal(t, lon_deg, lat_deg),
        };
        let p = &self.centre;
        let (cos_c, sin_phi, cos_phi, dlon) = p.angular(lon_deg, lat_deg);

        // 1 + cos c ~ (π - c)² / 2 near the antipode
        let denom = 1.0 + cos_c;
        if denom < 0.5 * ANTIPODE_EPSILON * ANTIPODE_EPSILON {
            return Err(unprojectable(lon_deg, lat_deg, "antipode of the projection centre"));
        }

        let k = (2.0 / denom).sqrt();
        let x = radius * k * cos_phi * dlon.sin();
        let y = radius * k * (p.cos_lat0 * sin_phi - p.sin_lat0 * cos_phi * dlon.cos());
        Ok(p.offset(x, y))
    }

    fn unproject(&self, easting: f64, northing: f64) -> Result<(f64, f64)> {
        check_planar(easting, northing)?;
        let radius = match &self.figure {
            LambertFigure::Sphere { radius } => *radius,
            LambertFigure::Ellipsoid(t) => return self.unproject_ellipsoidal(t, easting, northing),
        };
        let p = &self.centre;
        let (x, y) = p.local(easting, northing);
        let half_chord = (x * x + y * y).sqrt() / (2.0 * radius);
        if half_chord > 1.0 {
            return Err(unprojectable(
                easting,
                northing,
                "planar distance exceeds the sphere diameter",
            ));
        }
        let c = 2.0 * half_chord.asin();
        Ok(p.inverse(x, y, c))
    }
}
