//! Transverse Mercator projection and its UTM specialisation.
//!
//! Uses the Krüger n-series to sixth order (Karney 2011), which is accurate to
//! well below a millimetre within a UTM zone. Forward and inverse are both
//! provided; the inverse solves for conformal latitude with Newton's method.
//!
//! Reference: C. F. F. Karney, "Transverse Mercator with an accuracy of a few
//! nanometers", J. Geodesy 85(8), 2011.

use crate::ellipsoid::Ellipsoid;
use crate::error::{ProjectionError, Result};
use crate::{check_geographic, check_planar, wrap_pi, PlanarProjection};

/// UTM central scale factor.
pub const UTM_SCALE: f64 = 0.9996;
/// UTM false easting (metres).
pub const UTM_FALSE_EASTING: f64 = 500_000.0;
/// UTM false northing for the southern hemisphere (metres).
pub const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Which hemisphere a UTM zone's false northing is set up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
}

/// Transverse Mercator projection parameters.
#[derive(Debug, Clone)]
pub struct TransverseMercator {
    /// Central meridian (radians)
    lon0: f64,
    /// Scale factor on the central meridian
    k0: f64,
    /// False easting (metres)
    false_easting: f64,
    /// False northing (metres)
    false_northing: f64,
    /// UTM zone, if this projection was built as one
    zone: Option<u8>,
    /// First eccentricity
    e: f64,
    /// Rectifying radius A
    radius: f64,
    /// Forward series coefficients α1..α6
    alpha: [f64; 6],
    /// Inverse series coefficients β1..β6
    beta: [f64; 6],
}

impl TransverseMercator {
    /// Create a general transverse Mercator projection.
    ///
    /// # Arguments
    /// * `lon0_deg` - Central meridian (degrees)
    /// * `k0` - Scale factor on the central meridian
    /// * `false_easting` - Added to every easting (metres)
    /// * `false_northing` - Added to every northing (metres)
    /// * `ellipsoid` - Reference ellipsoid
    pub fn new(
        lon0_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
        ellipsoid: Ellipsoid,
    ) -> Self {
        let n = ellipsoid.n();
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;
        let n5 = n4 * n;
        let n6 = n5 * n;

        let radius = ellipsoid.a / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0 - 127.0 * n5 / 288.0
                + 7891.0 * n6 / 37800.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0 + 281.0 * n5 / 630.0
                - 1983433.0 * n6 / 1935360.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0 + 15061.0 * n5 / 26880.0
                + 167603.0 * n6 / 181440.0,
            49561.0 * n4 / 161280.0 - 179.0 * n5 / 168.0 + 6601661.0 * n6 / 7257600.0,
            34729.0 * n5 / 80640.0 - 3418889.0 * n6 / 1995840.0,
            212378941.0 * n6 / 319334400.0,
        ];

        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0 - 81.0 * n5 / 512.0
                + 96199.0 * n6 / 604800.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0 + 46.0 * n5 / 105.0
                - 1118711.0 * n6 / 3870720.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0 - 209.0 * n5 / 4480.0 + 5569.0 * n6 / 90720.0,
            4397.0 * n4 / 161280.0 - 11.0 * n5 / 504.0 - 830251.0 * n6 / 7257600.0,
            4583.0 * n5 / 161280.0 - 108847.0 * n6 / 3991680.0,
            20648693.0 * n6 / 638668800.0,
        ];

        Self {
            lon0: lon0_deg.to_radians(),
            k0,
            false_easting,
            false_northing,
            zone: None,
            e: ellipsoid.e(),
            radius,
            alpha,
            beta,
        }
    }

    /// Create a UTM projection for `zone` (1-60).
    pub fn utm(zone: u8, hemisphere: Hemisphere, ellipsoid: Ellipsoid) -> Result<Self> {
        if !(1..=60).contains(&zone) {
            return Err(ProjectionError::InvalidZone(zone as i64));
        }
        let false_northing = match hemisphere {
            Hemisphere::North => 0.0,
            Hemisphere::South => UTM_FALSE_NORTHING_SOUTH,
        };
        let mut tm = Self::new(
            central_meridian(zone),
            UTM_SCALE,
            UTM_FALSE_EASTING,
            false_northing,
            ellipsoid,
        );
        tm.zone = Some(zone);
        Ok(tm)
    }

    /// UTM zone, if this projection is a UTM zone.
    pub fn zone(&self) -> Option<u8> {
        self.zone
    }

    /// Central meridian in degrees.
    pub fn central_meridian_deg(&self) -> f64 {
        self.lon0.to_degrees()
    }
}

/// Central meridian (degrees) of a UTM zone.
pub fn central_meridian(zone: u8) -> f64 {
    -183.0 + 6.0 * zone as f64
}

impl PlanarProjection for TransverseMercator {
    fn project(&self, lon_deg: f64, lat_deg: f64) -> Result<(f64, f64)> {
        check_geographic(lon_deg, lat_deg)?;

        let phi = lat_deg.to_radians();
        let lambda = wrap_pi(lon_deg.to_radians() - self.lon0);
        let e = self.e;

        // Conformal latitude
        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();

        let xi_prime = t.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / (1.0 + t * t).sqrt()).atanh();
        if !eta_prime.is_finite() {
            return Err(ProjectionError::Unprojectable {
                lon: lon_deg,
                lat: lat_deg,
                reason: "point lies 90 degrees from the central meridian",
            });
        }

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        let easting = self.false_easting + self.k0 * self.radius * eta;
        let northing = self.false_northing + self.k0 * self.radius * xi;
        Ok((easting, northing))
    }

    fn unproject(&self, easting: f64, northing: f64) -> Result<(f64, f64)> {
        check_planar(easting, northing)?;

        let xi = (northing - self.false_northing) / (self.k0 * self.radius);
        let eta = (easting - self.false_easting) / (self.k0 * self.radius);

        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (j, beta) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_prime -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let tau_prime =
            xi_prime.sin() / (eta_prime.sinh().powi(2) + xi_prime.cos().powi(2)).sqrt();
        let lambda = eta_prime.sinh().atan2(xi_prime.cos());

        let e = self.e;
        let e2 = e * e;
        let mut tau = tau_prime;
        for _ in 0..10 {
            let sigma = (e * (e * tau / (1.0 + tau * tau).sqrt()).atanh()).sinh();
            let tau_i = tau * (1.0 + sigma * sigma).sqrt() - sigma * (1.0 + tau * tau).sqrt();
            let delta = (tau_prime - tau_i) / (1.0 + tau_i * tau_i).sqrt()
                * (1.0 + (1.0 - e2) * tau * tau)
                / ((1.0 - e2) * (1.0 + tau * tau).sqrt());
            tau += delta;
            if delta.abs() < 1e-12 {
                break;
            }
        }

        let lat = tau.atan().to_degrees();
        let lon = wrap_pi(lambda + self.lon0).to_degrees();
        Ok((lon, lat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utm11() -> TransverseMercator {
        TransverseMercator::utm(11, Hemisphere::North, Ellipsoid::WGS84).unwrap()
    }

    #[test]
    fn test_central_meridian() {
        assert_eq!(central_meridian(1), -177.0);
        assert_eq!(central_meridian(11), -117.0);
        assert_eq!(central_meridian(60), 177.0);
    }

    #[test]
    fn test_equator_on_central_meridian() {
        let (e, n) = utm11().project(-117.0, 0.0).unwrap();
        assert!((e - 500_000.0).abs() < 1e-6, "easting should be 500000, got {}", e);
        assert!(n.abs() < 1e-6, "northing should be 0, got {}", n);
    }

    #[test]
    fn test_meridian_arc_at_45_degrees() {
        // Meridian arc length to 45°N on WGS84 is 4 984 944.378 m.
        let (e, n) = utm11().project(-117.0, 45.0).unwrap();
        assert!((e - 500_000.0).abs() < 1e-6);
        let expected = 0.9996 * 4_984_944.378;
        assert!(
            (n - expected).abs() < 0.5,
            "northing should be ~{}, got {}",
            expected,
            n
        );
    }

    #[test]
    fn test_symmetry_about_central_meridian() {
        let tm = utm11();
        let (e_west, n_west) = tm.project(-118.5, 34.0).unwrap();
        let (e_east, n_east) = tm.project(-115.5, 34.0).unwrap();
        assert!(((500_000.0 - e_west) - (e_east - 500_000.0)).abs() < 1e-6);
        assert!((n_west - n_east).abs() < 1e-6);
    }

    #[test]
    fn test_roundtrip() {
        let tm = utm11();
        for (lon, lat) in [(-118.25, 34.05), (-116.1, 32.7), (-119.9, 36.4), (-117.0, 0.5)] {
            let (e, n) = tm.project(lon, lat).unwrap();
            let (lon2, lat2) = tm.unproject(e, n).unwrap();
            assert!((lon - lon2).abs() < 1e-9, "lon roundtrip failed: {} vs {}", lon, lon2);
            assert!((lat - lat2).abs() < 1e-9, "lat roundtrip failed: {} vs {}", lat, lat2);
        }
    }

    #[test]
    fn test_southern_hemisphere_false_northing() {
        let tm = TransverseMercator::utm(11, Hemisphere::South, Ellipsoid::WGS84).unwrap();
        let (_, n) = tm.project(-117.0, -10.0).unwrap();
        assert!(n < UTM_FALSE_NORTHING_SOUTH && n > 8_000_000.0, "got {}", n);
    }

    #[test]
    fn test_invalid_zone() {
        assert!(TransverseMercator::utm(0, Hemisphere::North, Ellipsoid::WGS84).is_err());
        assert!(TransverseMercator::utm(61, Hemisphere::North, Ellipsoid::WGS84).is_err());
    }
}
