//! Geodesics on an ellipsoid (Vincenty's direct and inverse solutions).
//!
//! Angles are in radians and distances in metres. Both solutions iterate to
//! roughly 0.1 mm; the inverse fails to converge only for nearly antipodal
//! points, which the callers report as unprojectable.

use crate::ellipsoid::Ellipsoid;
use crate::wrap_pi;

const MAX_ITERATIONS: usize = 200;
const TOLERANCE: f64 = 1e-12;

/// Distance and forward azimuth of the geodesic between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inverse {
    /// Geodesic distance (metres)
    pub distance: f64,
    /// Azimuth at the first point, clockwise from north (radians)
    pub azimuth: f64,
}

/// Auxiliary terms of the series shared by both solutions.
struct Series {
    a: f64,
    b: f64,
}

impl Series {
    fn new(ellipsoid: &Ellipsoid, cos2_alpha: f64) -> Self {
        let a = ellipsoid.a;
        let b = ellipsoid.b();
        let u2 = cos2_alpha * (a * a - b * b) / (b * b);
        Self {
            a: 1.0 + u2 / 16384.0 * (4096.0 + u2 * (-768.0 + u2 * (320.0 - 175.0 * u2))),
            b: u2 / 1024.0 * (256.0 + u2 * (-128.0 + u2 * (74.0 - 47.0 * u2))),
        }
    }

    fn delta_sigma(&self, sin_sigma: f64, cos_sigma: f64, cos_2sm: f64) -> f64 {
        let b = self.b;
        b * sin_sigma
            * (cos_2sm
                + b / 4.0
                    * (cos_sigma * (-1.0 + 2.0 * cos_2sm * cos_2sm)
                        - b / 6.0
                            * cos_2sm
                            * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                            * (-3.0 + 4.0 * cos_2sm * cos_2sm)))
    }
}

fn longitude_correction(f: f64, cos2_alpha: f64) -> f64 {
    f / 16.0 * cos2_alpha * (4.0 + f * (4.0 - 3.0 * cos2_alpha))
}

/// Reduced latitude U with tan U = (1 - f) tan φ.
fn reduced(f: f64, lat: f64) -> (f64, f64) {
    let tan_u = (1.0 - f) * lat.tan();
    let cos_u = 1.0 / (1.0 + tan_u * tan_u).sqrt();
    (tan_u * cos_u, cos_u)
}

/// Geodesic from `(lat1, lon1)` to `(lat2, lon2)`.
///
/// Returns `None` when the iteration does not converge (nearly antipodal
/// points).
pub fn inverse(ellipsoid: &Ellipsoid, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<Inverse> {
    let f = ellipsoid.f;
    let l = wrap_pi(lon2 - lon1);
    let (sin_u1, cos_u1) = reduced(f, lat1);
    let (sin_u2, cos_u2) = reduced(f, lat2);

    let mut lambda = l;
    for _ in 0..MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let t1 = cos_u2 * sin_lambda;
        let t2 = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
        let sin_sigma = (t1 * t1 + t2 * t2).sqrt();
        if sin_sigma == 0.0 {
            // Coincident points
            return Some(Inverse {
                distance: 0.0,
                azimuth: 0.0,
            });
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos2_alpha = 1.0 - sin_alpha * sin_alpha;
        // Equatorial lines have cos²α = 0
        let cos_2sm = if cos2_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos2_alpha
        };
        let c = longitude_correction(f, cos2_alpha);
        let next = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma * (cos_2sm + c * cos_sigma * (-1.0 + 2.0 * cos_2sm * cos_2sm)));

        if (next - lambda).abs() < TOLERANCE {
            let (sin_lambda, cos_lambda) = next.sin_cos();
            let series = Series::new(ellipsoid, cos2_alpha);
            let distance =
                ellipsoid.b() * series.a * (sigma - series.delta_sigma(sin_sigma, cos_sigma, cos_2sm));
            let azimuth = (cos_u2 * sin_lambda)
                .atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda);
            return Some(Inverse { distance, azimuth });
        }
        lambda = next;
    }
    None
}

/// Destination `(lat, lon)` reached by travelling `distance` metres from
/// `(lat1, lon1)` along initial azimuth `azimuth`.
pub fn direct(ellipsoid: &Ellipsoid, lat1: f64, lon1: f64, azimuth: f64, distance: f64) -> (f64, f64) {
    let f = ellipsoid.f;
    let (sin_a1, cos_a1) = azimuth.sin_cos();
    let (sin_u1, cos_u1) = reduced(f, lat1);
    let sigma1 = sin_u1.atan2(cos_u1 * cos_a1);
    let sin_alpha = cos_u1 * sin_a1;
    let cos2_alpha = 1.0 - sin_alpha * sin_alpha;
    let series = Series::new(ellipsoid, cos2_alpha);
    let first = distance / (ellipsoid.b() * series.a);

    let mut sigma = first;
    for _ in 0..MAX_ITERATIONS {
        let cos_2sm = (2.0 * sigma1 + sigma).cos();
        let (sin_sigma, cos_sigma) = sigma.sin_cos();
        let next = first + series.delta_sigma(sin_sigma, cos_sigma, cos_2sm);
        let done = (next - sigma).abs() < TOLERANCE;
        sigma = next;
        if done {
            break;
        }
    }

    let cos_2sm = (2.0 * sigma1 + sigma).cos();
    let (sin_sigma, cos_sigma) = sigma.sin_cos();
    let t = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_a1;
    let lat2 = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_a1)
        .atan2((1.0 - f) * (sin_alpha * sin_alpha + t * t).sqrt());
    let lambda = (sin_sigma * sin_a1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_a1);
    let c = longitude_correction(f, cos2_alpha);
    let l = lambda
        - (1.0 - c)
            * f
            * sin_alpha
            * (sigma + c * sin_sigma * (cos_2sm + c * cos_sigma * (-1.0 + 2.0 * cos_2sm * cos_2sm)));
    (lat2, wrap_pi(lon1 + l))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rad(deg: f64) -> f64 {
        deg.to_radians()
    }

    #[test]
    fn test_meridian_degree_on_wgs84() {
        // Meridian arc from 34°N to 35°N.
        let g = inverse(&Ellipsoid::WGS84, rad(34.0), rad(-118.0), rad(35.0), rad(-118.0)).unwrap();
        assert!((g.distance - 110_931.46).abs() < 0.05, "got {}", g.distance);
        assert!(g.azimuth.abs() < 1e-12);
    }

    #[test]
    fn test_equator_degree_is_a_times_radian() {
        let g = inverse(&Ellipsoid::WGS84, 0.0, 0.0, 0.0, rad(1.0)).unwrap();
        let expected = Ellipsoid::WGS84.a * rad(1.0);
        assert!((g.distance - expected).abs() < 1e-4, "got {}", g.distance);
        assert!((g.azimuth - rad(90.0)).abs() < 1e-12);
    }

    #[test]
    fn test_coincident_points() {
        let g = inverse(&Ellipsoid::WGS84, rad(34.0), rad(-118.0), rad(34.0), rad(-118.0)).unwrap();
        assert_eq!(g.distance, 0.0);
    }

    #[test]
    fn test_direct_inverts_inverse() {
        let e = Ellipsoid::WGS84;
        let (lat1, lon1) = (rad(34.0), rad(-118.0));
        for (lat2, lon2) in [(35.2, -117.3), (31.5, -121.0), (10.0, -60.0), (-20.0, 40.0)] {
            let g = inverse(&e, lat1, lon1, rad(lat2), rad(lon2)).unwrap();
            let (lat, lon) = direct(&e, lat1, lon1, g.azimuth, g.distance);
            assert!((lat.to_degrees() - lat2).abs() < 1e-9, "lat {} vs {}", lat.to_degrees(), lat2);
            assert!((lon.to_degrees() - lon2).abs() < 1e-9, "lon {} vs {}", lon.to_degrees(), lon2);
        }
    }
}
