//! Linear, bilinear and trilinear interpolation of property records.
//!
//! Interpolation is component-wise. A field that is the sentinel in any
//! contributing corner stays the sentinel, so absent properties never blend
//! into real values.

use crate::types::{PropertyRecord, SENTINEL};

/// Scalar linear interpolation: `a` at `percent = 0`, `b` at `percent = 1`.
#[inline]
pub fn lerp(percent: f64, a: f64, b: f64) -> f64 {
    a * (1.0 - percent) + b * percent
}

fn lerp_field(percent: f64, a: f64, b: f64) -> f64 {
    if a == SENTINEL || b == SENTINEL {
        SENTINEL
    } else {
        lerp(percent, a, b)
    }
}

/// Interpolate between two records.
pub fn linear(percent: f64, a: &PropertyRecord, b: &PropertyRecord) -> PropertyRecord {
    debug_assert!(
        (0.0..=1.0).contains(&percent),
        "interpolation fraction {} outside [0, 1]",
        percent
    );
    a.zip_with(b, |va, vb| lerp_field(percent, va, vb))
}

/// Interpolate within a cell face.
///
/// Corner order: 0 = (x0, y0), 1 = (x1, y0), 2 = (x0, y1), 3 = (x1, y1).
pub fn bilinear(x_percent: f64, y_percent: f64, corners: &[PropertyRecord; 4]) -> PropertyRecord {
    let bottom = linear(x_percent, &corners[0], &corners[1]);
    let top = linear(x_percent, &corners[2], &corners[3]);
    linear(y_percent, &bottom, &top)
}

/// Interpolate within a cell.
///
/// Corners 0..3 lie on the upper layer and 4..7 on the lower layer, each in
/// [`bilinear`] order.
pub fn trilinear(
    x_percent: f64,
    y_percent: f64,
    z_percent: f64,
    corners: &[PropertyRecord; 8],
) -> PropertyRecord {
    let upper = bilinear(
        x_percent,
        y_percent,
        &[corners[0], corners[1], corners[2], corners[3]],
    );
    let lower = bilinear(
        x_percent,
        y_percent,
        &[corners[4], corners[5], corners[6], corners[7]],
    );
    linear(z_percent, &upper, &lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(v: f64) -> PropertyRecord {
        PropertyRecord {
            vp: v,
            vs: v,
            rho: v,
            qp: v,
            qs: v,
        }
    }

    fn corners8() -> [PropertyRecord; 8] {
        std::array::from_fn(|i| uniform(i as f64 + 1.0))
    }

    #[test]
    fn test_linear_endpoints() {
        let a = uniform(10.0);
        let b = uniform(20.0);
        assert_eq!(linear(0.0, &a, &b), a);
        assert_eq!(linear(1.0, &a, &b), b);
        assert_eq!(linear(0.25, &a, &b).vp, 12.5);
    }

    #[test]
    fn test_constant_field_is_reproduced() {
        let corners = [uniform(1234.5); 8];
        for (x, y, z) in [(0.1, 0.2, 0.3), (0.5, 0.5, 0.5), (0.99, 0.01, 0.7)] {
            let r = trilinear(x, y, z, &corners);
            assert!((r.vp - 1234.5).abs() < 1e-9, "got {}", r.vp);
            assert!((r.qs - 1234.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_corner_reproduction() {
        let corners = corners8();
        for i in 0..8 {
            let x = (i & 1) as f64;
            let y = ((i >> 1) & 1) as f64;
            let z = ((i >> 2) & 1) as f64;
            let r = trilinear(x, y, z, &corners);
            assert_eq!(r, corners[i], "corner {} at ({}, {}, {})", i, x, y, z);
        }
    }

    #[test]
    fn test_centre_is_mean() {
        let r = trilinear(0.5, 0.5, 0.5, &corners8());
        assert!((r.vp - 4.5).abs() < 1e-12, "got {}", r.vp);
    }

    #[test]
    fn test_bilinear_orientation() {
        let corners = [uniform(0.0), uniform(10.0), uniform(100.0), uniform(110.0)];
        let r = bilinear(0.3, 0.0, &corners);
        assert!((r.vp - 3.0).abs() < 1e-12);
        let r = bilinear(0.0, 0.3, &corners);
        assert!((r.vp - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_continuity_across_shared_face() {
        // Two cells stacked along x sharing the face x1 of the first / x0 of
        // the second must agree on that face.
        let left = corners8();
        let mut right = [uniform(0.0); 8];
        for (face, (l, r)) in [(1usize, 0usize), (3, 2), (5, 4), (7, 6)].iter().enumerate() {
            right[*r] = left[*l];
            right[*l] = uniform(100.0 + face as f64);
        }
        for (y, z) in [(0.2, 0.3), (0.9, 0.1), (0.5, 0.5)] {
            let a = trilinear(1.0, y, z, &left);
            let b = trilinear(0.0, y, z, &right);
            assert!((a.vp - b.vp).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sentinel_propagates_per_field() {
        let mut corners = [uniform(5.0); 4];
        corners[3].rho = SENTINEL;
        let r = bilinear(0.5, 0.5, &corners);
        assert_eq!(r.rho, SENTINEL);
        assert!((r.vp - 5.0).abs() < 1e-12);

        let absent = [PropertyRecord::SENTINEL; 8];
        assert!(trilinear(0.3, 0.6, 0.9, &absent).is_sentinel());
    }
}
