//! Geotechnical layer (GTL): a near-surface taper from the deep model
//! towards Vs30-derived velocities.
//!
//! Above the first depth interval, velocities are a weighted blend of the
//! deep model at `depth_interval` and the Vs30 value at the surface:
//!
//! ```text
//! vs = f(z)·vs1 + g(z)·vs30
//! vp = f(z)·vp1 + g(z)·vp30
//! ```
//!
//! where `z = depth / depth_interval` and `vp30` comes from a polynomial fit
//! to Vs30 (Brocher 2005).

use crate::types::PropertyRecord;

/// Shape coefficients of the blending weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaperCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Default for TaperCoefficients {
    fn default() -> Self {
        Self {
            a: 0.5,
            b: 0.6,
            c: 0.5,
        }
    }
}

impl TaperCoefficients {
    /// Weights `(f, g)` of the deep-model and Vs30 contributions at
    /// normalized depth `z` in `[0, 1]`.
    pub fn weights(&self, z: f64) -> (f64, f64) {
        let f = z + self.b * (z - z * z);
        let g = self.a - self.a * z + self.c * (z * z + 2.0 * z.sqrt() - 3.0 * z);
        (f, g)
    }
}

/// Vp (m/s) estimated from Vs30 (m/s).
pub fn vp_from_vs30(vs30: f64) -> f64 {
    let v = vs30 / 1000.0;
    1000.0 * (0.9409 + 2.0947 * v - 0.8206 * v * v + 0.2683 * v.powi(3) - 0.0251 * v.powi(4))
}

/// Blends the deep model with Vs30 near the surface.
#[derive(Debug, Clone)]
pub struct GtlBlender {
    depth_interval: f64,
    coefficients: TaperCoefficients,
}

impl GtlBlender {
    pub fn new(depth_interval: f64) -> Self {
        Self {
            depth_interval,
            coefficients: TaperCoefficients::default(),
        }
    }

    /// Depth at which the deep model is sampled.
    pub fn reference_depth(&self) -> f64 {
        self.depth_interval
    }

    /// Normalized depth `depth / depth_interval` when the taper applies.
    pub fn normalized_depth(&self, depth: f64) -> Option<f64> {
        let z = depth / self.depth_interval;
        (0.0..=1.0).contains(&z).then_some(z)
    }

    /// Replace vp and vs in `record` with the blend of the deep-model values
    /// in `reference` and `vs30`. Other fields are left alone.
    pub fn blend(&self, z: f64, reference: &PropertyRecord, vs30: f64, record: &mut PropertyRecord) {
        let (f, g) = self.coefficients.weights(z);
        record.vs = f * reference.vs + g * vs30;
        record.vp = f * reference.vp + g * vp_from_vs30(vs30);
    }
}
