//! Density derived from velocity when the model carries no density grid.

use crate::config::{DensityMode, DEFAULT_NAFE_DRAKE};
use crate::types::{PropertyRecord, SENTINEL};

/// Lower bound of the Nafe–Drake density, g/cm³.
const MIN_NAFE_DRAKE_DENSITY: f64 = 1.0;

/// Density (kg/m³) from shear-wave velocity (m/s).
///
/// Gardner's relation `rho = 1.74 · Vp^0.25` (g/cm³, Vp in km/s) evaluated
/// at the Vp of a Poisson solid, `Vp = √3 · Vs`.
pub fn density_from_vs(vs: f64) -> f64 {
    let vp_kms = 3f64.sqrt() * vs / 1000.0;
    1000.0 * 1.74 * vp_kms.powf(0.25)
}

/// Density (kg/m³) from compressional-wave velocity (m/s) using the
/// Nafe–Drake polynomial `p0 + p1·v + ... + p5·v⁵` in g/cm³ with `v` in
/// km/s, clipped below at 1.0 g/cm³.
pub fn nafe_drake(vp: f64, coefficients: &[f64; 6]) -> f64 {
    let v = vp / 1000.0;
    let rho = coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, p| acc * v + p);
    1000.0 * rho.max(MIN_NAFE_DRAKE_DENSITY)
}

/// Fills in density for records that lack a modeled value.
#[derive(Debug, Clone)]
pub struct DensityDerivator {
    mode: DensityMode,
    coefficients: [f64; 6],
}

impl Default for DensityDerivator {
    fn default() -> Self {
        Self::new(DensityMode::Vs, DEFAULT_NAFE_DRAKE)
    }
}

impl DensityDerivator {
    pub fn new(mode: DensityMode, coefficients: [f64; 6]) -> Self {
        Self { mode, coefficients }
    }

    pub fn mode(&self) -> DensityMode {
        self.mode
    }

    /// Density for `record` from its configured source velocity, or the
    /// sentinel if that velocity is unresolved.
    pub fn derive(&self, record: &PropertyRecord) -> f64 {
        let source = match self.mode {
            DensityMode::Vs => record.vs,
            DensityMode::Vp => record.vp,
        };
        if source == SENTINEL {
            return SENTINEL;
        }
        match self.mode {
            DensityMode::Vs => density_from_vs(source),
            DensityMode::Vp => nafe_drake(source, &self.coefficients),
        }
    }

    /// Set `record.rho` unless it already holds a modeled value.
    pub fn apply(&self, record: &mut PropertyRecord, rho_modeled: bool) {
        if rho_modeled && record.rho != SENTINEL {
            return;
        }
        record.rho = self.derive(record);
    }
}
