//! Reference ellipsoids.

/// An ellipsoid of revolution described by its semi-major axis and flattening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis (metres)
    pub a: f64,
    /// Flattening
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };

    pub const GRS80: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };

    /// Clarke 1866, used by NAD27 based model definitions.
    pub const CLARKE1866: Ellipsoid = Ellipsoid {
        a: 6_378_206.4,
        f: 1.0 / 294.978_698_2,
    };

    /// Look up an ellipsoid by its Proj.4 `+ellps=` name.
    pub fn from_proj_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "wgs84" => Some(Self::WGS84),
            "grs80" => Some(Self::GRS80),
            "clrk66" => Some(Self::CLARKE1866),
            _ => None,
        }
    }

    /// Semi-minor axis.
    pub fn b(&self) -> f64 {
        self.a * (1.0 - self.f)
    }

    /// First eccentricity.
    pub fn e(&self) -> f64 {
        (self.f * (2.0 - self.f)).sqrt()
    }

    /// Third flattening n = f / (2 - f).
    pub fn n(&self) -> f64 {
        self.f / (2.0 - self.f)
    }

    /// Mean radius (2a + b) / 3.
    pub fn mean_radius(&self) -> f64 {
        (2.0 * self.a + self.b()) / 3.0
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::WGS84
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgs84_derived_values() {
        let e = Ellipsoid::WGS84;
        assert!((e.b() - 6_356_752.314_245).abs() < 1e-3);
        assert!((e.e() - 0.081_819_190_842_6).abs() < 1e-12);
        assert!((e.mean_radius() - 6_371_008.771).abs() < 1e-2);
    }

    #[test]
    fn test_from_proj_name() {
        assert_eq!(Ellipsoid::from_proj_name("WGS84"), Some(Ellipsoid::WGS84));
        assert_eq!(Ellipsoid::from_proj_name("clrk66"), Some(Ellipsoid::CLARKE1866));
        assert_eq!(Ellipsoid::from_proj_name("bessel"), None);
    }
}
