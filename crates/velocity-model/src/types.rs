//! Query points and material property records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value written for any property that could not be resolved.
pub const SENTINEL: f64 = -1.0;

/// A geographic query point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Longitude in decimal degrees
    pub lon: f64,
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Depth below the free surface in metres (positive down)
    pub depth: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64, depth: f64) -> Self {
        Self { lon, lat, depth }
    }

    /// The same horizontal position at another depth.
    pub fn at_depth(&self, depth: f64) -> Self {
        Self { depth, ..*self }
    }
}

/// Material properties at a single location.
///
/// Velocities are in m/s and density in kg/m³. Q values are dimensionless.
/// Any field equal to [`SENTINEL`] is unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub vp: f64,
    pub vs: f64,
    pub rho: f64,
    pub qp: f64,
    pub qs: f64,
}

impl PropertyRecord {
    /// A record with every field unresolved.
    pub const SENTINEL: Self = Self {
        vp: SENTINEL,
        vs: SENTINEL,
        rho: SENTINEL,
        qp: SENTINEL,
        qs: SENTINEL,
    };

    pub fn get(&self, property: Property) -> f64 {
        match property {
            Property::Vp => self.vp,
            Property::Vs => self.vs,
            Property::Rho => self.rho,
            Property::Qp => self.qp,
            Property::Qs => self.qs,
        }
    }

    pub fn set(&mut self, property: Property, value: f64) {
        match property {
            Property::Vp => self.vp = value,
            Property::Vs => self.vs = value,
            Property::Rho => self.rho = value,
            Property::Qp => self.qp = value,
            Property::Qs => self.qs = value,
        }
    }

    /// Combine two records field by field.
    pub fn zip_with(&self, other: &Self, mut f: impl FnMut(f64, f64) -> f64) -> Self {
        let mut out = Self::SENTINEL;
        for property in Property::ALL {
            out.set(property, f(self.get(property), other.get(property)));
        }
        out
    }

    /// True if every field is the sentinel.
    pub fn is_sentinel(&self) -> bool {
        Property::ALL.iter().all(|&p| self.get(p) == SENTINEL)
    }
}

impl Default for PropertyRecord {
    fn default() -> Self {
        Self::SENTINEL
    }
}

/// The five gridded material properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Property {
    Vp,
    Vs,
    Rho,
    Qp,
    Qs,
}

impl Property {
    pub const ALL: [Property; 5] = [
        Property::Vp,
        Property::Vs,
        Property::Rho,
        Property::Qp,
        Property::Qs,
    ];

    /// Position of this property in [`Property::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Property::Vp => "vp",
            Property::Vs => "vs",
            Property::Rho => "rho",
            Property::Qp => "qp",
            Property::Qs => "qs",
        }
    }

    /// Whether a model cannot be opened without this property's grid.
    pub fn is_required(self) -> bool {
        matches!(self, Property::Vp | Property::Vs)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_record() {
        let record = PropertyRecord::default();
        assert!(record.is_sentinel());
        for property in Property::ALL {
            assert_eq!(record.get(property), SENTINEL);
        }
    }

    #[test]
    fn test_get_set_roundtrip() {
        let mut record = PropertyRecord::SENTINEL;
        for (i, property) in Property::ALL.into_iter().enumerate() {
            record.set(property, i as f64 * 10.0);
        }
        assert_eq!(record.vp, 0.0);
        assert_eq!(record.rho, 20.0);
        assert_eq!(record.qs, 40.0);
        assert!(!record.is_sentinel());
    }

    #[test]
    fn test_property_index_matches_all() {
        for (i, property) in Property::ALL.into_iter().enumerate() {
            assert_eq!(property.index(), i);
        }
        assert!(Property::Vp.is_required());
        assert!(!Property::Qs.is_required());
        assert_eq!(Property::Rho.to_string(), "rho");
    }

    #[test]
    fn test_point_at_depth() {
        let p = Point::new(-118.0, 34.0, 100.0).at_depth(500.0);
        assert_eq!(p, Point::new(-118.0, 34.0, 500.0));
    }
}
