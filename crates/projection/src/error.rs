//! Error types for projections.

use thiserror::Error;

/// Errors that can occur while building or evaluating a projection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    /// Input coordinates contained NaN or infinity.
    #[error("non-finite coordinate ({x}, {y})")]
    NonFinite { x: f64, y: f64 },

    /// Latitude outside [-90, 90] degrees.
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// The point cannot be represented in this projection (e.g. antipode of
    /// an azimuthal projection's centre).
    #[error("point ({lon}, {lat}) cannot be projected: {reason}")]
    Unprojectable {
        lon: f64,
        lat: f64,
        reason: &'static str,
    },

    /// UTM zone outside 1..=60.
    #[error("invalid UTM zone {0} (must be 1-60)")]
    InvalidZone(i64),

    /// A `+proj=` name this crate does not implement.
    #[error("unsupported projection: {0}")]
    Unsupported(String),

    /// A parameter in a definition string could not be parsed.
    #[error("invalid projection parameter '{key}': {value}")]
    InvalidParameter { key: String, value: String },

    /// A definition string lacked a required parameter.
    #[error("missing projection parameter: {0}")]
    MissingParameter(&'static str),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
