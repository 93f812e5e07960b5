//! Error types for the velocity model.
//!
//! Errors are split by scope: [`ConfigError`] and [`Vs30Error`] occur while a
//! model is being initialized and abort initialization ([`ModelError`]);
//! [`QueryError`] is local to a single point and never affects sibling
//! points in a batch.

use std::path::PathBuf;

use projection::ProjectionError;
use thiserror::Error;

use crate::types::{Property, PropertyRecord};
use crate::vs30::OctreeAddress;

/// Errors in a model configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No configuration file was found in the model directory.
    #[error("no configuration file found in {0}")]
    NotFound(PathBuf),

    /// A line that is neither blank, a comment, nor `key = value`.
    #[error("line {line}: expected 'key = value', got '{text}'")]
    Syntax { line: usize, text: String },

    /// A required key was not present.
    #[error("missing required key '{0}'")]
    MissingKey(&'static str),

    /// A key was present but its value is malformed or out of range.
    #[error("invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },

    /// The four corners do not describe a usable rectangle.
    #[error("degenerate model footprint: {0}")]
    DegenerateFootprint(String),

    /// YAML configuration could not be parsed.
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Create an InvalidValue error.
    pub fn invalid(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Errors opening or reading the Vs30 surface index.
#[derive(Error, Debug)]
pub enum Vs30Error {
    /// The metadata string did not split into the expected number of fields.
    #[error("Vs30 metadata has {found} fields, expected {expected}")]
    FieldCount { expected: usize, found: usize },

    /// A metadata field could not be parsed.
    #[error("invalid Vs30 metadata field '{field}': '{value}'")]
    InvalidField { field: &'static str, value: String },

    /// The map's projection could not be built.
    #[error("Vs30 map projection: {0}")]
    Projection(#[from] ProjectionError),

    /// I/O error reading the index file.
    #[error("I/O error reading Vs30 index: {0}")]
    Io(#[from] std::io::Error),

    /// The index file does not start with the expected magic bytes.
    #[error("not a Vs30 leaf grid file: {0}")]
    BadMagic(PathBuf),

    /// The index file's payload section has the wrong size.
    #[error("Vs30 leaf grid holds {found} payloads, metadata implies {expected}")]
    PayloadCount { expected: u64, found: u64 },

    /// An octree address outside the indexed domain.
    #[error("octree address {0:?} is outside the indexed domain")]
    AddressOutOfRange(OctreeAddress),
}

/// Errors that abort model initialization or report a failed batch.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Vs30(#[from] Vs30Error),

    /// The model's UTM projection could not be set up.
    #[error("model projection: {0}")]
    Projection(#[from] ProjectionError),

    /// A required property grid (vp or vs) is missing.
    #[error("required {property} grid not found at {path}")]
    MissingGrid { property: Property, path: PathBuf },

    /// A property grid file could not be opened or read.
    #[error("failed to read {property} grid {path}: {source}")]
    GridFile {
        property: Property,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A property grid file's length does not match the grid dimensions.
    #[error("{property} grid {path} is {found} bytes, expected {expected}")]
    GridSize {
        property: Property,
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    /// Input and output slices of a batch query differ in length.
    #[error("batch has {points} points but {outputs} output records")]
    BufferMismatch { points: usize, outputs: usize },

    /// One or more points of a batch failed under the strict failure policy.
    /// Every output record was still written.
    #[error("{failed} of {total} points could not be resolved")]
    PointFailures { failed: usize, total: usize },
}

/// Per-point query failures.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The point lies outside the model's rotated footprint.
    #[error("point ({lon}, {lat}) is outside the model footprint")]
    OutsideFootprint { lon: f64, lat: f64 },

    /// The depth is negative or below the model's depth extent.
    #[error("depth {depth} m is outside the model range [0, {max_depth}]")]
    OutsideDepthRange { depth: f64, max_depth: f64 },

    /// The point could not be projected.
    #[error("projection failed: {0}")]
    Projection(#[from] ProjectionError),

    /// An on-disk property grid could not be read for this point.
    #[error("failed to read {property} value: {source}")]
    Io {
        property: Property,
        #[source]
        source: std::io::Error,
    },

    /// The near-surface taper needs a Vs30 value and none exists at this
    /// point. `partial` holds the record with vp and vs set to the sentinel.
    #[error("no Vs30 value at ({lon}, {lat})")]
    Vs30Unavailable {
        lon: f64,
        lat: f64,
        partial: PropertyRecord,
    },
}

impl QueryError {
    /// The record written to the output slot of a failed point.
    pub fn output_record(&self) -> PropertyRecord {
        match self {
            Self::Vs30Unavailable { partial, .. } => *partial,
            _ => PropertyRecord::SENTINEL,
        }
    }
}

/// Result type for model initialization and batch operations.
pub type Result<T> = std::result::Result<T, ModelError>;
