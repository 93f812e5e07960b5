//! Point queries against gridded 3D seismic velocity models.
//!
//! A model is a regular grid of material properties (Vp, Vs, density, Qp, Qs)
//! over a rotated rectangle in UTM coordinates. Queries take geographic
//! points with a depth below the surface and return trilinearly interpolated
//! properties, with optional near-surface tapering towards Vs30.
//!
//! # Example
//!
//! ```no_run
//! use velocity_model::{Point, PropertyRecord, VelocityModel};
//!
//! let model = VelocityModel::init("/data/models/cs173h", "cs173h")?;
//! let points = [Point::new(-118.0, 34.0, 500.0)];
//! let mut out = [PropertyRecord::default(); 1];
//! model.query(&points, &mut out)?;
//! model.finalize();
//! # Ok::<(), velocity_model::ModelError>(())
//! ```

pub mod backend;
pub mod config;
pub mod density;
pub mod error;
pub mod gtl;
pub mod interpolation;
pub mod mapper;
pub mod model;
pub mod types;
pub mod vs30;

pub use backend::{GridBackend, Residency};
pub use config::{DensityMode, DepthOrder, FailurePolicy, FastAxis, ModelConfig, SampleFormat};
pub use error::{ConfigError, ModelError, QueryError, Result, Vs30Error};
pub use mapper::{CoordinateMapper, GridFrame, GridLocal};
pub use model::{BatchReport, VelocityModel, VERSION};
pub use types::{Point, Property, PropertyRecord, SENTINEL};
pub use vs30::{MapLocal, Vs30Index};
