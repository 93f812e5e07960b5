//! Model configuration.
//!
//! A model directory holds one configuration file, either `key = value` text
//! (`<label>.conf` or `model.conf`) or YAML with the same keys
//! (`<label>.yaml`, `model.yaml`, ...). Both forms are reduced to the same
//! key/value map before typed parsing, so validation is identical.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Brocher (2005) Nafe–Drake coefficients p0..p5.
pub const DEFAULT_NAFE_DRAKE: [f64; 6] = [0.0, 1.6612, -0.4721, 0.0671, -0.0043, 0.000106];

/// Every key a configuration file may contain.
const KNOWN_KEYS: &[&str] = &[
    "utm_zone",
    "nx",
    "ny",
    "nz",
    "depth",
    "depth_interval",
    "top_left_corner_e",
    "top_left_corner_n",
    "top_right_corner_e",
    "top_right_corner_n",
    "bottom_left_corner_e",
    "bottom_left_corner_n",
    "bottom_right_corner_e",
    "bottom_right_corner_n",
    "seek_axis",
    "seek_direction",
    "density",
    "gtl",
    "p0",
    "p1",
    "p2",
    "p3",
    "p4",
    "p5",
    "vp_file",
    "vs_file",
    "rho_file",
    "qp_file",
    "qs_file",
    "vs30_etree",
    "sample_format",
    "max_resident_mb",
    "point_failure",
];

/// Which horizontal axis varies fastest in the grid files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FastAxis {
    FastX,
    FastY,
}

/// Order of depth layers in the grid files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepthOrder {
    /// The first layer in the file is the surface.
    TopDown,
    /// The first layer in the file is the deepest.
    BottomUp,
}

/// Velocity that density is derived from when no rho grid exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DensityMode {
    Vs,
    Vp,
}

/// On-disk sample encoding of the grid files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// 4-byte little-endian IEEE float
    Float,
    /// 8-byte little-endian IEEE float
    Double,
}

impl SampleFormat {
    /// Bytes per record.
    pub fn record_size(self) -> usize {
        match self {
            Self::Float => 4,
            Self::Double => 8,
        }
    }

    /// Decode one record from exactly [`SampleFormat::record_size`] bytes.
    pub fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            Self::Float => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&bytes[..4]);
                f32::from_le_bytes(raw) as f64
            }
            Self::Double => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(raw)
            }
        }
    }
}

/// What a batch query reports when some points fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Any failed point makes the batch an error.
    Strict,
    /// Failed points are reported but the batch succeeds.
    Lenient,
}

/// A UTM easting/northing pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtmCorner {
    pub e: f64,
    pub n: f64,
}

/// The four corners of the model footprint in UTM metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corners {
    pub top_left: UtmCorner,
    pub top_right: UtmCorner,
    pub bottom_left: UtmCorner,
    pub bottom_right: UtmCorner,
}

/// File names of the property grids, relative to the model directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridFiles {
    pub vp: String,
    pub vs: String,
    pub rho: String,
    pub qp: String,
    pub qs: String,
}

impl Default for GridFiles {
    fn default() -> Self {
        Self {
            vp: "vp.dat".to_string(),
            vs: "vs.dat".to_string(),
            rho: "density.dat".to_string(),
            qp: "qp.dat".to_string(),
            qs: "qs.dat".to_string(),
        }
    }
}

/// Configuration of a velocity model. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// UTM zone of the corner coordinates (northern hemisphere, WGS84).
    pub utm_zone: u8,

    /// Grid nodes along the footprint's width.
    pub nx: usize,

    /// Grid nodes along the footprint's height.
    pub ny: usize,

    /// Depth layers.
    pub nz: usize,

    /// Maximum queryable depth (metres).
    pub depth: f64,

    /// Vertical spacing between layers (metres).
    pub depth_interval: f64,

    pub corners: Corners,

    pub seek_axis: FastAxis,

    pub seek_direction: DepthOrder,

    pub density: DensityMode,

    /// Whether the Vs30 near-surface taper is applied.
    pub gtl: bool,

    /// Nafe–Drake coefficients p0..p5.
    pub nafe_drake: [f64; 6],

    pub files: GridFiles,

    /// Vs30 surface index file, required when `gtl` is on.
    pub vs30_etree: Option<String>,

    pub sample_format: SampleFormat,

    /// Upper bound on grid data held in memory, in megabytes.
    pub max_resident_mb: Option<u64>,

    pub point_failure: FailurePolicy,
}

impl ModelConfig {
    /// Locate and load the configuration file for `label` in `model_dir`.
    ///
    /// Search order: `<label>.conf`, `<label>.yaml`, `<label>.yml`,
    /// `model.conf`, `model.yaml`, `model.yml`.
    pub fn load(model_dir: &Path, label: &str) -> Result<Self, ConfigError> {
        let path = Self::locate(model_dir, label)?;
        debug!(path = %path.display(), "Loading model configuration");
        Self::from_file(&path)
    }

    /// Find the configuration file for `label` without reading it.
    pub fn locate(model_dir: &Path, label: &str) -> Result<PathBuf, ConfigError> {
        let candidates = [label, "model"]
            .into_iter()
            .flat_map(|stem| ["conf", "yaml", "yml"].map(|ext| format!("{}.{}", stem, ext)));

        for name in candidates {
            let path = model_dir.join(name);
            if path.is_file() {
                return Ok(path);
            }
        }
        Err(ConfigError::NotFound(model_dir.to_path_buf()))
    }

    /// Load a configuration file, choosing the parser by extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml_str(&text)
        } else {
            Self::from_conf_str(&text)
        }
    }

    /// Parse `key = value` text. Blank lines and `#` comments are skipped.
    pub fn from_conf_str(text: &str) -> Result<Self, ConfigError> {
        let mut pairs = BTreeMap::new();
        for (i, raw) in text.lines().enumerate() {
            let line = match raw.split_once('#') {
                Some((before, _)) => before,
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Syntax {
                line: i + 1,
                text: raw.to_string(),
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::Syntax {
                    line: i + 1,
                    text: raw.to_string(),
                });
            }
            pairs.insert(key.to_string(), value.trim().to_string());
        }
        Self::from_pairs(&pairs)
    }

    /// Parse a flat YAML mapping with the same keys as the text format.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let mapping: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(text)?;
        let mut pairs = BTreeMap::new();
        for (key, value) in mapping {
            let text = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => continue,
                other => {
                    return Err(ConfigError::invalid(key, format!("{:?}", other)));
                }
            };
            pairs.insert(key, text);
        }
        Self::from_pairs(&pairs)
    }

    /// Build a configuration from raw key/value pairs and validate it.
    pub fn from_pairs(pairs: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        for key in pairs.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!(key = %key, "Ignoring unknown configuration key");
            }
        }

        let corner = |e_key: &'static str, n_key: &'static str| {
            Ok::<_, ConfigError>(UtmCorner {
                e: required(pairs, e_key)?,
                n: required(pairs, n_key)?,
            })
        };

        let mut nafe_drake = DEFAULT_NAFE_DRAKE;
        for (i, coefficient) in nafe_drake.iter_mut().enumerate() {
            if let Some(val) = pairs.get(&format!("p{}", i)) {
                *coefficient = val
                    .parse()
                    .map_err(|_| ConfigError::invalid(format!("p{}", i), val.as_str()))?;
            }
        }

        let mut files = GridFiles::default();
        if let Some(val) = pairs.get("vp_file") {
            files.vp = val.clone();
        }
        if let Some(val) = pairs.get("vs_file") {
            files.vs = val.clone();
        }
        if let Some(val) = pairs.get("rho_file") {
            files.rho = val.clone();
        }
        if let Some(val) = pairs.get("qp_file") {
            files.qp = val.clone();
        }
        if let Some(val) = pairs.get("qs_file") {
            files.qs = val.clone();
        }

        let config = Self {
            utm_zone: required(pairs, "utm_zone")?,
            nx: required(pairs, "nx")?,
            ny: required(pairs, "ny")?,
            nz: required(pairs, "nz")?,
            depth: required(pairs, "depth")?,
            depth_interval: required(pairs, "depth_interval")?,
            corners: Corners {
                top_left: corner("top_left_corner_e", "top_left_corner_n")?,
                top_right: corner("top_right_corner_e", "top_right_corner_n")?,
                bottom_left: corner("bottom_left_corner_e", "bottom_left_corner_n")?,
                bottom_right: corner("bottom_right_corner_e", "bottom_right_corner_n")?,
            },
            seek_axis: match pairs.get("seek_axis").map(|v| v.to_lowercase()) {
                None => FastAxis::FastX,
                Some(v) if v == "fast-x" || v == "fast_x" => FastAxis::FastX,
                Some(v) if v == "fast-y" || v == "fast_y" => FastAxis::FastY,
                Some(v) => return Err(ConfigError::invalid("seek_axis", v)),
            },
            seek_direction: match pairs.get("seek_direction").map(|v| v.to_lowercase()) {
                None => DepthOrder::BottomUp,
                Some(v) if v == "top-down" || v == "top_down" => DepthOrder::TopDown,
                Some(v) if v == "bottom-up" || v == "bottom_up" => DepthOrder::BottomUp,
                Some(v) => return Err(ConfigError::invalid("seek_direction", v)),
            },
            density: match pairs.get("density").map(|v| v.to_lowercase()) {
                None => DensityMode::Vs,
                Some(v) if v == "vs" => DensityMode::Vs,
                Some(v) if v == "vp" => DensityMode::Vp,
                Some(v) => return Err(ConfigError::invalid("density", v)),
            },
            gtl: match pairs.get("gtl") {
                None => false,
                Some(v) => parse_switch("gtl", v)?,
            },
            nafe_drake,
            files,
            vs30_etree: pairs.get("vs30_etree").filter(|v| !v.is_empty()).cloned(),
            sample_format: match pairs.get("sample_format").map(|v| v.to_lowercase()) {
                None => SampleFormat::Double,
                Some(v) if v == "double" || v == "f64" => SampleFormat::Double,
                Some(v) if v == "float" || v == "f32" => SampleFormat::Float,
                Some(v) => return Err(ConfigError::invalid("sample_format", v)),
            },
            max_resident_mb: optional(pairs, "max_resident_mb")?,
            point_failure: match pairs.get("point_failure").map(|v| v.to_lowercase()) {
                None => FailurePolicy::Strict,
                Some(v) if v == "strict" => FailurePolicy::Strict,
                Some(v) if v == "lenient" => FailurePolicy::Lenient,
                Some(v) => return Err(ConfigError::invalid("point_failure", v)),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and cross-key requirements.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=60).contains(&self.utm_zone) {
            return Err(ConfigError::invalid("utm_zone", self.utm_zone.to_string()));
        }
        if self.nx < 2 {
            return Err(ConfigError::invalid("nx", format!("{} (must be >= 2)", self.nx)));
        }
        if self.ny < 2 {
            return Err(ConfigError::invalid("ny", format!("{} (must be >= 2)", self.ny)));
        }
        if self.nz < 1 {
            return Err(ConfigError::invalid("nz", "0 (must be >= 1)"));
        }
        if !self.depth.is_finite() || self.depth < 0.0 {
            return Err(ConfigError::invalid("depth", self.depth.to_string()));
        }
        if !self.depth_interval.is_finite() || self.depth_interval <= 0.0 {
            return Err(ConfigError::invalid(
                "depth_interval",
                self.depth_interval.to_string(),
            ));
        }
        if self.nafe_drake.iter().any(|p| !p.is_finite()) {
            return Err(ConfigError::invalid(
                "p0..p5",
                format!("{:?}", self.nafe_drake),
            ));
        }
        if self.gtl && self.vs30_etree.is_none() {
            return Err(ConfigError::MissingKey("vs30_etree"));
        }
        if self.max_resident_mb == Some(0) {
            debug!("max_resident_mb = 0, all grids will be read from disk");
        }
        Ok(())
    }

    /// Number of records in each property grid.
    pub fn grid_len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Expected byte length of each property grid file.
    pub fn grid_file_len(&self) -> u64 {
        self.grid_len() as u64 * self.sample_format.record_size() as u64
    }
}

fn required<T: std::str::FromStr>(
    pairs: &BTreeMap<String, String>,
    key: &'static str,
) -> Result<T, ConfigError> {
    optional(pairs, key)?.ok_or(ConfigError::MissingKey(key))
}

fn optional<T: std::str::FromStr>(
    pairs: &BTreeMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match pairs.get(key) {
        None => Ok(None),
        Some(val) => val
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, val.as_str())),
    }
}

fn parse_switch(key: &'static str, val: &str) -> Result<bool, ConfigError> {
    match val.to_lowercase().as_str() {
        "on" | "1" | "true" | "yes" => Ok(true),
        "off" | "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::invalid(key, val)),
    }
}
